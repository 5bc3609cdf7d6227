//! Loads the two JSON inputs the decompiler consumes: a program bundle
//! (bytecode, symbols, heap, entry points) and a module descriptor (extern
//! function signatures), converting each into [`udonc_model`] types.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{IngestError, IngestResult};
pub use loader::{
    load_module_info_from_file, load_module_info_from_str, load_program_from_file,
    load_program_from_str,
};
