//! Core data model shared by every stage of the decompiler: the decoded
//! instruction stream, symbol/scope conventions, heap values, the per-program
//! bundle, the extern module registry, and the two-tier error taxonomy.

pub mod diagnostics;
pub mod error;
pub mod heap;
pub mod instruction;
pub mod module;
pub mod program;
pub mod symbol;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{DecompileError, DecompileResult};
pub use heap::{HeapEntry, HeapValue};
pub use instruction::{Instruction, OpCode, HALT_JUMP_SENTINEL};
pub use module::{DefType, FunctionMetadata, ModuleMetadata, ParameterKind, UdonModuleInfo};
pub use program::{EntryPointInfo, UdonProgramData, CLASS_NAME_SYMBOL_NAME};
pub use symbol::{
    brief_type_name, classify_scope, is_local_symbol_name, return_slot_function_name,
    this_discriminator, Scope, SymbolInfo, ThisDiscriminator, CONST_PREFIX,
    GLOBAL_INTERNAL_PREFIX, HALT_JUMP_CONST_NAME, INTERNAL_PREFIX, THIS_PREFIX,
};
