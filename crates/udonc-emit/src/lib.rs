//! Renders a recovered program AST to target-language source text: literal
//! formatting, operator parenthesization, class-name resolution, global
//! variable collection, and the line-oriented code emitter itself.

pub mod class_name;
pub mod emitter;
pub mod global;
pub mod literal;
pub mod precedence;

pub use class_name::{resolve_class_name, ClassNameAllocator};
pub use emitter::CodeEmitter;
pub use global::{collect_global_variables, format_initial_value};
pub use literal::format_literal;
pub use precedence::needs_parentheses;
