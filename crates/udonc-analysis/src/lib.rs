//! Bytecode parsing through expression reconstruction: the first half of
//! the decompilation pipeline, leaves-first (§2).

pub mod block;
pub mod cfg;
pub mod expression;
pub mod parser;
pub mod simulate;
pub mod variable;

pub use block::{BasicBlock, BasicBlockIdentifier, BlockKind, SwitchInfo};
pub use cfg::{BlockId, CfgBuilder, ControlFlowGraph};
pub use expression::{
    can_inline_temp, Expression, ExpressionBuilder, ExpressionKind, ExpressionTable, Operator,
    PropertyAccessKind,
};
pub use parser::{resolve_call_jump_targets, BytecodeParser, ParsedProgram};
pub use simulate::{HeapCellStatus, SimulationResult, StackFrame, StackSimulator, StackValue, StackValueKind};
pub use variable::{Variable, VariableIdentifier, VariableTable};
