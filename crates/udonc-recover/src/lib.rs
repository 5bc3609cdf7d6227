//! Structural recovery: converts a function's [`ControlFlowGraph`] plus its
//! attached expression/variable tables into a nested [`FunctionNode`] AST
//! (§4.7).
//!
//! Two strategies coexist in the source this was distilled from; this
//! crate implements Strategy A (dominator-based identification, §4.7, §9)
//! and does not implement Strategy B (SCFG restructuring with a lifter
//! pipeline). See DESIGN.md for why.

pub mod ast;
pub mod builder;
pub mod dominators;
pub mod structure;

pub use ast::{
    BlockNode, ExpressionNode, FunctionNode, ProgramNode, StatementNode, SwitchCaseNode,
    VariableDeclNode,
};
pub use builder::FunctionRecoverer;
pub use dominators::{compute_dominators, compute_post_dominators, Dominance};
pub use structure::{find_natural_loops, identify_conditional, Conditional, LoopKind, NaturalLoop};
