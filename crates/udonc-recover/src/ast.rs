//! The pseudo-source AST that structural recovery builds and the emitter
//! walks (§3). Node shapes mirror the instruction-level [`Expression`]
//! tree but drop addresses in favor of statement-level structure.

use udonc_analysis::{Operator, PropertyAccessKind};
use udonc_model::HeapValue;

#[derive(Debug, Clone)]
pub struct ProgramNode {
    pub class_name: Option<String>,
    pub global_variables: Vec<VariableDeclNode>,
    pub functions: Vec<FunctionNode>,
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub is_public: bool,
    pub name: String,
    pub parameters: Vec<VariableDeclNode>,
    pub return_type: Option<String>,
    pub body: BlockNode,
}

#[derive(Debug, Clone, Default)]
pub struct BlockNode {
    pub statements: Vec<StatementNode>,
}

impl BlockNode {
    pub fn push(&mut self, stmt: StatementNode) {
        self.statements.push(stmt);
    }

    /// `true` when the block's last statement already transfers control,
    /// so a caller (e.g. a switch case) need not append its own `break;`.
    pub fn terminates(&self) -> bool {
        matches!(
            self.statements.last(),
            Some(StatementNode::Return) | Some(StatementNode::Goto { .. })
        )
    }
}

#[derive(Debug, Clone)]
pub struct VariableDeclNode {
    pub var_name: String,
    pub var_type: Option<String>,
    pub initial_value: Option<ExpressionNode>,
}

#[derive(Debug, Clone)]
pub struct SwitchCaseNode {
    pub values: Vec<ExpressionNode>,
    pub body: BlockNode,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub enum StatementNode {
    VariableDecl(VariableDeclNode),
    Assignment {
        target: String,
        value: Option<ExpressionNode>,
    },
    ExpressionStatement(ExpressionNode),
    If {
        condition: ExpressionNode,
        then_block: BlockNode,
    },
    IfElse {
        condition: ExpressionNode,
        then_block: BlockNode,
        else_block: BlockNode,
    },
    While {
        condition: ExpressionNode,
        body: BlockNode,
    },
    DoWhile {
        condition: ExpressionNode,
        body: BlockNode,
    },
    Switch {
        expression: ExpressionNode,
        cases: Vec<SwitchCaseNode>,
        default_case: Option<SwitchCaseNode>,
    },
    Label(String),
    Goto {
        target: String,
    },
    Return,
}

#[derive(Debug, Clone)]
pub enum ExpressionNode {
    Literal {
        value: HeapValue,
        literal_type: Option<String>,
    },
    Variable {
        var_name: String,
        var_type: Option<String>,
    },
    Call {
        is_external: bool,
        function_name: String,
        type_name: String,
        original_name: String,
        is_static: bool,
        returns_void: bool,
        receiver: Option<Box<ExpressionNode>>,
        emit_as_expression: bool,
        arguments: Vec<ExpressionNode>,
    },
    PropertyAccess {
        kind: PropertyAccessKind,
        field: String,
        this: Box<ExpressionNode>,
        target: Option<Box<ExpressionNode>>,
        value: Option<Box<ExpressionNode>>,
        emit_as_expression: bool,
    },
    Construction {
        type_name: String,
        arguments: Vec<ExpressionNode>,
        receiver: Option<Box<ExpressionNode>>,
        emit_as_expression: bool,
    },
    Operator {
        operator: Operator,
        operands: Vec<ExpressionNode>,
        receiver: Option<Box<ExpressionNode>>,
        emit_as_expression: bool,
    },
    Type {
        type_name: String,
    },
    /// A condition or value the recoverer could not trace back to a
    /// concrete expression; the emitter renders it as a comment placeholder.
    Unknown {
        hint: String,
    },
}

impl ExpressionNode {
    pub fn unknown(hint: impl Into<String>) -> Self {
        Self::Unknown { hint: hint.into() }
    }
}
