//! Folds each value-producing instruction into an [`Expression`] tree
//! (§4.6), and implements the temp-inlining legality predicate shared by
//! structural recovery and the emitter.

use rustc_hash::FxHashMap;

use udonc_model::{
    DefType, Diagnostic, Diagnostics, FunctionMetadata, HeapValue, Instruction, OpCode,
    UdonModuleInfo, UdonProgramData,
};

use crate::cfg::ControlFlowGraph;
use crate::simulate::{SimulationResult, StackFrame, StackValue, StackValueKind};
use crate::variable::VariableTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccessKind {
    Get,
    Set,
}

/// Operator tag parsed from an `__op_<Name>` extern signature substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Remainder,
    Equality,
    Inequality,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    LogicalNot,
    BitwiseAnd,
    BitwiseOr,
    BitwiseNot,
    UnaryNegation,
    UnaryPlus,
    Conversion,
    /// Any `__op_*` suffix the table above has no case for.
    Other(String),
}

impl Operator {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "Addition" => Self::Addition,
            "Subtraction" => Self::Subtraction,
            "Multiplication" => Self::Multiplication,
            "Division" => Self::Division,
            "Modulus" | "Remainder" => Self::Remainder,
            "Equality" => Self::Equality,
            "Inequality" => Self::Inequality,
            "LessThan" => Self::LessThan,
            "LessThanOrEqual" => Self::LessThanOrEqual,
            "GreaterThan" => Self::GreaterThan,
            "GreaterThanOrEqual" => Self::GreaterThanOrEqual,
            "LogicalAnd" | "UnaryAnd" | "BitwiseAnd" => Self::BitwiseAnd,
            "LogicalOr" | "BitwiseOr" => Self::BitwiseOr,
            "LogicalXor" | "ExclusiveOr" => Self::LogicalXor,
            "UnaryNegation" => Self::UnaryNegation,
            "UnaryPlus" => Self::UnaryPlus,
            "UnaryNot" | "LogicalNot" => Self::LogicalNot,
            "OnesComplement" | "BitwiseNot" => Self::BitwiseNot,
            "Conversion" | "Implicit" | "Explicit" => Self::Conversion,
            other => Self::Other(other.to_string()),
        }
    }

    /// Extracts the `<Name>` portion of an `__op_<Name>` signature, e.g.
    /// `UnityEngineVector3.__op_Addition__UnityEngineVector3` -> `Addition`.
    pub fn from_signature(signature: &str) -> Option<Self> {
        let (_, rest) = signature.split_once("__op_")?;
        let tag = rest.split("__").next().unwrap_or(rest);
        Some(Self::parse(tag))
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Literal {
        value: HeapValue,
        type_hint: Option<String>,
    },
    Variable {
        name: String,
        address: u32,
        type_hint: Option<String>,
    },
    Assignment {
        target: String,
        rhs: Box<Expression>,
    },
    ExternalCall {
        signature: String,
        def_type: DefType,
        receiver: Option<Box<Expression>>,
        args: Vec<Expression>,
    },
    InternalCall {
        entry_point: u32,
        function_name: Option<String>,
    },
    PropertyAccess {
        kind: PropertyAccessKind,
        field: String,
        receiver: Box<Expression>,
        value: Option<Box<Expression>>,
    },
    Constructor {
        type_name: String,
        args: Vec<Expression>,
    },
    Operator {
        op: Operator,
        operands: Vec<Expression>,
    },
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub source_address: u32,
    /// Whether this node should render as `receiver = expr` (false) or as
    /// a bare sub-expression usable inline (true), per §4.6.
    pub emit_as_expression: bool,
}

/// One expression per value-producing instruction in a function, indexed
/// by instruction address.
#[derive(Debug, Clone, Default)]
pub struct ExpressionTable {
    by_address: FxHashMap<u32, Expression>,
}

impl ExpressionTable {
    pub fn get(&self, address: u32) -> Option<&Expression> {
        self.by_address.get(&address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        self.by_address.values()
    }
}

pub struct ExpressionBuilder<'a> {
    program: &'a UdonProgramData,
    module_info: &'a UdonModuleInfo,
    variables: &'a VariableTable,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(
        program: &'a UdonProgramData,
        module_info: &'a UdonModuleInfo,
        variables: &'a VariableTable,
    ) -> Self {
        Self {
            program,
            module_info,
            variables,
        }
    }

    pub fn build(
        &self,
        cfg: &ControlFlowGraph,
        sim: &SimulationResult,
        diagnostics: &mut Diagnostics,
    ) -> ExpressionTable {
        let mut table = ExpressionTable::default();

        for block_id in cfg.block_ids() {
            let block = cfg.block(block_id);
            for (index, inst) in block.instructions.iter().enumerate() {
                let Some(pre) = sim.pre_state(block_id, index) else {
                    continue;
                };
                if let Some(expr) = self.build_for_instruction(cfg, inst, pre, diagnostics) {
                    table.by_address.insert(inst.address, expr);
                }
            }
        }

        table
    }

    fn build_for_instruction(
        &self,
        cfg: &ControlFlowGraph,
        inst: &Instruction,
        pre: &StackFrame,
        diagnostics: &mut Diagnostics,
    ) -> Option<Expression> {
        match inst.opcode {
            OpCode::Push | OpCode::Pop | OpCode::JumpIfFalse | OpCode::Nop | OpCode::Annotation => {
                None
            }
            OpCode::Jump => self.build_internal_call(cfg, inst),
            OpCode::Copy => self.build_assignment(inst, pre),
            OpCode::Extern => self.build_extern(inst, pre, diagnostics),
            OpCode::JumpIndirect => None,
        }
    }

    fn build_internal_call(&self, _cfg: &ControlFlowGraph, inst: &Instruction) -> Option<Expression> {
        let target = inst.jump_target()?;
        let is_call = self
            .program
            .entry_points
            .iter()
            .any(|e| e.call_jump_target == Some(target));
        if !is_call {
            return None;
        }
        let function_name = self
            .program
            .entry_point_by_address(target)
            .and_then(|e| e.name.clone());
        Some(Expression {
            kind: ExpressionKind::InternalCall {
                entry_point: target,
                function_name,
            },
            source_address: inst.address,
            emit_as_expression: false,
        })
    }

    fn build_assignment(&self, inst: &Instruction, pre: &StackFrame) -> Option<Expression> {
        if pre.depth() < 2 {
            return None;
        }
        let source = pre.peek(0)?;
        let target = pre.peek(1)?;
        let rhs = self.stack_value_to_expression(source, inst.address);

        Some(Expression {
            kind: ExpressionKind::Assignment {
                target: self.variables.name_of(target.address),
                rhs: Box::new(rhs),
            },
            source_address: inst.address,
            emit_as_expression: false,
        })
    }

    fn build_extern(
        &self,
        inst: &Instruction,
        pre: &StackFrame,
        diagnostics: &mut Diagnostics,
    ) -> Option<Expression> {
        let signature = inst.operand_name.as_deref()?;
        let Some(func_info) = self.module_info.function_info(signature) else {
            diagnostics.report(Diagnostic::UnknownExtern {
                address: inst.address,
                signature: signature.to_string(),
            });
            return Some(Expression {
                kind: ExpressionKind::ExternalCall {
                    signature: signature.to_string(),
                    def_type: DefType::Method,
                    receiver: None,
                    args: Vec::new(),
                },
                source_address: inst.address,
                emit_as_expression: true,
            });
        };

        let param_count = func_info.parameter_count();
        let mut args = Vec::with_capacity(param_count);
        for i in 0..param_count {
            let depth = param_count - 1 - i;
            if let Some(value) = pre.peek(depth) {
                args.push(self.stack_value_to_expression(value, inst.address));
            }
        }

        Some(self.classify_extern_expression(inst, func_info, signature, args))
    }

    fn classify_extern_expression(
        &self,
        inst: &Instruction,
        func_info: &FunctionMetadata,
        signature: &str,
        mut args: Vec<Expression>,
    ) -> Expression {
        let emit_as_expression = !func_info.returns_void;
        let receiver = if !func_info.returns_void && !args.is_empty() {
            Some(Box::new(args.remove(args.len() - 1)))
        } else {
            None
        };

        let kind = match func_info.def_type {
            DefType::Method => ExpressionKind::ExternalCall {
                signature: signature.to_string(),
                def_type: DefType::Method,
                receiver,
                args,
            },
            DefType::Ctor => ExpressionKind::Constructor {
                type_name: func_info.display_name().to_string(),
                args,
            },
            DefType::Field => {
                let is_setter = func_info.name.starts_with("__set");
                let access_kind = if is_setter {
                    PropertyAccessKind::Set
                } else {
                    PropertyAccessKind::Get
                };
                let field = func_info
                    .name
                    .trim_start_matches("__get")
                    .trim_start_matches("__set")
                    .trim_start_matches('_')
                    .to_string();
                let (receiver_expr, value) = if is_setter {
                    let value = args.pop();
                    let receiver = receiver.unwrap_or_else(|| {
                        Box::new(Expression {
                            kind: ExpressionKind::Variable {
                                name: "this".to_string(),
                                address: 0,
                                type_hint: None,
                            },
                            source_address: inst.address,
                            emit_as_expression: true,
                        })
                    });
                    (receiver, value)
                } else {
                    let receiver = receiver.unwrap_or_else(|| {
                        Box::new(Expression {
                            kind: ExpressionKind::Variable {
                                name: "this".to_string(),
                                address: 0,
                                type_hint: None,
                            },
                            source_address: inst.address,
                            emit_as_expression: true,
                        })
                    });
                    (receiver, None)
                };
                ExpressionKind::PropertyAccess {
                    kind: access_kind,
                    field,
                    receiver: receiver_expr,
                    value,
                }
            }
            DefType::Operator => {
                let op = Operator::from_signature(signature).unwrap_or(Operator::Other(
                    func_info.name.clone(),
                ));
                let mut operands = args;
                if let Some(receiver) = receiver {
                    operands.push(*receiver);
                }
                ExpressionKind::Operator { op, operands }
            }
        };

        Expression {
            kind,
            source_address: inst.address,
            emit_as_expression,
        }
    }

    fn stack_value_to_expression(&self, value: &StackValue, source_address: u32) -> Expression {
        match value.kind {
            StackValueKind::HeapAddress => {
                if let Some(variable) = self.variables.get(value.address) {
                    return Expression {
                        kind: ExpressionKind::Variable {
                            name: variable.name.clone(),
                            address: variable.address,
                            type_hint: variable.type_hint.clone(),
                        },
                        source_address,
                        emit_as_expression: true,
                    };
                }
                if let Some(heap) = self.program.heap_entry(value.address) {
                    return Expression {
                        kind: ExpressionKind::Literal {
                            value: heap.value.clone(),
                            type_hint: Some(heap.type_name.clone()),
                        },
                        source_address,
                        emit_as_expression: true,
                    };
                }
                Expression {
                    kind: ExpressionKind::Literal {
                        value: HeapValue::Opaque {
                            to_string_hint: Some(format!("0x{:08x}", value.address)),
                        },
                        type_hint: None,
                    },
                    source_address,
                    emit_as_expression: true,
                }
            }
            StackValueKind::Immediate => Expression {
                kind: ExpressionKind::Literal {
                    value: HeapValue::Int(value.address as i64),
                    type_hint: value.type_hint.clone(),
                },
                source_address,
                emit_as_expression: true,
            },
        }
    }
}

/// Legality predicate for inlining a single-write temporary at a read site
/// (§4.6, §8): no rewrite of a referenced variable and no intervening
/// `INTERNAL_CALL` between write and read.
pub fn can_inline_temp(
    write_address: u32,
    read_address: u32,
    instructions_between: impl Iterator<Item = Instruction>,
    rhs_reads: &[u32],
    write_sites_of_rhs_vars: impl Fn(u32) -> bool,
) -> bool {
    if read_address <= write_address {
        return false;
    }
    for inst in instructions_between {
        if inst.opcode == OpCode::Jump {
            // An INTERNAL_CALL is exactly a call-convention JUMP; the
            // expression builder tags it, but at this point in the
            // pipeline we conservatively treat any JUMP as disqualifying.
            return false;
        }
    }
    for &address in rhs_reads {
        if write_sites_of_rhs_vars(address) {
            return false;
        }
    }
    true
}
