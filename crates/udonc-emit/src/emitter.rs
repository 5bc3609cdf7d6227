//! Walks a recovered [`ProgramNode`] into target-language source text,
//! grounded on `CSharpCodeGenerator` / `ProgramCodeGenerator`.
//!
//! Indentation is tracked with a line buffer the way
//! `raya-compiler`'s IR pretty-printer does; nothing here shells out to an
//! external formatter (Design Note §9, "Formatter").

use udonc_analysis::{Operator, PropertyAccessKind};
use udonc_recover::{
    BlockNode, ExpressionNode, FunctionNode, ProgramNode, StatementNode, SwitchCaseNode,
    VariableDeclNode,
};

use crate::literal::format_literal;
use crate::precedence::needs_parentheses;

const INDENT_UNIT: &str = "    ";

/// Renders a recovered program to source text. Stateless beyond the output
/// buffer; one instance per program is cheap to construct.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    buffer: String,
    indent: usize,
}

impl CodeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(mut self, program: &ProgramNode) -> String {
        let class_name = program.class_name.as_deref().unwrap_or("DecompiledClass");
        self.line("// Decompiled Udon Program");
        self.line("// This is pseudo-code and may not compile directly");
        self.line("");
        self.line(&format!("public class {class_name}"));
        self.line("{");
        self.indent += 1;

        for global in &program.global_variables {
            self.emit_variable_decl(global, true);
        }
        if !program.global_variables.is_empty() && !program.functions.is_empty() {
            self.line("");
        }

        for (index, function) in program.functions.iter().enumerate() {
            if index > 0 {
                self.line("");
            }
            self.emit_function(function);
        }

        self.indent -= 1;
        self.line("}");
        self.buffer
    }

    fn emit_function(&mut self, function: &FunctionNode) {
        let visibility = if function.is_public { "public" } else { "private" };
        let return_type = function.return_type.as_deref().unwrap_or("void");
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.var_type.as_deref().unwrap_or("object"), p.var_name))
            .collect();
        self.line(&format!(
            "{visibility} {return_type} {}({})",
            function.name,
            params.join(", ")
        ));
        self.line("{");
        self.indent += 1;
        self.emit_block(&function.body);
        self.indent -= 1;
        self.line("}");
    }

    fn emit_block(&mut self, block: &BlockNode) {
        for stmt in &block.statements {
            self.emit_statement(stmt);
        }
    }

    fn emit_statement(&mut self, stmt: &StatementNode) {
        match stmt {
            StatementNode::VariableDecl(decl) => self.emit_variable_decl(decl, false),
            StatementNode::Assignment { target, value } => match value {
                Some(expr) => self.line(&format!("{target} = {};", self.expr(expr))),
                None => self.line(&format!("{target};")),
            },
            StatementNode::ExpressionStatement(expr) => self.line(&format!("{};", self.expr(expr))),
            StatementNode::If { condition, then_block } => {
                self.line(&format!("if ({})", self.expr(condition)));
                self.line("{");
                self.indent += 1;
                self.emit_block(then_block);
                self.indent -= 1;
                self.line("}");
            }
            StatementNode::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                self.line(&format!("if ({})", self.expr(condition)));
                self.line("{");
                self.indent += 1;
                self.emit_block(then_block);
                self.indent -= 1;
                self.line("}");
                self.line("else");
                self.line("{");
                self.indent += 1;
                self.emit_block(else_block);
                self.indent -= 1;
                self.line("}");
            }
            StatementNode::While { condition, body } => {
                self.line(&format!("while ({})", self.expr(condition)));
                self.line("{");
                self.indent += 1;
                self.emit_block(body);
                self.indent -= 1;
                self.line("}");
            }
            StatementNode::DoWhile { condition, body } => {
                self.line("do");
                self.line("{");
                self.indent += 1;
                self.emit_block(body);
                self.indent -= 1;
                self.line(&format!("}} while ({});", self.expr(condition)));
            }
            StatementNode::Switch {
                expression,
                cases,
                default_case,
            } => {
                self.line(&format!("switch ({})", self.expr(expression)));
                self.line("{");
                self.indent += 1;
                for case in cases {
                    self.emit_switch_case(case);
                }
                if let Some(default_case) = default_case {
                    self.emit_switch_case(default_case);
                }
                self.indent -= 1;
                self.line("}");
            }
            StatementNode::Label(name) => self.line(&format!("{name}:")),
            StatementNode::Goto { target } => self.line(&format!("goto {target};")),
            StatementNode::Return => self.line("return;"),
        }
    }

    fn emit_switch_case(&mut self, case: &SwitchCaseNode) {
        if case.is_default {
            self.line("default:");
        } else {
            for value in &case.values {
                self.line(&format!("case {}:", self.expr(value)));
            }
        }
        self.indent += 1;
        self.emit_block(&case.body);
        if !case.body.terminates() {
            self.line("break;");
        }
        self.indent -= 1;
    }

    fn emit_variable_decl(&mut self, decl: &VariableDeclNode, is_field: bool) {
        let ty = decl.var_type.as_deref().unwrap_or("object");
        let visibility = if is_field { "public " } else { "" };
        match &decl.initial_value {
            Some(expr) => self.line(&format!(
                "{visibility}{ty} {} = {};",
                decl.var_name,
                self.expr(expr)
            )),
            None => self.line(&format!("{visibility}{ty} {};", decl.var_name)),
        }
    }

    fn expr(&self, node: &ExpressionNode) -> String {
        match node {
            ExpressionNode::Literal { value, literal_type } => {
                format_literal(value, literal_type.as_deref())
            }
            ExpressionNode::Variable { var_name, .. } => var_name.clone(),
            ExpressionNode::Type { type_name } => type_name.clone(),
            ExpressionNode::Unknown { hint } => format!("/* unresolved: {hint} */ default"),
            ExpressionNode::Call {
                is_external,
                function_name,
                type_name,
                is_static,
                receiver,
                arguments,
                ..
            } => self.format_call(*is_external, function_name, type_name, *is_static, receiver, arguments),
            ExpressionNode::PropertyAccess {
                kind,
                field,
                this,
                value,
                ..
            } => self.format_property_access(*kind, field, this, value),
            ExpressionNode::Construction {
                type_name,
                arguments,
                ..
            } => format!(
                "new {type_name}({})",
                arguments.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ")
            ),
            ExpressionNode::Operator {
                operator,
                operands,
                ..
            } => self.format_operator(operator, operands),
        }
    }

    fn format_call(
        &self,
        is_external: bool,
        function_name: &str,
        type_name: &str,
        is_static: bool,
        receiver: &Option<Box<ExpressionNode>>,
        arguments: &[ExpressionNode],
    ) -> String {
        let args = arguments
            .iter()
            .map(|a| self.expr(a))
            .collect::<Vec<_>>()
            .join(", ");

        if !is_external {
            return format!("{function_name}({args})");
        }

        match receiver {
            Some(recv) => format!("{}.{function_name}({args})", self.expr(recv)),
            None if is_static => format!("{type_name}.{function_name}({args})"),
            None => format!("{function_name}({args})"),
        }
    }

    fn format_property_access(
        &self,
        kind: PropertyAccessKind,
        field: &str,
        this: &ExpressionNode,
        value: &Option<Box<ExpressionNode>>,
    ) -> String {
        let base = self.expr(this);
        match kind {
            PropertyAccessKind::Get => format!("{base}.{field}"),
            PropertyAccessKind::Set => match value {
                Some(v) => format!("{base}.{field} = {}", self.expr(v)),
                None => format!("{base}.{field}"),
            },
        }
    }

    fn format_operator(&self, operator: &Operator, operands: &[ExpressionNode]) -> String {
        if *operator == Operator::Conversion && operands.len() == 2 {
            let type_name = self.expr(&operands[0]);
            return format!("({type_name}){}", self.operand(operator, &operands[1], 1));
        }

        if operands.len() == 1 {
            let symbol = unary_symbol(operator);
            return format!("{symbol}{}", self.operand(operator, &operands[0], 0));
        }

        if operands.len() == 2 {
            let symbol = binary_symbol(operator);
            return format!(
                "{} {symbol} {}",
                self.operand(operator, &operands[0], 0),
                self.operand(operator, &operands[1], 1)
            );
        }

        // An operator extern with an unexpected arity; render as a call so
        // nothing is silently dropped.
        let args = operands.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ");
        format!("{}({args})", operator_name(operator))
    }

    fn operand(&self, parent_op: &Operator, child: &ExpressionNode, index: usize) -> String {
        let rendered = self.expr(child);
        let child_op = match child {
            ExpressionNode::Operator { operator, .. } => Some(operator),
            _ => None,
        };
        if needs_parentheses(parent_op, child_op, index) {
            format!("({rendered})")
        } else {
            rendered
        }
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.buffer.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buffer.push_str(INDENT_UNIT);
        }
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }
}

fn unary_symbol(op: &Operator) -> &'static str {
    match op {
        Operator::UnaryNegation => "-",
        Operator::UnaryPlus => "+",
        Operator::LogicalNot => "!",
        Operator::BitwiseNot => "~",
        _ => "",
    }
}

fn binary_symbol(op: &Operator) -> &'static str {
    match op {
        Operator::Addition => "+",
        Operator::Subtraction => "-",
        Operator::Multiplication => "*",
        Operator::Division => "/",
        Operator::Remainder => "%",
        Operator::Equality => "==",
        Operator::Inequality => "!=",
        Operator::LessThan => "<",
        Operator::LessThanOrEqual => "<=",
        Operator::GreaterThan => ">",
        Operator::GreaterThanOrEqual => ">=",
        Operator::LogicalAnd => "&&",
        Operator::LogicalOr => "||",
        Operator::LogicalXor => "^",
        Operator::BitwiseAnd => "&",
        Operator::BitwiseOr => "|",
        _ => "?",
    }
}

fn operator_name(op: &Operator) -> String {
    match op {
        Operator::Other(name) => name.clone(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_model::HeapValue;

    fn lit(i: i64) -> ExpressionNode {
        ExpressionNode::Literal {
            value: HeapValue::Int(i),
            literal_type: Some("System.Int32".to_string()),
        }
    }

    #[test]
    fn simple_program_renders_class_wrapper() {
        let program = ProgramNode {
            class_name: Some("MyClass".to_string()),
            global_variables: Vec::new(),
            functions: Vec::new(),
        };
        let output = CodeEmitter::new().generate(&program);
        assert!(output.contains("public class MyClass"));
        assert!(output.starts_with("// Decompiled Udon Program"));
    }

    #[test]
    fn if_else_indents_both_branches() {
        let function = FunctionNode {
            is_public: true,
            name: "DoThing".to_string(),
            parameters: Vec::new(),
            return_type: None,
            body: BlockNode {
                statements: vec![StatementNode::IfElse {
                    condition: lit(1),
                    then_block: BlockNode {
                        statements: vec![StatementNode::Return],
                    },
                    else_block: BlockNode {
                        statements: vec![StatementNode::Return],
                    },
                }],
            },
        };
        let program = ProgramNode {
            class_name: Some("MyClass".to_string()),
            global_variables: Vec::new(),
            functions: vec![function],
        };
        let output = CodeEmitter::new().generate(&program);
        assert!(output.contains("if (1)"));
        assert!(output.contains("else"));
        assert_eq!(output.matches("return;").count(), 2);
    }

    #[test]
    fn binary_operator_parenthesizes_lower_precedence_operand() {
        let expr = ExpressionNode::Operator {
            operator: Operator::Multiplication,
            operands: vec![
                ExpressionNode::Operator {
                    operator: Operator::Addition,
                    operands: vec![lit(1), lit(2)],
                    receiver: None,
                    emit_as_expression: true,
                },
                lit(3),
            ],
            receiver: None,
            emit_as_expression: true,
        };
        let emitter = CodeEmitter::new();
        assert_eq!(emitter.expr(&expr), "(1 + 2) * 3");
    }

    #[test]
    fn switch_case_without_terminator_gets_break() {
        let stmt = StatementNode::Switch {
            expression: lit(0),
            cases: vec![SwitchCaseNode {
                values: vec![lit(1)],
                body: BlockNode {
                    statements: vec![StatementNode::ExpressionStatement(lit(5))],
                },
                is_default: false,
            }],
            default_case: None,
        };
        let mut emitter = CodeEmitter::new();
        emitter.emit_statement(&stmt);
        assert!(emitter.buffer.contains("break;"));
    }
}
