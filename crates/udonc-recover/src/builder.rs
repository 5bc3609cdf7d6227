//! Walks a function's [`ControlFlowGraph`] and its analysis tables into a
//! [`FunctionNode`], the Strategy-A structural-recovery entry point (§4.7).
//!
//! Grounded on `original_source`'s `ASTBuilder`, replacing its SCFG-lifter
//! path (Strategy B, not implemented here — see DESIGN.md) with a direct
//! dominator/post-dominator walk.

use rustc_hash::{FxHashMap, FxHashSet};

use udonc_analysis::{
    can_inline_temp, BlockId, BlockKind, ControlFlowGraph, Expression, ExpressionKind,
    ExpressionTable, PropertyAccessKind, SimulationResult, StackValueKind, Variable, VariableTable,
};
use udonc_model::{
    Diagnostics, HeapValue, Instruction, OpCode, Scope, UdonModuleInfo, UdonProgramData,
};

use crate::ast::{BlockNode, ExpressionNode, FunctionNode, StatementNode, VariableDeclNode};
use crate::dominators::{compute_dominators, compute_post_dominators, Dominance};
use crate::structure::{find_natural_loops, identify_conditional, LoopKind, NaturalLoop};

pub struct FunctionRecoverer<'a> {
    cfg: &'a ControlFlowGraph,
    expressions: &'a ExpressionTable,
    variables: &'a VariableTable,
    sim: &'a SimulationResult,
    program: &'a UdonProgramData,
    module_info: &'a UdonModuleInfo,
    diagnostics: &'a mut Diagnostics,

    dom: Dominance,
    post_dom: Dominance,
    loops_by_header: FxHashMap<BlockId, NaturalLoop>,
    instructions_by_address: Vec<Instruction>,

    visited: FxHashSet<BlockId>,
    labels: FxHashMap<BlockId, String>,
    next_label: u32,
}

impl<'a> FunctionRecoverer<'a> {
    pub fn new(
        cfg: &'a ControlFlowGraph,
        expressions: &'a ExpressionTable,
        variables: &'a VariableTable,
        sim: &'a SimulationResult,
        program: &'a UdonProgramData,
        module_info: &'a UdonModuleInfo,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        let dom = compute_dominators(cfg);
        let post_dom = compute_post_dominators(cfg);
        let loops = find_natural_loops(cfg, &dom);

        let mut loops_by_header: FxHashMap<BlockId, NaturalLoop> = FxHashMap::default();
        for l in loops {
            loops_by_header
                .entry(l.header)
                .and_modify(|existing| existing.body.extend(l.body.iter().copied()))
                .or_insert(l);
        }

        let mut instructions_by_address: Vec<Instruction> = cfg
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter().cloned())
            .collect();
        instructions_by_address.sort_by_key(|i| i.address);

        Self {
            cfg,
            expressions,
            variables,
            sim,
            program,
            module_info,
            diagnostics,
            dom,
            post_dom,
            loops_by_header,
            instructions_by_address,
            visited: FxHashSet::default(),
            labels: FxHashMap::default(),
            next_label: 0,
        }
    }

    pub fn build(&mut self) -> FunctionNode {
        let body = self.build_region(self.cfg.entry_block, None, None);
        FunctionNode {
            is_public: self.cfg.is_public,
            name: self.cfg.function_name.clone(),
            parameters: Vec::new(),
            return_type: None,
            body,
        }
    }

    /// Walks blocks from `start` until `stop` (exclusive) or control leaves
    /// the function. `loop_back_to`, when set, is the header a loop body
    /// is allowed to fall back into silently (the natural back edge).
    fn build_region(
        &mut self,
        start: BlockId,
        stop: Option<BlockId>,
        loop_back_to: Option<BlockId>,
    ) -> BlockNode {
        let mut block_node = BlockNode::default();
        let mut current = Some(start);

        while let Some(b) = current {
            if Some(b) == stop {
                break;
            }
            if Some(b) == loop_back_to && self.visited.contains(&b) {
                break;
            }
            if !self.visited.insert(b) {
                self.diagnostics.report(udonc_model::Diagnostic::AmbiguousRecovery {
                    address: self.cfg.block(b).start_address,
                    detail: "block re-entered outside a recognized loop back edge".to_string(),
                });
                block_node.push(StatementNode::Goto {
                    target: self.label_for(b),
                });
                break;
            }

            if let Some(loop_) = self.loops_by_header.get(&b).cloned() {
                block_node.push(self.build_loop(&loop_));
                current = loop_.exit_block(self.cfg);
                continue;
            }

            if self.cfg.block(b).kind == BlockKind::Conditional {
                if let Some(cond) = identify_conditional(self.cfg, &self.post_dom, b) {
                    block_node
                        .statements
                        .extend(self.translate_straight_line(b, true));
                    let condition = self.condition_for_block(b);
                    let succs = self.cfg.successors(b).to_vec();
                    // `build_block_edges` inserts the JUMP_IF_FALSE target
                    // (the false continuation) before the fall-through
                    // (the true continuation).
                    let (false_succ, true_succ) = (succs[0], succs[1]);

                    match cond.merge {
                        Some(merge) => {
                            let then_block = self.build_region(true_succ, Some(merge), loop_back_to);
                            let else_block = if false_succ == merge {
                                BlockNode::default()
                            } else {
                                self.build_region(false_succ, Some(merge), loop_back_to)
                            };
                            if false_succ == merge {
                                block_node.push(StatementNode::If {
                                    condition,
                                    then_block,
                                });
                            } else {
                                block_node.push(StatementNode::IfElse {
                                    condition,
                                    then_block,
                                    else_block,
                                });
                            }
                            current = Some(merge);
                        }
                        None => {
                            let then_block = self.build_region(true_succ, None, loop_back_to);
                            let else_block = self.build_region(false_succ, None, loop_back_to);
                            block_node.push(StatementNode::IfElse {
                                condition,
                                then_block,
                                else_block,
                            });
                            current = None;
                        }
                    }
                    continue;
                }
            }

            if let Some(switch_info) = self.cfg.block(b).switch_info.clone() {
                block_node
                    .statements
                    .extend(self.translate_straight_line(b, false));
                let (stmt, merge) = self.build_switch(b, &switch_info);
                block_node.push(stmt);
                current = merge;
                continue;
            }

            block_node
                .statements
                .extend(self.translate_straight_line(b, false));

            if self.cfg.block(b).kind == BlockKind::Return || self.cfg.successors(b).is_empty() {
                block_node.push(StatementNode::Return);
                current = None;
            } else {
                current = self.cfg.successors(b).first().copied();
            }
        }

        block_node
    }

    fn build_loop(&mut self, loop_: &NaturalLoop) -> StatementNode {
        match loop_.kind {
            LoopKind::While => {
                let condition = self.condition_for_block(loop_.header);
                let body_entry = self
                    .cfg
                    .successors(loop_.header)
                    .iter()
                    .copied()
                    .find(|s| loop_.body.contains(s) && *s != loop_.header);
                let body = match body_entry {
                    Some(entry) => self.build_region(entry, None, Some(loop_.header)),
                    None => BlockNode::default(),
                };
                StatementNode::While { condition, body }
            }
            LoopKind::DoWhile => {
                let mut body = if loop_.header == loop_.latch {
                    BlockNode::default()
                } else {
                    self.build_region(loop_.header, Some(loop_.latch), Some(loop_.header))
                };
                self.visited.insert(loop_.latch);
                body.statements
                    .extend(self.translate_straight_line(loop_.latch, true));
                let condition = self.condition_for_block(loop_.latch);
                StatementNode::DoWhile { condition, body }
            }
        }
    }

    fn build_switch(
        &mut self,
        header: BlockId,
        switch_info: &udonc_analysis::SwitchInfo,
    ) -> (StatementNode, Option<BlockId>) {
        let index_var = self
            .variables
            .iter()
            .find(|v| v.name == switch_info.index_symbol)
            .map(|v| v.address);
        let expression = match index_var {
            Some(addr) => self.variable_to_ast(addr, &mut FxHashSet::default()),
            None => ExpressionNode::unknown("switch index"),
        };

        let target_blocks: Vec<BlockId> = switch_info
            .targets
            .iter()
            .filter_map(|&addr| self.cfg.block_at_address(addr))
            .collect();

        let merge = find_common_post_dominator(&self.post_dom, &target_blocks);

        // Default: most-frequent target, ties broken by lowest address
        // (Design Note §9).
        let mut counts: FxHashMap<u32, usize> = FxHashMap::default();
        for &t in &switch_info.targets {
            *counts.entry(t).or_insert(0) += 1;
        }
        let default_target = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(addr, _)| addr);

        let mut by_target: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for (index, &target) in switch_info.targets.iter().enumerate() {
            by_target.entry(target).or_default().push(index);
        }

        let mut cases = Vec::new();
        let mut default_case = None;
        for (&target, indices) in &by_target {
            let Some(block) = self.cfg.block_at_address(target) else {
                continue;
            };
            let body = match merge {
                Some(merge) => self.build_region(block, Some(merge), None),
                None => self.build_region(block, None, None),
            };
            let values = indices
                .iter()
                .map(|&i| ExpressionNode::Literal {
                    value: HeapValue::Int(i as i64),
                    literal_type: Some("System.Int32".to_string()),
                })
                .collect();
            let case = crate::ast::SwitchCaseNode {
                values,
                body,
                is_default: Some(target) == default_target,
            };
            if case.is_default {
                default_case = Some(case);
            } else {
                cases.push(case);
            }
        }
        cases.sort_by_key(|c| match c.values.first() {
            Some(ExpressionNode::Literal {
                value: HeapValue::Int(i),
                ..
            }) => *i,
            _ => i64::MAX,
        });

        (
            StatementNode::Switch {
                expression,
                cases,
                default_case,
            },
            merge,
        )
    }

    fn condition_for_block(&self, block_id: BlockId) -> ExpressionNode {
        let block = self.cfg.block(block_id);
        let Some(last) = block.last_instruction() else {
            return ExpressionNode::unknown("condition");
        };
        if last.opcode != OpCode::JumpIfFalse {
            return ExpressionNode::unknown("condition");
        }
        let index = block.instructions.len() - 1;
        let Some(pre) = self.sim.pre_state(block_id, index) else {
            return ExpressionNode::unknown("condition");
        };
        let Some(value) = pre.peek(0) else {
            return ExpressionNode::unknown("condition");
        };
        if value.kind != StackValueKind::HeapAddress {
            return ExpressionNode::unknown("condition");
        }
        self.variable_to_ast(value.address, &mut FxHashSet::default())
    }

    fn translate_straight_line(&self, block_id: BlockId, exclude_last: bool) -> Vec<StatementNode> {
        let block = self.cfg.block(block_id);
        let instructions: &[Instruction] = if exclude_last && !block.instructions.is_empty() {
            &block.instructions[..block.instructions.len() - 1]
        } else {
            &block.instructions
        };

        let mut statements = Vec::new();
        for inst in instructions {
            if let Some(stmt) = self.translate_instruction(inst) {
                statements.push(stmt);
            }
        }
        statements
    }

    fn translate_instruction(&self, inst: &Instruction) -> Option<StatementNode> {
        let expr = self.expressions.get(inst.address)?;
        match &expr.kind {
            ExpressionKind::Assignment { target, rhs } => {
                if !self.should_emit_assignment(target) {
                    return None;
                }
                let mut visited = FxHashSet::default();
                Some(StatementNode::Assignment {
                    target: target.clone(),
                    value: Some(self.expression_to_ast(rhs, &mut visited)),
                })
            }
            ExpressionKind::InternalCall {
                function_name,
                entry_point,
            } => Some(StatementNode::ExpressionStatement(ExpressionNode::Call {
                is_external: false,
                function_name: function_name
                    .clone()
                    .unwrap_or_else(|| format!("function_at_{entry_point:#010x}")),
                type_name: String::new(),
                original_name: String::new(),
                is_static: true,
                returns_void: true,
                receiver: None,
                emit_as_expression: false,
                arguments: Vec::new(),
            })),
            ExpressionKind::ExternalCall { .. }
            | ExpressionKind::PropertyAccess { .. }
            | ExpressionKind::Constructor { .. }
            | ExpressionKind::Operator { .. } => {
                if self.should_inline_output_expression(expr) {
                    return None;
                }
                let mut visited = FxHashSet::default();
                Some(StatementNode::ExpressionStatement(
                    self.expression_to_ast(expr, &mut visited),
                ))
            }
            ExpressionKind::Literal { .. } | ExpressionKind::Variable { .. } => None,
        }
    }

    fn should_emit_assignment(&self, target_name: &str) -> bool {
        let Some(var) = self.variable_by_name(target_name) else {
            return true;
        };
        if var.is_const {
            return false;
        }
        match var.scope {
            Scope::Temporary => {
                if var.read_sites.is_empty() {
                    return false;
                }
                self.get_inline_expression(var).is_none()
            }
            Scope::Local | Scope::Global => true,
        }
    }

    fn should_inline_output_expression(&self, expr: &Expression) -> bool {
        let Some(receiver_name) = receiver_variable_name(expr) else {
            return false;
        };
        let Some(var) = self.variable_by_name(&receiver_name) else {
            return false;
        };
        if var.scope != Scope::Temporary {
            return false;
        }
        match self.get_inline_expression(var) {
            Some(inline) => inline.source_address == expr.source_address,
            None => false,
        }
    }

    /// A temp's unique defining expression, if inlining it at its (unique)
    /// read site is legal per [`can_inline_temp`].
    fn get_inline_expression(&self, var: &Variable) -> Option<Expression> {
        if var.scope != Scope::Temporary {
            return None;
        }
        if var.write_sites.len() != 1 || var.read_sites.len() != 1 {
            return None;
        }
        let write_addr = *var.write_sites.iter().next().unwrap();
        let read_addr = *var.read_sites.iter().next().unwrap();
        let expr = self.expressions.get(write_addr)?;

        let candidate_rhs = match &expr.kind {
            ExpressionKind::Assignment { target, rhs } if target == &var.name => Some(rhs.as_ref().clone()),
            ExpressionKind::ExternalCall { .. }
            | ExpressionKind::Operator { .. }
            | ExpressionKind::PropertyAccess { .. }
            | ExpressionKind::Constructor { .. } => {
                if receiver_variable_name(expr).as_deref() == Some(var.name.as_str()) {
                    Some(expr.clone())
                } else {
                    None
                }
            }
            _ => None,
        }?;

        let rhs_reads = collect_variable_addresses(&candidate_rhs);
        let between: Vec<Instruction> = self
            .instructions_by_address
            .iter()
            .filter(|i| i.address > write_addr && i.address < read_addr)
            .cloned()
            .collect();

        let legal = can_inline_temp(write_addr, read_addr, between.into_iter(), &rhs_reads, |addr| {
            self.variables
                .get(addr)
                .map(|v| v.write_sites.iter().any(|&w| w > write_addr && w < read_addr))
                .unwrap_or(false)
        });

        legal.then_some(candidate_rhs)
    }

    fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    fn variable_to_ast(&self, address: u32, visited: &mut FxHashSet<u32>) -> ExpressionNode {
        let Some(var) = self.variables.get(address) else {
            return ExpressionNode::unknown(format!("addr_{address:#010x}"));
        };
        if !visited.insert(address) {
            return ExpressionNode::Variable {
                var_name: var.name.clone(),
                var_type: var.type_hint.clone(),
            };
        }

        if var.is_const {
            if let Some(literal) = self.literal_from_variable(var) {
                visited.remove(&address);
                return literal;
            }
        }

        if var.scope == Scope::Temporary {
            if let Some(inline) = self.get_inline_expression(var) {
                let node = self.expression_to_ast(&inline, visited);
                visited.remove(&address);
                return node;
            }
        }

        visited.remove(&address);
        ExpressionNode::Variable {
            var_name: var.name.clone(),
            var_type: var.type_hint.clone(),
        }
    }

    fn literal_from_variable(&self, var: &Variable) -> Option<ExpressionNode> {
        let heap = self.program.heap_entry(var.address)?;
        if !heap.value.is_serializable() {
            return None;
        }
        Some(ExpressionNode::Literal {
            value: heap.value.clone(),
            literal_type: var.type_hint.clone(),
        })
    }

    fn expression_to_ast(&self, expr: &Expression, visited: &mut FxHashSet<u32>) -> ExpressionNode {
        match &expr.kind {
            ExpressionKind::Literal { value, type_hint } => ExpressionNode::Literal {
                value: value.clone(),
                literal_type: type_hint.clone(),
            },
            ExpressionKind::Variable { address, .. } => self.variable_to_ast(*address, visited),
            ExpressionKind::Assignment { rhs, .. } => self.expression_to_ast(rhs, visited),
            ExpressionKind::InternalCall {
                function_name,
                entry_point,
            } => ExpressionNode::Call {
                is_external: false,
                function_name: function_name
                    .clone()
                    .unwrap_or_else(|| format!("function_at_{entry_point:#010x}")),
                type_name: String::new(),
                original_name: String::new(),
                is_static: true,
                returns_void: true,
                receiver: None,
                emit_as_expression: true,
                arguments: Vec::new(),
            },
            ExpressionKind::ExternalCall {
                signature,
                receiver,
                args,
                ..
            } => {
                let info = self.module_info.function_info(signature);
                let (module_name, _) = UdonModuleInfo::parse_signature(signature).unwrap_or(("", ""));
                let type_name = self
                    .module_info
                    .module_type(module_name)
                    .unwrap_or(module_name)
                    .to_string();
                ExpressionNode::Call {
                    is_external: true,
                    function_name: info.map(|f| f.name.clone()).unwrap_or_else(|| signature.clone()),
                    type_name,
                    original_name: info
                        .map(|f| f.display_name().to_string())
                        .unwrap_or_else(|| signature.clone()),
                    is_static: info.map(|f| f.is_static).unwrap_or(true),
                    returns_void: info.map(|f| f.returns_void).unwrap_or(true),
                    receiver: receiver
                        .as_ref()
                        .map(|r| Box::new(self.expression_to_ast(r, visited))),
                    emit_as_expression: expr.emit_as_expression,
                    arguments: args.iter().map(|a| self.expression_to_ast(a, visited)).collect(),
                }
            }
            ExpressionKind::PropertyAccess {
                kind,
                field,
                receiver,
                value,
            } => {
                let receiver_ast = self.expression_to_ast(receiver, visited);
                ExpressionNode::PropertyAccess {
                    kind: *kind,
                    field: field.clone(),
                    this: Box::new(receiver_ast),
                    target: None,
                    value: value
                        .as_ref()
                        .map(|v| Box::new(self.expression_to_ast(v, visited))),
                    emit_as_expression: expr.emit_as_expression,
                }
            }
            ExpressionKind::Constructor { type_name, args } => ExpressionNode::Construction {
                type_name: type_name.clone(),
                arguments: args.iter().map(|a| self.expression_to_ast(a, visited)).collect(),
                receiver: None,
                emit_as_expression: expr.emit_as_expression,
            },
            ExpressionKind::Operator { op, operands } => ExpressionNode::Operator {
                operator: op.clone(),
                operands: operands
                    .iter()
                    .map(|a| self.expression_to_ast(a, visited))
                    .collect(),
                receiver: None,
                emit_as_expression: expr.emit_as_expression,
            },
        }
    }

    fn label_for(&mut self, block: BlockId) -> String {
        if let Some(existing) = self.labels.get(&block) {
            return existing.clone();
        }
        let label = format!("label_{}", self.next_label);
        self.next_label += 1;
        self.labels.insert(block, label.clone());
        label
    }
}

/// The variable name of an expression's receiver (the argument consumed as
/// the output slot), if it has one and that argument is itself a variable.
fn receiver_variable_name(expr: &Expression) -> Option<String> {
    match &expr.kind {
        ExpressionKind::ExternalCall { receiver, .. } => match receiver.as_deref().map(|r| &r.kind) {
            Some(ExpressionKind::Variable { name, .. }) => Some(name.clone()),
            _ => None,
        },
        ExpressionKind::PropertyAccess {
            kind: PropertyAccessKind::Get,
            target,
            ..
        } => match target.as_deref().map(|r| &r.kind) {
            Some(ExpressionKind::Variable { name, .. }) => Some(name.clone()),
            _ => None,
        },
        ExpressionKind::Operator { operands, .. } => match operands.last().map(|r| &r.kind) {
            Some(ExpressionKind::Variable { name, .. }) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn collect_variable_addresses(expr: &Expression) -> Vec<u32> {
    let mut out = Vec::new();
    collect_variable_addresses_into(expr, &mut out);
    out
}

fn collect_variable_addresses_into(expr: &Expression, out: &mut Vec<u32>) {
    match &expr.kind {
        ExpressionKind::Variable { address, .. } => out.push(*address),
        ExpressionKind::Assignment { rhs, .. } => collect_variable_addresses_into(rhs, out),
        ExpressionKind::ExternalCall { receiver, args, .. } => {
            if let Some(r) = receiver {
                collect_variable_addresses_into(r, out);
            }
            for a in args {
                collect_variable_addresses_into(a, out);
            }
        }
        ExpressionKind::PropertyAccess { receiver, value, .. } => {
            collect_variable_addresses_into(receiver, out);
            if let Some(v) = value {
                collect_variable_addresses_into(v, out);
            }
        }
        ExpressionKind::Constructor { args, .. } => {
            for a in args {
                collect_variable_addresses_into(a, out);
            }
        }
        ExpressionKind::Operator { operands, .. } => {
            for a in operands {
                collect_variable_addresses_into(a, out);
            }
        }
        ExpressionKind::Literal { .. } | ExpressionKind::InternalCall { .. } => {}
    }
}

fn find_common_post_dominator(post_dom: &Dominance, blocks: &[BlockId]) -> Option<BlockId> {
    let mut iter = blocks.iter();
    let first = *iter.next()?;
    let mut common: FxHashSet<BlockId> = post_dom.chain(first).into_iter().collect();
    for &b in iter {
        let chain: FxHashSet<BlockId> = post_dom.chain(b).into_iter().collect();
        common.retain(|c| chain.contains(c));
    }
    // Prefer the candidate closest to the blocks, i.e. earliest in the
    // first block's own post-dominator chain.
    post_dom.chain(first).into_iter().find(|c| common.contains(c))
}

#[derive(Debug, Clone)]
pub struct VariableDeclList(pub Vec<VariableDeclNode>);

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_analysis::{BasicBlock, StackSimulator, SwitchInfo, VariableIdentifier};
    use udonc_model::{HeapEntry, SymbolInfo};

    fn block(
        start: u32,
        end: u32,
        instructions: Vec<Instruction>,
        kind: BlockKind,
        switch_info: Option<SwitchInfo>,
    ) -> BasicBlock {
        BasicBlock {
            start_address: start,
            end_address: end,
            instructions,
            kind,
            switch_info,
            indirect_jump_unresolved: false,
            function_name: Some("f".to_string()),
        }
    }

    fn push(address: u32, operand: u32, name: &str) -> Instruction {
        Instruction {
            address,
            opcode: OpCode::Push,
            operand: Some(operand),
            operand_name: Some(name.to_string()),
        }
    }

    fn recover(
        program: &UdonProgramData,
        module_info: &UdonModuleInfo,
        cfg: &ControlFlowGraph,
    ) -> (FunctionNode, Diagnostics) {
        let sim = StackSimulator::new(program, module_info).simulate(cfg);
        let variables = VariableIdentifier::new(program, module_info).identify(cfg, &sim);
        let mut diagnostics = Diagnostics::new();
        let expressions =
            ExpressionBuilder::new(program, module_info, &variables).build(cfg, &sim, &mut diagnostics);
        let function_node = FunctionRecoverer::new(
            cfg,
            &expressions,
            &variables,
            &sim,
            program,
            module_info,
            &mut diagnostics,
        )
        .build();
        (function_node, diagnostics)
    }

    /// `x = 5; return;` — a single straight-line block with no branches.
    #[test]
    fn straight_line_assignment_then_return() {
        let mut program = UdonProgramData::default();
        program
            .symbols
            .insert("__0_x".to_string(), SymbolInfo::new("__0_x", "System.Int32", 0x100));
        program.heap_initial_values.insert(
            0x104,
            HeapEntry {
                address: 0x104,
                type_name: "System.Int32".to_string(),
                value: HeapValue::Int(5),
            },
        );
        program
            .symbols
            .insert("__const_SystemInt32_5".to_string(), SymbolInfo::new("__const_SystemInt32_5", "System.Int32", 0x104));

        let instructions = vec![
            // COPY's source is the top of stack, target the next slot down
            // (§4.4), so the target address is pushed first.
            push(0, 0x100, "__0_x"),
            push(8, 0x104, "__const_SystemInt32_5"),
            Instruction {
                address: 16,
                opcode: OpCode::Copy,
                operand: None,
                operand_name: None,
            },
            Instruction {
                address: 20,
                opcode: OpCode::JumpIndirect,
                operand: None,
                operand_name: None,
            },
        ];

        let cfg = ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![block(0, 20, instructions, BlockKind::Return, None)],
            successors: vec![vec![]],
            predecessors: vec![vec![]],
        };

        let module_info = UdonModuleInfo::new();
        let (function_node, _diagnostics) = recover(&program, &module_info, &cfg);

        assert_eq!(function_node.body.statements.len(), 2);
        match &function_node.body.statements[0] {
            StatementNode::Assignment { target, value } => {
                assert_eq!(target, "__0_x");
                assert!(matches!(
                    value,
                    Some(ExpressionNode::Literal {
                        value: HeapValue::Int(5),
                        ..
                    })
                ));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
        assert!(matches!(
            function_node.body.statements[1],
            StatementNode::Return
        ));
    }

    /// `if (flag) { x = 1 } else { x = 2 }` — verifies the false/true
    /// successor ordering is not swapped when building the branches.
    #[test]
    fn if_else_branches_are_not_swapped() {
        let mut program = UdonProgramData::default();
        for (name, addr) in [("__gintnl_flag", 0x200u32), ("__0_x", 0x100)] {
            program
                .symbols
                .insert(name.to_string(), SymbolInfo::new(name, "System.Int32", addr));
        }
        for (addr, value) in [(0x108u32, 1i64), (0x110, 2)] {
            program.heap_initial_values.insert(
                addr,
                HeapEntry {
                    address: addr,
                    type_name: "System.Int32".to_string(),
                    value: HeapValue::Int(value),
                },
            );
        }

        let cond_block = block(
            0,
            8,
            vec![
                push(0, 0x200, "__gintnl_flag"),
                Instruction {
                    address: 8,
                    opcode: OpCode::JumpIfFalse,
                    operand: Some(100),
                    operand_name: None,
                },
            ],
            BlockKind::Conditional,
            None,
        );
        let true_block = block(
            16,
            36,
            vec![
                push(16, 0x100, "__0_x"),
                push(24, 0x108, "__const_1"),
                Instruction {
                    address: 32,
                    opcode: OpCode::Copy,
                    operand: None,
                    operand_name: None,
                },
                Instruction {
                    address: 36,
                    opcode: OpCode::Jump,
                    operand: Some(120),
                    operand_name: None,
                },
            ],
            BlockKind::Jump,
            None,
        );
        let false_block = block(
            100,
            116,
            vec![
                push(100, 0x100, "__0_x"),
                push(108, 0x110, "__const_2"),
                Instruction {
                    address: 116,
                    opcode: OpCode::Copy,
                    operand: None,
                    operand_name: None,
                },
            ],
            BlockKind::Normal,
            None,
        );
        let merge_block = block(
            120,
            120,
            vec![Instruction {
                address: 120,
                opcode: OpCode::JumpIndirect,
                operand: None,
                operand_name: None,
            }],
            BlockKind::Return,
            None,
        );

        let cfg = ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            // successors[0] is the JUMP_IF_FALSE target (false branch, block
            // 2); successors[1] is the fall-through (true branch, block 1).
            blocks: vec![cond_block, true_block, false_block, merge_block],
            successors: vec![vec![2, 1], vec![3], vec![3], vec![]],
            predecessors: vec![vec![], vec![0], vec![0], vec![1, 2]],
        };

        let module_info = UdonModuleInfo::new();
        let (function_node, _diagnostics) = recover(&program, &module_info, &cfg);

        let StatementNode::IfElse {
            then_block,
            else_block,
            ..
        } = &function_node.body.statements[0]
        else {
            panic!("expected an if/else statement, got {:?}", function_node.body.statements[0]);
        };

        // The fall-through block (true branch) assigns x = 1; the jump
        // target (false branch) assigns x = 2. A branch swap would put
        // these the wrong way around.
        let then_assignment = &then_block.statements[0];
        let else_assignment = &else_block.statements[0];
        match (then_assignment, else_assignment) {
            (
                StatementNode::Assignment { value: Some(then_value), .. },
                StatementNode::Assignment { value: Some(else_value), .. },
            ) => {
                assert!(matches!(
                    then_value,
                    ExpressionNode::Literal { value: HeapValue::Int(1), .. }
                ));
                assert!(matches!(
                    else_value,
                    ExpressionNode::Literal { value: HeapValue::Int(2), .. }
                ));
            }
            other => panic!("expected two assignments, got {other:?}"),
        }
    }

    /// A two-way jump table: both targets share a common post-dominated
    /// return block, and the default case is the more frequent target.
    #[test]
    fn build_switch_picks_most_frequent_default() {
        let mut program = UdonProgramData::default();
        program
            .symbols
            .insert("__gintnl_index".to_string(), SymbolInfo::new("__gintnl_index", "System.Int32", 0x300));

        let header = block(
            0,
            0,
            vec![Instruction {
                address: 0,
                opcode: OpCode::JumpIndirect,
                operand: None,
                operand_name: None,
            }],
            BlockKind::Jump,
            Some(SwitchInfo {
                index_symbol: "__gintnl_index".to_string(),
                targets: vec![100, 100, 200],
            }),
        );
        let case_a = block(
            100,
            100,
            vec![Instruction {
                address: 100,
                opcode: OpCode::Jump,
                operand: Some(300),
                operand_name: None,
            }],
            BlockKind::Jump,
            None,
        );
        let case_b = block(
            200,
            200,
            vec![Instruction {
                address: 200,
                opcode: OpCode::Jump,
                operand: Some(300),
                operand_name: None,
            }],
            BlockKind::Jump,
            None,
        );
        let merge = block(
            300,
            300,
            vec![Instruction {
                address: 300,
                opcode: OpCode::JumpIndirect,
                operand: None,
                operand_name: None,
            }],
            BlockKind::Return,
            None,
        );

        let cfg = ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![header, case_a, case_b, merge],
            successors: vec![vec![1, 2], vec![3], vec![3], vec![]],
            predecessors: vec![vec![], vec![0], vec![0], vec![1, 2]],
        };

        let module_info = UdonModuleInfo::new();
        let (function_node, _diagnostics) = recover(&program, &module_info, &cfg);

        let StatementNode::Switch { cases, default_case, .. } = &function_node.body.statements[0] else {
            panic!("expected a switch statement, got {:?}", function_node.body.statements[0]);
        };
        // Target 100 appears twice (indices 0 and 1) so it wins the default
        // slot; only target 200 remains as an explicit case.
        assert!(default_case.is_some());
        assert_eq!(cases.len(), 1);
    }

    /// `while (flag) { x = x } ` — the header is itself the conditional
    /// test with an out-of-body exit edge, so this recovers as a `while`.
    #[test]
    fn build_loop_recovers_while() {
        let mut program = UdonProgramData::default();
        program
            .symbols
            .insert("__gintnl_flag".to_string(), SymbolInfo::new("__gintnl_flag", "System.Boolean", 0x200));

        let header = block(
            0,
            8,
            vec![
                push(0, 0x200, "__gintnl_flag"),
                Instruction {
                    address: 8,
                    opcode: OpCode::JumpIfFalse,
                    operand: Some(24),
                    operand_name: None,
                },
            ],
            BlockKind::Conditional,
            None,
        );
        let body = block(
            16,
            16,
            vec![Instruction {
                address: 16,
                opcode: OpCode::Jump,
                operand: Some(0),
                operand_name: None,
            }],
            BlockKind::Jump,
            None,
        );
        let exit = block(
            24,
            24,
            vec![Instruction {
                address: 24,
                opcode: OpCode::JumpIndirect,
                operand: None,
                operand_name: None,
            }],
            BlockKind::Return,
            None,
        );

        let cfg = ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![header, body, exit],
            successors: vec![vec![2, 1], vec![0], vec![]],
            predecessors: vec![vec![1], vec![0], vec![0]],
        };

        let module_info = UdonModuleInfo::new();
        let (function_node, _diagnostics) = recover(&program, &module_info, &cfg);

        assert!(matches!(
            function_node.body.statements[0],
            StatementNode::While { .. }
        ));
    }
}
