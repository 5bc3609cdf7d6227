//! Builds one control-flow graph per function: edge construction, hidden
//! entry-point discovery via call-convention inference, and best-effort
//! function naming (§4.3).

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use udonc_model::{
    return_slot_function_name, DecompileResult, Diagnostic, Diagnostics, EntryPointInfo,
    Instruction, OpCode, UdonModuleInfo, UdonProgramData,
};

use crate::block::{BasicBlock, BasicBlockIdentifier, BlockKind};
use crate::parser::{resolve_call_jump_targets, BytecodeParser, ParsedProgram};

pub type BlockId = usize;

/// A per-function control-flow graph over an arena of blocks, addressed by
/// small integer ids rather than owned pointers (Design Note §9: the graph
/// is cyclic by nature, so an arena sidesteps ownership cycles).
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub function_name: String,
    pub is_public: bool,
    pub entry_block: BlockId,
    pub blocks: Vec<BasicBlock>,
    pub successors: Vec<Vec<BlockId>>,
    pub predecessors: Vec<Vec<BlockId>>,
}

impl ControlFlowGraph {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_at_address(&self, address: u32) -> Option<BlockId> {
        self.blocks.iter().position(|b| b.contains_address(address))
    }

    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        &self.successors[id]
    }

    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.predecessors[id]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        0..self.blocks.len()
    }
}

/// Builds every function's [`ControlFlowGraph`] from a program's
/// instruction stream, growing `program.entry_points` in place as hidden
/// entries are discovered.
pub struct CfgBuilder<'a> {
    program: &'a mut UdonProgramData,
    module_info: &'a UdonModuleInfo,
    diagnostics: &'a mut Diagnostics,
    next_generated_id: u32,
}

impl<'a> CfgBuilder<'a> {
    pub fn new(
        program: &'a mut UdonProgramData,
        module_info: &'a UdonModuleInfo,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            program,
            module_info,
            diagnostics,
            next_generated_id: 0,
        }
    }

    pub fn build(&mut self) -> DecompileResult<Vec<ControlFlowGraph>> {
        let mut parsed = BytecodeParser::new(self.program).parse()?;
        resolve_call_jump_targets(self.program, &parsed);

        self.discover_hidden_entry_points(&mut parsed)?;

        let entry_addresses: Vec<u32> = self.program.entry_points.iter().map(|e| e.address).collect();
        let identifier = BasicBlockIdentifier::new(self.program, &parsed, entry_addresses.iter().copied());
        let all_blocks = identifier.identify();

        let address_to_block: FxHashMap<u32, BlockId> = all_blocks
            .iter()
            .enumerate()
            .map(|(id, b)| (b.start_address, id))
            .collect();

        let (successors, predecessors) =
            build_block_edges(self.program, &all_blocks, &address_to_block, self.diagnostics);

        let mut cfgs = Vec::new();
        let entry_points = self.program.entry_points.clone();
        for entry in &entry_points {
            let Some(&entry_block) = address_to_block.get(&entry.address) else {
                warn!(address = entry.address, "no block found for entry point");
                continue;
            };
            let function_blocks = reachable_blocks(entry_block, &successors);
            let function_name = entry.name.clone().unwrap_or_else(|| {
                self.recover_function_name(&all_blocks, &function_blocks)
            });

            cfgs.push(build_function_cfg(
                function_name,
                entry.name.is_some(),
                entry_block,
                &function_blocks,
                &all_blocks,
                &successors,
                &predecessors,
            ));
        }

        Ok(cfgs)
    }

    /// Call-convention inference to fixpoint: a `JUMP` whose top-of-stack
    /// literal equals its own fall-through address is a call, and its
    /// target is a hidden function entry. Re-run after each new discovery
    /// because block partitioning shifts (§4.3).
    fn discover_hidden_entry_points(&mut self, parsed: &mut ParsedProgram) -> DecompileResult<()> {
        loop {
            let entry_addresses: Vec<u32> =
                self.program.entry_points.iter().map(|e| e.address).collect();
            let identifier =
                BasicBlockIdentifier::new(self.program, parsed, entry_addresses.iter().copied());
            let blocks = identifier.identify();

            let mut discovered = Vec::new();
            for block in &blocks {
                if let Some(target) = self.find_call_jump_target(block) {
                    if self.program.entry_point_by_address(target).is_none() {
                        discovered.push(target);
                    }
                }
            }

            if discovered.is_empty() {
                break;
            }

            for target in discovered {
                debug!(target, "discovered hidden entry point via call convention");
                self.program
                    .add_entry_point_if_new(EntryPointInfo::new(None, target));
            }

            // Re-parse is unnecessary (the byte code is unchanged); only
            // block partitioning depends on the new entry point, which the
            // next loop iteration recomputes.
            *parsed = BytecodeParser::new(self.program).parse()?;
            resolve_call_jump_targets(self.program, parsed);
        }
        Ok(())
    }

    /// Tracks known-literal stack values through a block looking for a
    /// `JUMP` whose top-of-stack value is the jump's own fall-through
    /// address — the call-convention pattern described in the glossary's
    /// "Call jump".
    fn find_call_jump_target(&self, block: &BasicBlock) -> Option<u32> {
        let mut literals: Vec<Option<u32>> = Vec::new();
        for inst in &block.instructions {
            match inst.opcode {
                OpCode::Push => {
                    let value = inst.operand.and_then(|addr| {
                        self.program.heap_entry(addr).and_then(|h| h.value.as_u32())
                    });
                    literals.push(value);
                }
                OpCode::Pop | OpCode::JumpIfFalse => {
                    literals.pop();
                }
                OpCode::Copy => {
                    literals.pop();
                    literals.pop();
                }
                OpCode::Extern => {
                    let arity = inst
                        .operand_name
                        .as_deref()
                        .and_then(|sig| self.module_info.function_info(sig))
                        .map(|f| f.parameter_count())
                        .unwrap_or(0);
                    for _ in 0..arity {
                        literals.pop();
                    }
                }
                OpCode::Jump => {
                    let fall_through = inst.next_address();
                    if literals.last().copied().flatten() == Some(fall_through) {
                        return inst.jump_target();
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn recover_function_name(&mut self, all_blocks: &[BasicBlock], function_blocks: &[BlockId]) -> String {
        let instructions: Vec<&Instruction> = function_blocks
            .iter()
            .flat_map(|&id| all_blocks[id].instructions.iter())
            .collect();

        let mut candidates = Vec::new();
        for window in instructions.windows(3) {
            let [_, push, copy] = window else { continue };
            if copy.opcode != OpCode::Copy {
                continue;
            }
            if push.opcode != OpCode::Push {
                continue;
            }
            let Some(symbol_name) = push.operand_name.as_deref() else {
                continue;
            };
            if let Some(name) = return_slot_function_name(symbol_name) {
                candidates.push(name.to_string());
            }
        }

        if !candidates.is_empty() {
            let distinct: FxHashSet<&String> = candidates.iter().collect();
            if distinct.len() > 1 {
                warn!(
                    candidates = ?distinct,
                    "conflicting function-name candidates, using the first"
                );
            }
            return candidates.into_iter().next().unwrap();
        }

        let name = format!("function_{}", self.next_generated_id);
        self.next_generated_id += 1;
        name
    }
}

fn build_block_edges(
    program: &UdonProgramData,
    blocks: &[BasicBlock],
    address_to_block: &FxHashMap<u32, BlockId>,
    diagnostics: &mut Diagnostics,
) -> (Vec<Vec<BlockId>>, Vec<Vec<BlockId>>) {
    let mut successors = vec![Vec::new(); blocks.len()];
    let mut predecessors = vec![Vec::new(); blocks.len()];

    let mut add_edge = |from: BlockId, to: BlockId, successors: &mut Vec<Vec<BlockId>>, predecessors: &mut Vec<Vec<BlockId>>| {
        if !successors[from].contains(&to) {
            successors[from].push(to);
            predecessors[to].push(from);
        }
    };

    for (id, block) in blocks.iter().enumerate() {
        let Some(last) = block.last_instruction() else {
            continue;
        };

        match last.opcode {
            OpCode::Jump => {
                let target = last.jump_target().expect("JUMP always carries a target operand");
                let is_call_jump = program
                    .entry_points
                    .iter()
                    .any(|e| e.call_jump_target == Some(target));
                let dest = if is_call_jump {
                    address_to_block.get(&last.next_address())
                } else {
                    address_to_block.get(&target)
                };
                if let Some(&dest) = dest {
                    add_edge(id, dest, &mut successors, &mut predecessors);
                }
            }
            OpCode::JumpIfFalse => {
                // Insertion order matters: the jump target (the false
                // continuation) goes first, the fall-through (the true
                // continuation) second. Callers that destructure
                // `successors(block)` as `[a, b]` rely on this order.
                if let Some(target) = last.jump_target() {
                    if let Some(&dest) = address_to_block.get(&target) {
                        add_edge(id, dest, &mut successors, &mut predecessors);
                    }
                }
                if let Some(&dest) = address_to_block.get(&last.next_address()) {
                    add_edge(id, dest, &mut successors, &mut predecessors);
                }
            }
            OpCode::JumpIndirect => {
                if let Some(info) = &block.switch_info {
                    for &target in &info.targets {
                        if let Some(&dest) = address_to_block.get(&target) {
                            add_edge(id, dest, &mut successors, &mut predecessors);
                        }
                    }
                } else if block.indirect_jump_unresolved {
                    diagnostics.report(Diagnostic::UnresolvedIndirectJump {
                        address: last.address,
                    });
                }
                // Confirmed return jumps: no outgoing edge.
            }
            _ => {
                if let Some(&dest) = address_to_block.get(&last.next_address()) {
                    add_edge(id, dest, &mut successors, &mut predecessors);
                }
            }
        }
    }

    (successors, predecessors)
}

fn reachable_blocks(entry: BlockId, successors: &[Vec<BlockId>]) -> Vec<BlockId> {
    let mut visited = FxHashSet::default();
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        stack.extend(successors[id].iter().copied());
    }
    let mut result: Vec<BlockId> = visited.into_iter().collect();
    result.sort_unstable();
    result
}

fn build_function_cfg(
    function_name: String,
    is_public: bool,
    entry_block: BlockId,
    function_blocks: &[BlockId],
    all_blocks: &[BasicBlock],
    successors: &[Vec<BlockId>],
    predecessors: &[Vec<BlockId>],
) -> ControlFlowGraph {
    let member_set: FxHashSet<BlockId> = function_blocks.iter().copied().collect();

    // Renumber so the CFG's own arena is dense starting at 0, with the
    // entry block's relative order preserved.
    let mut old_to_new = FxHashMap::default();
    for (new_id, &old_id) in function_blocks.iter().enumerate() {
        old_to_new.insert(old_id, new_id);
    }

    let mut blocks = Vec::with_capacity(function_blocks.len());
    let mut new_successors = vec![Vec::new(); function_blocks.len()];
    let mut new_predecessors = vec![Vec::new(); function_blocks.len()];

    for &old_id in function_blocks {
        let mut block = all_blocks[old_id].clone();
        block.function_name = Some(function_name.clone());
        blocks.push(block);

        let new_id = old_to_new[&old_id];
        for &succ in &successors[old_id] {
            if member_set.contains(&succ) {
                new_successors[new_id].push(old_to_new[&succ]);
            }
        }
        for &pred in &predecessors[old_id] {
            if member_set.contains(&pred) {
                new_predecessors[new_id].push(old_to_new[&pred]);
            }
        }
    }

    ControlFlowGraph {
        function_name,
        is_public,
        entry_block: old_to_new[&entry_block],
        blocks,
        successors: new_successors,
        predecessors: new_predecessors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst_bytes(opcode_byte: u32, operand: Option<u32>) -> Vec<u8> {
        let mut bytes = opcode_byte.to_be_bytes().to_vec();
        if let Some(op) = operand {
            bytes.extend_from_slice(&op.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn single_block_function_has_no_successors_when_returning() {
        // A single JUMP_INDIRECT has too few preceding instructions to
        // attempt the switch preamble match, so it's unresolved rather than
        // a confirmed return jump; either way it produces no outgoing edge.
        let bytes = inst_bytes(8, Some(0));
        let mut program = UdonProgramData {
            byte_code_length: bytes.len(),
            byte_code: bytes,
            ..Default::default()
        };
        program
            .entry_points
            .push(EntryPointInfo::new(Some("Main".to_string()), 0));

        let module_info = UdonModuleInfo::new();
        let mut diagnostics = Diagnostics::new();
        let mut builder = CfgBuilder::new(&mut program, &module_info, &mut diagnostics);
        let cfgs = builder.build().expect("builds");

        assert_eq!(cfgs.len(), 1);
        let cfg = &cfgs[0];
        assert_eq!(cfg.function_name, "Main");
        assert!(cfg.successors(cfg.entry_block).is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::UnresolvedIndirectJump { .. })
        ));
    }

    #[test]
    fn conditional_jump_produces_two_edges() {
        let mut bytes = Vec::new();
        bytes.extend(inst_bytes(4, Some(16))); // 0: JUMP_IF_FALSE -> 16
        bytes.extend(inst_bytes(8, None)); // 8: JUMP_INDIRECT (true branch, no outgoing edge)
        bytes.extend(inst_bytes(8, None)); // 16: JUMP_INDIRECT (false branch, no outgoing edge)

        let mut program = UdonProgramData {
            byte_code_length: bytes.len(),
            byte_code: bytes,
            ..Default::default()
        };
        program
            .entry_points
            .push(EntryPointInfo::new(Some("Cond".to_string()), 0));

        let module_info = UdonModuleInfo::new();
        let mut diagnostics = Diagnostics::new();
        let mut builder = CfgBuilder::new(&mut program, &module_info, &mut diagnostics);
        let cfgs = builder.build().expect("builds");

        let cfg = &cfgs[0];
        assert_eq!(cfg.successors(cfg.entry_block).len(), 2);
    }
}
