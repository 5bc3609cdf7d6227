//! Partitions the instruction stream into basic blocks and recognizes
//! jump-table switches hidden behind an indirect jump (§4.2).

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use udonc_model::{Instruction, OpCode, UdonProgramData};

use crate::parser::ParsedProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Normal,
    Conditional,
    Jump,
    Return,
}

/// The resolved target list of a jump table, plus the symbol it was read
/// from (kept for diagnostics and for emitting the switch expression).
#[derive(Debug, Clone)]
pub struct SwitchInfo {
    pub index_symbol: String,
    pub targets: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub start_address: u32,
    pub end_address: u32,
    pub instructions: Vec<Instruction>,
    pub kind: BlockKind,
    pub switch_info: Option<SwitchInfo>,
    /// `true` when this block ends in a `JUMP_INDIRECT` that matched neither
    /// the switch preamble nor had enough preceding instructions to even
    /// attempt that match — distinct from a confirmed return jump.
    pub indirect_jump_unresolved: bool,
    pub function_name: Option<String>,
}

impl BasicBlock {
    pub fn first_instruction(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    pub fn contains_address(&self, address: u32) -> bool {
        self.start_address <= address && address <= self.end_address
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Splits a parsed instruction stream into basic blocks.
///
/// Switch-table and return-jump classification of every `JUMP_INDIRECT` is
/// computed once up front (`indirect_jump_kinds`) and reused both for block
/// splitting and, later, for CFG edge construction.
pub struct BasicBlockIdentifier<'a> {
    program: &'a UdonProgramData,
    parsed: &'a ParsedProgram,
    entry_points: FxHashSet<u32>,
}

pub enum IndirectJumpKind {
    Switch(SwitchInfo),
    Return,
    Unresolved,
}

impl<'a> BasicBlockIdentifier<'a> {
    pub fn new(
        program: &'a UdonProgramData,
        parsed: &'a ParsedProgram,
        entry_points: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            program,
            parsed,
            entry_points: entry_points.into_iter().collect(),
        }
    }

    pub fn identify(&self) -> Vec<BasicBlock> {
        let indirect_kinds = self.classify_indirect_jumps();
        let starts = self.find_block_starts(&indirect_kinds);
        self.split_into_blocks(starts, &indirect_kinds)
    }

    /// Classifies every `JUMP_INDIRECT` as a switch (recognized four
    /// instruction preamble), a confirmed return jump (preamble checked and
    /// didn't match), or unresolved (too few preceding instructions to even
    /// attempt the preamble match).
    fn classify_indirect_jumps(&self) -> FxHashMap<u32, IndirectJumpKind> {
        let mut kinds = FxHashMap::default();
        let instructions = &self.parsed.instructions;

        for (idx, inst) in instructions.iter().enumerate() {
            if inst.opcode != OpCode::JumpIndirect {
                continue;
            }
            let kind = if idx >= 4 {
                self.try_match_switch_preamble(&instructions[idx - 4..idx])
                    .map(IndirectJumpKind::Switch)
                    .unwrap_or(IndirectJumpKind::Return)
            } else {
                IndirectJumpKind::Unresolved
            };
            kinds.insert(inst.address, kind);
        }

        kinds
    }

    /// Matches push(array-symbol), push(switch-expr), push(array-symbol),
    /// extern(uint32-array-indexer) against the four instructions
    /// immediately preceding a `JUMP_INDIRECT` (§4.2).
    fn try_match_switch_preamble(&self, window: &[Instruction]) -> Option<SwitchInfo> {
        let [push_array, push_expr, push_array_again, extern_index] = window else {
            return None;
        };
        if push_array.opcode != OpCode::Push
            || push_expr.opcode != OpCode::Push
            || push_array_again.opcode != OpCode::Push
            || extern_index.opcode != OpCode::Extern
        {
            return None;
        }
        if push_array.operand != push_array_again.operand {
            return None;
        }
        let array_address = push_array.operand?;
        let array_symbol = self.program.symbol_by_address(array_address)?;
        if !array_symbol.brief_type().contains("[]") {
            return None;
        }
        let array_heap = self.program.heap_entry(array_address)?;
        let targets = array_heap.value.as_u32_array()?.to_vec();

        Some(SwitchInfo {
            index_symbol: array_symbol.name.clone(),
            targets,
        })
    }

    fn find_block_starts(&self, indirect_kinds: &FxHashMap<u32, IndirectJumpKind>) -> FxHashSet<u32> {
        let mut starts = FxHashSet::default();
        starts.extend(self.entry_points.iter().copied());

        if let Some(first) = self.parsed.instructions.first() {
            starts.insert(first.address);
        }

        for inst in &self.parsed.instructions {
            match inst.opcode {
                OpCode::Jump | OpCode::JumpIfFalse => {
                    if let Some(target) = inst.jump_target() {
                        starts.insert(target);
                    }
                    let next = inst.next_address();
                    if self.parsed.instruction_at(next).is_some() {
                        starts.insert(next);
                    }
                }
                OpCode::JumpIndirect => {
                    if let Some(IndirectJumpKind::Switch(info)) = indirect_kinds.get(&inst.address)
                    {
                        starts.extend(info.targets.iter().copied());
                    }
                }
                _ => {}
            }
        }

        starts
    }

    fn split_into_blocks(
        &self,
        starts: FxHashSet<u32>,
        indirect_kinds: &FxHashMap<u32, IndirectJumpKind>,
    ) -> Vec<BasicBlock> {
        let mut sorted_starts: Vec<u32> = starts.into_iter().collect();
        sorted_starts.sort_unstable();

        let mut blocks = Vec::with_capacity(sorted_starts.len());
        for (i, &start) in sorted_starts.iter().enumerate() {
            let end_bound = sorted_starts.get(i + 1).copied();
            let instructions = self.instructions_in_range(start, end_bound);
            if instructions.is_empty() {
                continue;
            }
            let end_address = instructions.last().unwrap().address;
            let kind = self.classify_block_kind(&instructions, indirect_kinds);
            let indirect_kind = instructions
                .last()
                .filter(|inst| inst.opcode == OpCode::JumpIndirect)
                .and_then(|inst| indirect_kinds.get(&inst.address));
            let switch_info = indirect_kind.and_then(|kind| match kind {
                IndirectJumpKind::Switch(info) => Some(info.clone()),
                _ => None,
            });
            let indirect_jump_unresolved =
                matches!(indirect_kind, Some(IndirectJumpKind::Unresolved));

            blocks.push(BasicBlock {
                start_address: start,
                end_address,
                instructions,
                kind,
                switch_info,
                indirect_jump_unresolved,
                function_name: None,
            });
        }

        debug!(blocks = blocks.len(), "identified basic blocks");
        blocks
    }

    fn instructions_in_range(&self, start: u32, end_bound: Option<u32>) -> Vec<Instruction> {
        let mut result = Vec::new();
        let mut address = start;
        loop {
            if let Some(end) = end_bound {
                if address >= end {
                    break;
                }
            }
            match self.parsed.instruction_at(address) {
                Some(inst) => {
                    let next = inst.next_address();
                    result.push(inst.clone());
                    address = next;
                }
                None => break,
            }
        }
        result
    }

    fn classify_block_kind(
        &self,
        instructions: &[Instruction],
        indirect_kinds: &FxHashMap<u32, IndirectJumpKind>,
    ) -> BlockKind {
        let Some(last) = instructions.last() else {
            return BlockKind::Normal;
        };
        match last.opcode {
            OpCode::JumpIfFalse => BlockKind::Conditional,
            OpCode::Jump => BlockKind::Jump,
            OpCode::JumpIndirect => match indirect_kinds.get(&last.address) {
                Some(IndirectJumpKind::Switch(_)) => BlockKind::Jump,
                _ => BlockKind::Return,
            },
            _ => BlockKind::Normal,
        }
    }
}
