//! Simulates the operand stack and heap writes over a function's blocks,
//! recording the *pre-instruction* stack state consumed by later stages
//! (§4.4).

use rustc_hash::FxHashMap;
use tracing::debug;

use udonc_model::{Instruction, OpCode, UdonModuleInfo, UdonProgramData};

use crate::cfg::{BlockId, ControlFlowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackValueKind {
    /// A value known at compile time: the address is a heap cell whose
    /// initial value the simulator can read directly.
    HeapAddress,
    /// A bare literal not backed by any symbol or heap cell (rare; the
    /// compiler backs almost every PUSH operand with a heap slot).
    Immediate,
}

#[derive(Debug, Clone)]
pub struct StackValue {
    pub address: u32,
    pub kind: StackValueKind,
    pub type_hint: Option<String>,
}

/// The address space's known/unknown status, per Design Note §9's "store
/// per-instruction state as a vector, not a hash map" — we follow that for
/// the stack; the heap here only needs coarse known/unknown tracking since
/// its concrete values are read directly from `UdonProgramData` elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapCellStatus {
    Init,
    Known,
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct StackFrame {
    pub values: Vec<StackValue>,
}

impl StackFrame {
    pub fn push(&mut self, value: StackValue) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Option<StackValue> {
        self.values.pop()
    }

    /// `depth` 0 is the top of stack.
    pub fn peek(&self, depth: usize) -> Option<&StackValue> {
        if depth < self.values.len() {
            self.values.get(self.values.len() - 1 - depth)
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }
}

/// Per-instruction pre-state, indexed by `(block, instruction index within
/// block)` rather than by address, per Design Note §9.
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub pre_states: FxHashMap<(BlockId, usize), StackFrame>,
    pub block_entry_states: FxHashMap<BlockId, StackFrame>,
    pub block_exit_states: FxHashMap<BlockId, StackFrame>,
    heap_status: FxHashMap<u32, HeapCellStatus>,
}

impl SimulationResult {
    pub fn pre_state(&self, block: BlockId, index: usize) -> Option<&StackFrame> {
        self.pre_states.get(&(block, index))
    }

    pub fn heap_status(&self, address: u32) -> HeapCellStatus {
        self.heap_status
            .get(&address)
            .copied()
            .unwrap_or(HeapCellStatus::Init)
    }
}

pub struct StackSimulator<'a> {
    program: &'a UdonProgramData,
    module_info: &'a UdonModuleInfo,
}

impl<'a> StackSimulator<'a> {
    pub fn new(program: &'a UdonProgramData, module_info: &'a UdonModuleInfo) -> Self {
        Self {
            program,
            module_info,
        }
    }

    /// Depth-first traversal from the entry block; each block is entered
    /// with a copy of its first-visited predecessor's exit stack. A block
    /// reached again through a different predecessor is not re-simulated
    /// (§4.4: "first predecessor wins; re-analysis is not performed").
    pub fn simulate(&self, cfg: &ControlFlowGraph) -> SimulationResult {
        let mut result = SimulationResult::default();
        let mut visited = vec![false; cfg.blocks.len()];
        let mut stack = vec![cfg.entry_block];

        while let Some(block_id) = stack.pop() {
            if visited[block_id] {
                continue;
            }
            visited[block_id] = true;

            let entry_state = result
                .block_entry_states
                .get(&block_id)
                .cloned()
                .unwrap_or_default();

            let exit_state = self.simulate_block(cfg, block_id, entry_state, &mut result);
            result.block_exit_states.insert(block_id, exit_state.clone());

            for &succ in cfg.successors(block_id) {
                if !result.block_entry_states.contains_key(&succ) {
                    result.block_entry_states.insert(succ, exit_state.clone());
                }
                if !visited[succ] {
                    stack.push(succ);
                }
            }
        }

        debug!(function = %cfg.function_name, blocks = cfg.blocks.len(), "stack simulation complete");
        result
    }

    fn simulate_block(
        &self,
        cfg: &ControlFlowGraph,
        block_id: BlockId,
        entry_state: StackFrame,
        result: &mut SimulationResult,
    ) -> StackFrame {
        result.block_entry_states.insert(block_id, entry_state.clone());
        let mut state = entry_state;

        for (index, inst) in cfg.block(block_id).instructions.iter().enumerate() {
            result.pre_states.insert((block_id, index), state.clone());
            self.simulate_instruction(inst, &mut state, result);
        }

        state
    }

    fn simulate_instruction(
        &self,
        inst: &Instruction,
        state: &mut StackFrame,
        result: &mut SimulationResult,
    ) {
        match inst.opcode {
            OpCode::Nop | OpCode::Annotation => {}
            OpCode::Push => {
                let Some(operand) = inst.operand else { return };
                let (kind, type_hint) = if let Some(heap) = self.program.heap_entry(operand) {
                    (StackValueKind::HeapAddress, Some(heap.type_name.clone()))
                } else if let Some(symbol) = self.program.symbol_by_address(operand) {
                    (StackValueKind::HeapAddress, Some(symbol.type_name.clone()))
                } else {
                    (StackValueKind::Immediate, None)
                };
                state.push(StackValue {
                    address: operand,
                    kind,
                    type_hint,
                });
            }
            OpCode::Pop | OpCode::JumpIfFalse => {
                state.pop();
            }
            OpCode::Jump => {
                let is_call_jump = inst
                    .jump_target()
                    .map(|target| {
                        self.program
                            .entry_points
                            .iter()
                            .any(|e| e.call_jump_target == Some(target))
                    })
                    .unwrap_or(false);
                if is_call_jump {
                    state.pop();
                }
            }
            OpCode::JumpIndirect => {}
            OpCode::Extern => {
                let arity = inst
                    .operand_name
                    .as_deref()
                    .and_then(|sig| self.module_info.function_info(sig))
                    .map(|f| f.parameter_count())
                    .unwrap_or(0);
                let returns_void = inst
                    .operand_name
                    .as_deref()
                    .and_then(|sig| self.module_info.function_info(sig))
                    .map(|f| f.returns_void)
                    .unwrap_or(true);

                let mut popped = Vec::with_capacity(arity);
                for _ in 0..arity {
                    if let Some(v) = state.pop() {
                        popped.push(v);
                    }
                }
                popped.reverse();

                if !returns_void {
                    if let Some(receiver) = popped.last() {
                        result
                            .heap_status
                            .insert(receiver.address, HeapCellStatus::Unknown);
                    }
                }
            }
            OpCode::Copy => {
                let source = state.pop();
                let target = state.pop();
                if let Some(target) = &target {
                    let status = match &source {
                        Some(_) => HeapCellStatus::Known,
                        None => HeapCellStatus::Unknown,
                    };
                    result.heap_status.insert(target.address, status);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;
    use udonc_model::{HeapEntry, HeapValue};

    fn cfg_with_single_block(instructions: Vec<Instruction>) -> ControlFlowGraph {
        let end = instructions.last().map(|i| i.address).unwrap_or(0);
        let block = crate::block::BasicBlock {
            start_address: 0,
            end_address: end,
            instructions,
            kind: crate::block::BlockKind::Normal,
            switch_info: None,
            indirect_jump_unresolved: false,
            function_name: Some("f".to_string()),
        };
        ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![block],
            successors: vec![vec![]],
            predecessors: vec![vec![]],
        }
    }

    #[test]
    fn push_then_copy_records_pre_states() {
        let mut program = UdonProgramData::default();
        program.heap_initial_values.insert(
            10,
            HeapEntry {
                address: 10,
                type_name: "System.Int32".to_string(),
                value: HeapValue::Int(5),
            },
        );
        program.heap_initial_values.insert(
            20,
            HeapEntry {
                address: 20,
                type_name: "System.Int32".to_string(),
                value: HeapValue::Int(0),
            },
        );

        let instructions = vec![
            Instruction {
                address: 0,
                opcode: OpCode::Push,
                operand: Some(20),
                operand_name: None,
            },
            Instruction {
                address: 8,
                opcode: OpCode::Push,
                operand: Some(10),
                operand_name: None,
            },
            Instruction {
                address: 16,
                opcode: OpCode::Copy,
                operand: None,
                operand_name: None,
            },
        ];
        let cfg = cfg_with_single_block(instructions);
        let module_info = UdonModuleInfo::new();
        let simulator = StackSimulator::new(&program, &module_info);
        let result = simulator.simulate(&cfg);

        let pre_copy = result.pre_state(0, 2).expect("pre-state at COPY");
        assert_eq!(pre_copy.depth(), 2);
        assert_eq!(result.heap_status(20), HeapCellStatus::Known);
    }

    #[test]
    fn call_jump_pops_return_address_but_plain_jump_does_not() {
        let mut program = UdonProgramData::default();
        program.heap_initial_values.insert(
            10,
            HeapEntry {
                address: 10,
                type_name: "System.Int32".to_string(),
                value: HeapValue::Int(5),
            },
        );
        let mut call_entry = udonc_model::EntryPointInfo::new(None, 100);
        call_entry.call_jump_target = Some(40);
        program.entry_points.push(call_entry);

        let call_jump_instructions = vec![
            Instruction {
                address: 0,
                opcode: OpCode::Push,
                operand: Some(10),
                operand_name: None,
            },
            Instruction {
                address: 8,
                opcode: OpCode::Jump,
                operand: Some(40),
                operand_name: None,
            },
        ];
        let cfg = cfg_with_single_block(call_jump_instructions);
        let module_info = UdonModuleInfo::new();
        let result = StackSimulator::new(&program, &module_info).simulate(&cfg);
        let exit = result.block_exit_states.get(&0).expect("exit state recorded");
        assert_eq!(exit.depth(), 0);

        let plain_jump_instructions = vec![
            Instruction {
                address: 0,
                opcode: OpCode::Push,
                operand: Some(10),
                operand_name: None,
            },
            Instruction {
                address: 8,
                opcode: OpCode::Jump,
                operand: Some(999),
                operand_name: None,
            },
        ];
        let cfg = cfg_with_single_block(plain_jump_instructions);
        let result = StackSimulator::new(&program, &module_info).simulate(&cfg);
        let exit = result.block_exit_states.get(&0).expect("exit state recorded");
        assert_eq!(exit.depth(), 1);
    }
}
