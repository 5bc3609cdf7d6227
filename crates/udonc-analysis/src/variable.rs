//! Classifies every addressable slot into a scope and collects its
//! read/write sites (§4.5).

use rustc_hash::{FxHashMap, FxHashSet};

use udonc_model::{classify_scope, is_const_symbol, OpCode, Scope, UdonModuleInfo, UdonProgramData};

use crate::cfg::ControlFlowGraph;
use crate::simulate::{SimulationResult, StackValueKind};

#[derive(Debug, Clone)]
pub struct Variable {
    pub address: u32,
    pub name: String,
    pub type_hint: Option<String>,
    pub scope: Scope,
    /// The constant-pool flavor of `Scope::Global` (§4.5's `__const_*`
    /// convention); never set for `Local`/`Temporary` variables.
    pub is_const: bool,
    pub read_sites: FxHashSet<u32>,
    pub write_sites: FxHashSet<u32>,
}

impl Variable {
    fn new(address: u32, name: String, type_hint: Option<String>, scope: Scope) -> Self {
        let is_const = is_const_symbol(&name);
        Self {
            address,
            name,
            type_hint,
            scope,
            is_const,
            read_sites: FxHashSet::default(),
            write_sites: FxHashSet::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    by_address: FxHashMap<u32, Variable>,
}

impl VariableTable {
    pub fn get(&self, address: u32) -> Option<&Variable> {
        self.by_address.get(&address)
    }

    pub fn name_of(&self, address: u32) -> String {
        self.get(address)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("var_{address:08x}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.by_address.values()
    }
}

pub struct VariableIdentifier<'a> {
    program: &'a UdonProgramData,
    module_info: &'a UdonModuleInfo,
}

impl<'a> VariableIdentifier<'a> {
    pub fn new(program: &'a UdonProgramData, module_info: &'a UdonModuleInfo) -> Self {
        Self {
            program,
            module_info,
        }
    }

    pub fn identify(&self, cfg: &ControlFlowGraph, sim: &SimulationResult) -> VariableTable {
        let mut table = VariableTable::default();
        self.seed_from_symbols(&mut table);

        for block_id in cfg.block_ids() {
            let block = cfg.block(block_id);
            for (index, inst) in block.instructions.iter().enumerate() {
                let Some(pre) = sim.pre_state(block_id, index) else {
                    continue;
                };

                match inst.opcode {
                    OpCode::Push => {
                        if let Some(address) = inst.operand {
                            if self.program.heap_entry(address).is_some() {
                                self.record_read(&mut table, address, inst.address);
                            }
                        }
                    }
                    OpCode::Copy => {
                        let source = pre.peek(0);
                        let target = pre.peek(1);
                        if let (Some(source), Some(target)) = (source, target) {
                            if target.kind == StackValueKind::HeapAddress {
                                self.record_write(&mut table, target.address, inst.address);
                            }
                            if source.kind == StackValueKind::HeapAddress {
                                self.record_read(&mut table, source.address, inst.address);
                            }
                        }
                    }
                    OpCode::Extern => {
                        self.analyze_extern(&mut table, inst, pre);
                    }
                    _ => {}
                }
            }
        }

        table
    }

    fn seed_from_symbols(&self, table: &mut VariableTable) {
        for (name, symbol) in &self.program.symbols {
            let scope = classify_scope(name);
            table.by_address.insert(
                symbol.address,
                Variable::new(symbol.address, name.clone(), Some(symbol.brief_type().to_string()), scope),
            );
        }
    }

    fn analyze_extern(
        &self,
        table: &mut VariableTable,
        inst: &udonc_model::Instruction,
        pre: &crate::simulate::StackFrame,
    ) {
        let Some(signature) = inst.operand_name.as_deref() else {
            return;
        };
        let Some(func_info) = self.module_info.function_info(signature) else {
            return;
        };

        let param_count = func_info.parameter_count();
        if pre.depth() < param_count {
            return;
        }

        for (i, param_kind) in func_info.parameters.iter().enumerate() {
            let depth = param_count - 1 - i;
            let Some(value) = pre.peek(depth) else { continue };
            if value.kind != StackValueKind::HeapAddress {
                continue;
            }
            if param_kind.is_read() {
                self.record_read(table, value.address, inst.address);
            }
            if param_kind.is_write() {
                self.record_write(table, value.address, inst.address);
            }
        }

        if !func_info.returns_void {
            if let Some(receiver) = pre.peek(param_count.saturating_sub(1)) {
                if receiver.kind == StackValueKind::HeapAddress {
                    self.record_write(table, receiver.address, inst.address);
                }
            }
        }
    }

    fn record_read(&self, table: &mut VariableTable, address: u32, site: u32) {
        self.variable_mut(table, address).read_sites.insert(site);
    }

    fn record_write(&self, table: &mut VariableTable, address: u32, site: u32) {
        self.variable_mut(table, address).write_sites.insert(site);
    }

    fn variable_mut<'t>(&self, table: &'t mut VariableTable, address: u32) -> &'t mut Variable {
        table.by_address.entry(address).or_insert_with(|| {
            if let Some(symbol) = self.program.symbol_by_address(address) {
                Variable::new(
                    address,
                    symbol.name.clone(),
                    Some(symbol.brief_type().to_string()),
                    classify_scope(&symbol.name),
                )
            } else {
                let type_hint = self
                    .program
                    .heap_entry(address)
                    .map(|h| h.brief_type().to_string());
                Variable::new(address, format!("__intnl_{address:x}"), type_hint, Scope::Temporary)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::StackSimulator;
    use udonc_model::{HeapEntry, HeapValue, SymbolInfo};

    #[test]
    fn copy_records_read_and_write() {
        let mut program = UdonProgramData::default();
        program.symbols.insert(
            "__0_localVar".to_string(),
            SymbolInfo::new("__0_localVar", "System.Int32", 20),
        );
        program.heap_initial_values.insert(
            10,
            HeapEntry {
                address: 10,
                type_name: "System.Int32".to_string(),
                value: HeapValue::Int(5),
            },
        );

        let instructions = vec![
            udonc_model::Instruction {
                address: 0,
                opcode: OpCode::Push,
                operand: Some(20),
                operand_name: Some("__0_localVar".to_string()),
            },
            udonc_model::Instruction {
                address: 8,
                opcode: OpCode::Push,
                operand: Some(10),
                operand_name: None,
            },
            udonc_model::Instruction {
                address: 16,
                opcode: OpCode::Copy,
                operand: None,
                operand_name: None,
            },
        ];
        let block = crate::block::BasicBlock {
            start_address: 0,
            end_address: 16,
            instructions,
            kind: crate::block::BlockKind::Normal,
            switch_info: None,
            indirect_jump_unresolved: false,
            function_name: Some("f".to_string()),
        };
        let cfg = ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![block],
            successors: vec![vec![]],
            predecessors: vec![vec![]],
        };

        let module_info = UdonModuleInfo::new();
        let sim = StackSimulator::new(&program, &module_info).simulate(&cfg);
        let table = VariableIdentifier::new(&program, &module_info).identify(&cfg, &sim);

        let local = table.get(20).expect("local variable seeded");
        assert!(local.write_sites.contains(&16));
        assert_eq!(local.scope, Scope::Local);
    }
}
