//! Collects the program's global variables from the union of every
//! function's [`VariableTable`] (§4.8's "Global variables are emitted from
//! the union of globals discovered across all functions"), grounded on
//! `ProgramCodeGenerator._collect_and_generate_global_variables` /
//! `_is_hidden_global_variable`.

use rustc_hash::FxHashMap;

use udonc_analysis::{Variable, VariableTable};
use udonc_model::{
    Scope, UdonProgramData, CLASS_NAME_SYMBOL_NAME, CONST_PREFIX, GLOBAL_INTERNAL_PREFIX,
    INTERNAL_PREFIX, THIS_PREFIX,
};
use udonc_recover::{ExpressionNode, VariableDeclNode};

use crate::literal::format_literal;

/// A reflection symbol the source hides alongside the class-name symbol;
/// not currently modeled as a named constant since nothing else consumes it.
const REFLECTION_TYPE_ID_SYMBOL: &str = "__refl_typeid";

pub fn collect_global_variables(
    program: &UdonProgramData,
    function_tables: &[&VariableTable],
) -> Vec<VariableDeclNode> {
    let mut by_address: FxHashMap<u32, Variable> = FxHashMap::default();

    for table in function_tables {
        for var in table.iter() {
            if var.scope != Scope::Global {
                continue;
            }
            by_address.entry(var.address).or_insert_with(|| var.clone());
        }
    }

    let mut addresses: Vec<u32> = by_address.keys().copied().collect();
    addresses.sort_unstable();

    addresses
        .into_iter()
        .filter_map(|address| {
            let var = &by_address[&address];
            if is_hidden_global(program, var) {
                return None;
            }
            Some(VariableDeclNode {
                var_name: var.name.clone(),
                var_type: var.type_hint.clone(),
                initial_value: Some(initial_value_expression(program, var)),
            })
        })
        .collect()
}

fn is_hidden_global(program: &UdonProgramData, var: &Variable) -> bool {
    if var.name == CLASS_NAME_SYMBOL_NAME || var.name == REFLECTION_TYPE_ID_SYMBOL {
        return true;
    }
    if var.name.starts_with(CONST_PREFIX) {
        return program
            .heap_entry(var.address)
            .map(|entry| entry.value.is_serializable())
            .unwrap_or(false);
    }
    if var.name.starts_with(INTERNAL_PREFIX)
        || var.name.starts_with(GLOBAL_INTERNAL_PREFIX)
        || var.name.starts_with(THIS_PREFIX)
    {
        return true;
    }
    false
}

fn initial_value_expression(program: &UdonProgramData, var: &Variable) -> ExpressionNode {
    match program.heap_entry(var.address) {
        Some(entry) => ExpressionNode::Literal {
            value: entry.value.clone(),
            literal_type: var.type_hint.clone(),
        },
        None => ExpressionNode::Literal {
            value: udonc_model::HeapValue::Null,
            literal_type: var.type_hint.clone(),
        },
    }
}

/// Exposed for callers that want the rendered literal directly (tests,
/// diagnostics) without building the full [`VariableDeclNode`].
pub fn format_initial_value(program: &UdonProgramData, var: &Variable) -> String {
    match program.heap_entry(var.address) {
        Some(entry) => format_literal(&entry.value, var.type_hint.as_deref()),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_model::{HeapEntry, HeapValue, SymbolInfo};

    fn program_with_const(serializable: bool) -> (UdonProgramData, Variable) {
        let mut program = UdonProgramData::default();
        let address = 100;
        program.symbols.insert(
            "__const_SystemInt32_0".to_string(),
            SymbolInfo::new("__const_SystemInt32_0", "System.Int32", address),
        );
        program.heap_initial_values.insert(
            address,
            HeapEntry {
                address,
                type_name: "System.Int32".to_string(),
                value: if serializable {
                    HeapValue::Int(5)
                } else {
                    HeapValue::Opaque {
                        to_string_hint: None,
                    }
                },
            },
        );
        let var = Variable {
            address,
            name: "__const_SystemInt32_0".to_string(),
            type_hint: Some("System.Int32".to_string()),
            scope: Scope::Global,
            is_const: true,
            read_sites: Default::default(),
            write_sites: Default::default(),
        };
        (program, var)
    }

    #[test]
    fn serializable_const_is_hidden() {
        let (program, var) = program_with_const(true);
        assert!(is_hidden_global(&program, &var));
    }

    #[test]
    fn non_serializable_const_is_shown() {
        let (program, var) = program_with_const(false);
        assert!(!is_hidden_global(&program, &var));
    }

    #[test]
    fn internal_prefixes_are_always_hidden() {
        let program = UdonProgramData::default();
        let var = Variable {
            address: 1,
            name: "__intnl_foo".to_string(),
            type_hint: None,
            scope: Scope::Temporary,
            is_const: false,
            read_sites: Default::default(),
            write_sites: Default::default(),
        };
        assert!(is_hidden_global(&program, &var));
    }
}
