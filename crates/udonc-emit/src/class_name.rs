//! Class-name resolution (§6 Output, §9): the embedded reflection symbol
//! wins when present; otherwise a synthesized `DecompiledClass_<k>` name is
//! drawn from a process-monotonic counter.
//!
//! The source treats this counter as a class-level singleton
//! (`ProgramCodeGenerator._class_counter`); Design Note §9 requires it
//! instead be explicit state threaded through the pipeline, so it is owned
//! by the caller (the CLI) and passed in by `&mut`.

use udonc_model::UdonProgramData;

#[derive(Debug, Clone, Default)]
pub struct ClassNameAllocator {
    next_id: u32,
}

impl ClassNameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_synthetic(&mut self) -> String {
        self.next_id += 1;
        format!("DecompiledClass_{}", self.next_id)
    }
}

/// Resolves the output class's name: the embedded reflection symbol's
/// heap string value if present and serializable, else a synthesized name.
pub fn resolve_class_name(program: &UdonProgramData, allocator: &mut ClassNameAllocator) -> String {
    let declared = program
        .class_name_symbol()
        .and_then(|sym| program.heap_entry(sym.address))
        .and_then(|entry| entry.value.as_str())
        .map(str::to_string);

    declared.unwrap_or_else(|| allocator.next_synthetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_model::{HeapEntry, HeapValue, SymbolInfo};

    #[test]
    fn uses_declared_class_name_when_present() {
        let mut program = UdonProgramData::default();
        program.symbols.insert(
            udonc_model::CLASS_NAME_SYMBOL_NAME.to_string(),
            SymbolInfo::new(udonc_model::CLASS_NAME_SYMBOL_NAME, "System.String", 10),
        );
        program.heap_initial_values.insert(
            10,
            HeapEntry {
                address: 10,
                type_name: "System.String".to_string(),
                value: HeapValue::Str("MyBehaviour".to_string()),
            },
        );
        let mut allocator = ClassNameAllocator::new();
        assert_eq!(resolve_class_name(&program, &mut allocator), "MyBehaviour");
    }

    #[test]
    fn synthesizes_monotonic_fallback_name() {
        let program = UdonProgramData::default();
        let mut allocator = ClassNameAllocator::new();
        assert_eq!(resolve_class_name(&program, &mut allocator), "DecompiledClass_1");
        assert_eq!(resolve_class_name(&program, &mut allocator), "DecompiledClass_2");
    }
}
