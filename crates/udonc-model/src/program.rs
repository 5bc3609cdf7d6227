//! The per-program bundle: symbols, heap, entry points, and raw bytecode.

use rustc_hash::FxHashMap;

use crate::heap::HeapEntry;
use crate::symbol::SymbolInfo;

/// A declared or discovered function entry.
///
/// `call_jump_target` is filled in once the bytecode parser confirms the
/// entry's first instruction is the halt-jump-sentinel `PUSH`: it points at
/// the first executable instruction of the callee, past the prologue.
#[derive(Debug, Clone)]
pub struct EntryPointInfo {
    pub name: Option<String>,
    pub address: u32,
    pub call_jump_target: Option<u32>,
}

impl EntryPointInfo {
    pub fn new(name: Option<String>, address: u32) -> Self {
        Self {
            name,
            address,
            call_jump_target: None,
        }
    }
}

/// Owns everything decoded from the program JSON bundle: symbols, heap,
/// entry points, and the raw bytecode bytes.
///
/// Loaded once per program; mutated only to append entry points discovered
/// during CFG construction (hidden-entry fixpoint, §4.3).
#[derive(Debug, Clone, Default)]
pub struct UdonProgramData {
    pub symbols: FxHashMap<String, SymbolInfo>,
    pub heap_initial_values: FxHashMap<u32, HeapEntry>,
    pub entry_points: Vec<EntryPointInfo>,
    pub byte_code: Vec<u8>,
    pub byte_code_length: usize,
}

impl UdonProgramData {
    pub fn symbol_by_address(&self, address: u32) -> Option<&SymbolInfo> {
        self.symbols.values().find(|s| s.address == address)
    }

    pub fn entry_point_by_address(&self, address: u32) -> Option<&EntryPointInfo> {
        self.entry_points.iter().find(|e| e.address == address)
    }

    pub fn heap_entry(&self, address: u32) -> Option<&HeapEntry> {
        self.heap_initial_values.get(&address)
    }

    /// Appends a newly discovered entry point unless one at the same
    /// address is already known.
    pub fn add_entry_point_if_new(&mut self, entry: EntryPointInfo) -> bool {
        if self.entry_point_by_address(entry.address).is_some() {
            return false;
        }
        self.entry_points.push(entry);
        true
    }

    /// The reflection symbol carrying the program's original class name, if
    /// the compiler emitted one. Absence falls back to a synthesized name.
    pub fn class_name_symbol(&self) -> Option<&SymbolInfo> {
        self.symbols.get(CLASS_NAME_SYMBOL_NAME)
    }
}

/// Name of the reflection symbol that (when present) carries the original
/// class name, mirroring the other `__refl_*` reflection symbols.
pub const CLASS_NAME_SYMBOL_NAME: &str = "__refl_class_name";
