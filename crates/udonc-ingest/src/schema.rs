//! Wire shapes of the two JSON inputs: the per-program bundle and the
//! module (extern signature) descriptor. Kept separate from
//! [`udonc_model`] so the domain types never carry `serde` derives for
//! fields that only exist to round-trip an on-disk quirk (the
//! stringified heap address keys, the `isSerializable` wrapper).

use rustc_hash::FxHashMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProgramBundle {
    #[serde(rename = "byteCodeHex")]
    pub byte_code_hex: String,
    #[serde(rename = "byteCodeLength")]
    pub byte_code_length: usize,
    #[serde(default)]
    pub symbols: FxHashMap<String, SymbolWire>,
    #[serde(default, rename = "entryPoints")]
    pub entry_points: Vec<EntryPointWire>,
    #[serde(default, rename = "heapInitialValues")]
    pub heap_initial_values: FxHashMap<String, HeapEntryWire>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolWire {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub address: u32,
}

#[derive(Debug, Deserialize)]
pub struct EntryPointWire {
    pub name: Option<String>,
    pub address: u32,
}

#[derive(Debug, Deserialize)]
pub struct HeapEntryWire {
    pub address: u32,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: HeapValueWire,
}

#[derive(Debug, Deserialize)]
pub struct HeapValueWire {
    #[serde(rename = "isSerializable")]
    pub is_serializable: bool,
    pub value: serde_json::Value,
}

/// The module descriptor is a map from module name to its metadata; this
/// mirrors `{ "UnityEngineGameObject": { "type": "...", "functions": [...] } }`.
#[derive(Debug, Deserialize)]
pub struct ModuleDescriptor(pub FxHashMap<String, ModuleWire>);

#[derive(Debug, Deserialize)]
pub struct ModuleWire {
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub functions: Vec<FunctionWire>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionWire {
    pub name: String,
    #[serde(rename = "defType")]
    pub def_type: String,
    #[serde(default, rename = "isStatic")]
    pub is_static: bool,
    #[serde(default, rename = "returnsVoid")]
    pub returns_void: bool,
    #[serde(default, rename = "originalName")]
    pub original_name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterWire>,
}

/// One entry of a function's parameter-direction list. Accepts either the
/// bare string form (`"in"`) or, for forward compatibility, an object form
/// carrying a `direction` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParameterWire {
    Bare(String),
    Tagged { direction: String },
}

impl ParameterWire {
    pub fn direction(&self) -> &str {
        match self {
            ParameterWire::Bare(s) => s,
            ParameterWire::Tagged { direction } => direction,
        }
    }
}
