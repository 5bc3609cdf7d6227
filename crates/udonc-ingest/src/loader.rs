//! Converts the wire schema into [`udonc_model`] domain types.

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use udonc_model::{
    DefType, EntryPointInfo, FunctionMetadata, HeapEntry, HeapValue, ModuleMetadata,
    ParameterKind, SymbolInfo, UdonModuleInfo, UdonProgramData,
};

use crate::error::{IngestError, IngestResult};
use crate::schema::{
    EntryPointWire, FunctionWire, HeapEntryWire, HeapValueWire, ModuleDescriptor, ParameterWire,
    ProgramBundle, SymbolWire,
};

pub fn load_program_from_file(path: impl AsRef<Path>) -> IngestResult<UdonProgramData> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading program bundle");
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_program_from_str(&text, &path.display().to_string())
}

pub fn load_program_from_str(text: &str, path_for_errors: &str) -> IngestResult<UdonProgramData> {
    let bundle: ProgramBundle =
        serde_json::from_str(text).map_err(|source| IngestError::Json {
            path: path_for_errors.to_string(),
            source,
        })?;
    let program = parse_program_bundle(bundle)?;
    info!(
        symbols = program.symbols.len(),
        entry_points = program.entry_points.len(),
        "loaded program bundle"
    );
    Ok(program)
}

fn parse_program_bundle(bundle: ProgramBundle) -> IngestResult<UdonProgramData> {
    let byte_code = hex::decode(bundle.byte_code_hex.trim())
        .map_err(|e| IngestError::BadHex(e.to_string()))?;

    let mut symbols = FxHashMap::default();
    for (name, wire) in bundle.symbols {
        symbols.insert(name, parse_symbol(wire));
    }

    let entry_points = bundle
        .entry_points
        .into_iter()
        .map(parse_entry_point)
        .collect();

    let mut heap_initial_values = FxHashMap::default();
    for (addr_str, wire) in bundle.heap_initial_values {
        let address: u32 = addr_str
            .parse()
            .map_err(|_| IngestError::BadHeapKey(addr_str.clone()))?;
        heap_initial_values.insert(address, parse_heap_entry(wire)?);
    }

    Ok(UdonProgramData {
        symbols,
        heap_initial_values,
        entry_points,
        byte_code,
        byte_code_length: bundle.byte_code_length,
    })
}

fn parse_symbol(wire: SymbolWire) -> SymbolInfo {
    SymbolInfo::new(wire.name, wire.type_name, wire.address)
}

fn parse_entry_point(wire: EntryPointWire) -> EntryPointInfo {
    EntryPointInfo::new(wire.name, wire.address)
}

fn parse_heap_entry(wire: HeapEntryWire) -> IngestResult<HeapEntry> {
    Ok(HeapEntry {
        address: wire.address,
        type_name: wire.type_name.clone(),
        value: parse_heap_value(&wire.type_name, wire.value),
    })
}

fn parse_heap_value(type_name: &str, wire: HeapValueWire) -> HeapValue {
    if !wire.is_serializable {
        let hint = wire.value.as_str().map(|s| s.to_string());
        return HeapValue::Opaque {
            to_string_hint: hint.or_else(|| Some(wire.value.to_string())),
        };
    }

    let brief = udonc_model::brief_type_name(type_name);
    match &wire.value {
        serde_json::Value::Null => HeapValue::Null,
        serde_json::Value::Bool(b) => HeapValue::Bool(*b),
        serde_json::Value::String(s) => HeapValue::Str(s.clone()),
        serde_json::Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            let mut all_u32 = true;
            for item in items {
                match item.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(n) => values.push(n),
                    None => {
                        all_u32 = false;
                        break;
                    }
                }
            }
            if all_u32 {
                HeapValue::UInt32Array(values)
            } else {
                HeapValue::Opaque {
                    to_string_hint: Some(wire.value.to_string()),
                }
            }
        }
        serde_json::Value::Number(n) => {
            if brief.contains("Single") || brief.contains("Double") || brief.contains("Float") {
                HeapValue::Float(n.as_f64().unwrap_or(0.0))
            } else if let Some(i) = n.as_i64() {
                HeapValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                HeapValue::Float(f)
            } else {
                HeapValue::Opaque {
                    to_string_hint: Some(n.to_string()),
                }
            }
        }
        other => HeapValue::Opaque {
            to_string_hint: Some(other.to_string()),
        },
    }
}

pub fn load_module_info_from_file(path: impl AsRef<Path>) -> IngestResult<UdonModuleInfo> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading module descriptor");
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_module_info_from_str(&text, &path.display().to_string())
}

pub fn load_module_info_from_str(
    text: &str,
    path_for_errors: &str,
) -> IngestResult<UdonModuleInfo> {
    let descriptor: ModuleDescriptor =
        serde_json::from_str(text).map_err(|source| IngestError::Json {
            path: path_for_errors.to_string(),
            source,
        })?;

    let mut info = UdonModuleInfo::new();
    for (module_name, wire) in descriptor.0 {
        let mut functions = FxHashMap::default();
        for func in wire.functions {
            let name = func.name.clone();
            functions.insert(name, parse_function_metadata(func)?);
        }
        info.insert_module(
            module_name,
            ModuleMetadata {
                type_name: wire.type_name,
                functions,
            },
        );
    }
    info!(modules = info.modules.len(), "loaded module descriptor");
    Ok(info)
}

fn parse_function_metadata(wire: FunctionWire) -> IngestResult<FunctionMetadata> {
    let def_type = parse_def_type(&wire.def_type)?;
    let parameters = wire
        .parameters
        .iter()
        .map(parse_parameter_kind)
        .collect::<IngestResult<Vec<_>>>()?;

    Ok(FunctionMetadata {
        name: wire.name,
        def_type,
        is_static: wire.is_static,
        returns_void: wire.returns_void,
        original_name: wire.original_name,
        parameters,
    })
}

fn parse_def_type(value: &str) -> IngestResult<DefType> {
    match value {
        "Method" | "method" => Ok(DefType::Method),
        "Field" | "field" => Ok(DefType::Field),
        "Ctor" | "ctor" | "Constructor" | "constructor" => Ok(DefType::Ctor),
        "Operator" | "operator" => Ok(DefType::Operator),
        other => Err(IngestError::BadDefType(other.to_string())),
    }
}

fn parse_parameter_kind(wire: &ParameterWire) -> IngestResult<ParameterKind> {
    match wire.direction() {
        "in" | "In" => Ok(ParameterKind::In),
        "out" | "Out" => Ok(ParameterKind::Out),
        "inout" | "InOut" | "in_out" => Ok(ParameterKind::InOut),
        other => Err(IngestError::BadParameterDirection(other.to_string())),
    }
}
