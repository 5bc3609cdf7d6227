//! Process-wide registry of extern function metadata, keyed by
//! `(module_name, function_name)`.

use rustc_hash::FxHashMap;

/// Direction of a single extern parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    In,
    Out,
    InOut,
}

impl ParameterKind {
    pub fn is_read(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    pub fn is_write(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// What kind of member an extern signature denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefType {
    Method,
    Field,
    Ctor,
    Operator,
}

#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    pub name: String,
    pub def_type: DefType,
    pub is_static: bool,
    pub returns_void: bool,
    pub original_name: Option<String>,
    pub parameters: Vec<ParameterKind>,
}

impl FunctionMetadata {
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn display_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    pub type_name: String,
    pub functions: FxHashMap<String, FunctionMetadata>,
}

/// Lookup table from `(module_name, function_name)` to extern metadata,
/// built once from the module JSON descriptor and threaded through the
/// pipeline as explicit configuration rather than process-global state.
#[derive(Debug, Clone, Default)]
pub struct UdonModuleInfo {
    pub modules: FxHashMap<String, ModuleMetadata>,
}

impl UdonModuleInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits an extern signature of the form `Module.function.overload`
    /// into `(module_name, function_name)`.
    pub fn parse_signature(signature: &str) -> Option<(&str, &str)> {
        let mut parts = signature.splitn(3, '.');
        let module_name = parts.next()?;
        let function_name = parts.next()?;
        Some((module_name, function_name))
    }

    pub fn function_info(&self, signature: &str) -> Option<&FunctionMetadata> {
        let (module_name, function_name) = Self::parse_signature(signature)?;
        self.modules.get(module_name)?.functions.get(function_name)
    }

    pub fn module_type(&self, module_name: &str) -> Option<&str> {
        self.modules.get(module_name).map(|m| m.type_name.as_str())
    }

    pub fn insert_module(&mut self, module_name: String, metadata: ModuleMetadata) {
        self.modules.insert(module_name, metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_parses_module_and_function() {
        assert_eq!(
            UdonModuleInfo::parse_signature("UnityEngineGameObject.__get_transform"),
            Some(("UnityEngineGameObject", "__get_transform"))
        );
    }

    #[test]
    fn unknown_signature_returns_none() {
        let info = UdonModuleInfo::default();
        assert!(info.function_info("Nonexistent.Thing").is_none());
    }
}
