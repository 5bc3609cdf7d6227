//! Symbol naming conventions.
//!
//! The compiler that produced the bytecode encodes a slot's scope in its
//! name prefix; there is no separate scope field on the wire.

/// Compiler-generated constant pool entry.
pub const CONST_PREFIX: &str = "__const_";
/// Function-internal temporary (eligible for inlining at its single read).
pub const INTERNAL_PREFIX: &str = "__intnl_";
/// Program-internal global, not compiler-local to one function.
pub const GLOBAL_INTERNAL_PREFIX: &str = "__gintnl_";
/// `this`, `this.transform`, or `this.gameObject`, discriminated by a
/// substring of the remainder of the name.
pub const THIS_PREFIX: &str = "__this_";

/// Name of the reserved constant whose initial heap value must be the
/// halt-jump sentinel (`0xFFFFFFFF`).
pub const HALT_JUMP_CONST_NAME: &str = "__const_SystemUInt32_0";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolInfo {
    pub name: String,
    pub type_name: String,
    pub address: u32,
}

impl SymbolInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            address,
        }
    }

    /// The type name truncated at the first comma, dropping assembly
    /// qualification (`System.Int32, mscorlib, ...` -> `System.Int32`).
    pub fn brief_type(&self) -> &str {
        brief_type_name(&self.type_name)
    }
}

pub fn brief_type_name(type_name: &str) -> &str {
    type_name.split(',').next().unwrap_or(type_name)
}

/// `true` when `name` matches the `__<digits>_...` local-variable
/// convention, e.g. `__0_myVar`.
pub fn is_local_symbol_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("__") else {
        return false;
    };
    let mut saw_digit = false;
    for c in rest.chars() {
        if c.is_ascii_digit() {
            saw_digit = true;
            continue;
        }
        return saw_digit && c == '_';
    }
    false
}

/// Which of the three `this`-family discriminators a `__this_*` symbol
/// refers to, judged by a substring of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisDiscriminator {
    This,
    Transform,
    GameObject,
}

impl ThisDiscriminator {
    pub fn render(self) -> &'static str {
        match self {
            Self::This => "this",
            Self::Transform => "this.transform",
            Self::GameObject => "this.gameObject",
        }
    }
}

pub fn this_discriminator(name: &str) -> ThisDiscriminator {
    if name.contains("Transform") {
        ThisDiscriminator::Transform
    } else if name.contains("GameObject") {
        ThisDiscriminator::GameObject
    } else {
        ThisDiscriminator::This
    }
}

/// The scope a symbol or synthesized variable belongs to (§3: `GLOBAL`,
/// `LOCAL`, `TEMPORARY`). A `__const_*` symbol classifies as `Global` (a
/// constant-flavored global, per §4.5); [`is_const_symbol`] carries that
/// extra flavor as a separate predicate rather than a fourth scope variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Temporary,
}

/// Classifies a symbol name per the scope-prefix convention (§4.5).
pub fn classify_scope(name: &str) -> Scope {
    if name.starts_with(CONST_PREFIX) {
        Scope::Global
    } else if name.starts_with(INTERNAL_PREFIX) {
        Scope::Temporary
    } else if name.starts_with(GLOBAL_INTERNAL_PREFIX) {
        Scope::Global
    } else if is_local_symbol_name(name) {
        Scope::Local
    } else if name.starts_with(THIS_PREFIX) {
        Scope::Global
    } else {
        Scope::Global
    }
}

/// `true` when `name` is a compiler-generated constant-pool entry
/// (`__const_*`), the constant flavor of [`Scope::Global`].
pub fn is_const_symbol(name: &str) -> bool {
    name.starts_with(CONST_PREFIX)
}

/// Best-effort recovery of a function name from a return-slot temporary
/// symbol matching `__<id1>___<id2>_<name>__ret`.
pub fn return_slot_function_name(symbol_name: &str) -> Option<&str> {
    let inner = symbol_name.strip_prefix("__")?.strip_suffix("__ret")?;
    let (_, rest) = inner.split_once("___")?;
    let (_, candidate) = rest.split_once('_')?;
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_symbol_pattern() {
        assert!(is_local_symbol_name("__0_myVar"));
        assert!(is_local_symbol_name("__12_counter"));
        assert!(!is_local_symbol_name("__const_SystemInt32_5"));
        assert!(!is_local_symbol_name("__this_transform"));
        assert!(!is_local_symbol_name("notAPrefix"));
    }

    #[test]
    fn scope_classification_order() {
        assert_eq!(classify_scope("__const_SystemUInt32_0"), Scope::Global);
        assert_eq!(classify_scope("__intnl_0"), Scope::Temporary);
        assert_eq!(classify_scope("__gintnl_frameCount"), Scope::Global);
        assert_eq!(classify_scope("__0_localVar"), Scope::Local);
        assert_eq!(classify_scope("__this_transform"), Scope::Global);
        assert_eq!(classify_scope("someField"), Scope::Global);
    }

    #[test]
    fn const_symbol_predicate() {
        assert!(is_const_symbol("__const_SystemUInt32_0"));
        assert!(!is_const_symbol("__gintnl_frameCount"));
        assert!(!is_const_symbol("__0_localVar"));
    }

    #[test]
    fn this_discriminators() {
        assert_eq!(this_discriminator("__this_value"), ThisDiscriminator::This);
        assert_eq!(
            this_discriminator("__this_Transform"),
            ThisDiscriminator::Transform
        );
        assert_eq!(
            this_discriminator("__this_GameObject"),
            ThisDiscriminator::GameObject
        );
    }

    #[test]
    fn return_slot_pattern_extracts_name() {
        assert_eq!(
            return_slot_function_name("__0___1_DoThing__ret"),
            Some("DoThing")
        );
        assert_eq!(return_slot_function_name("__not_matching"), None);
    }
}
