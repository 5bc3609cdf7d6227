//! The recoverable half of the error taxonomy (§7): conditions that are
//! logged and leave the pipeline running, degrading only the affected
//! function or expression.

use tracing::warn;

/// One recoverable condition encountered while processing a single program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An `EXTERN` operand named a signature absent from the module
    /// descriptor; the call is emitted with a best-guess arity.
    UnknownExtern { address: u32, signature: String },
    /// A `JUMP_INDIRECT` target could not be resolved to a single address
    /// by stack simulation.
    UnresolvedIndirectJump { address: u32 },
    /// Structural recovery found more than one equally-plausible shape for
    /// a region and fell back to a goto-labeled rendering.
    AmbiguousRecovery { address: u32, detail: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnknownExtern { address, signature } => write!(
                f,
                "unknown extern `{signature}` referenced at {address:#010x}"
            ),
            Diagnostic::UnresolvedIndirectJump { address } => {
                write!(f, "unresolved indirect jump at {address:#010x}")
            }
            Diagnostic::AmbiguousRecovery { address, detail } => {
                write!(f, "ambiguous recovery near {address:#010x}: {detail}")
            }
        }
    }
}

/// Accumulates recoverable conditions for a single program so callers (the
/// CLI, tests) can inspect what was degraded without re-parsing log output.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `diagnostic` and emits a `tracing::warn!` for it, matching
    /// the logged-and-continue contract of §7.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!(%diagnostic, "recoverable decompilation issue");
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accumulates_entries() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.report(Diagnostic::UnresolvedIndirectJump { address: 0x40 });
        diagnostics.report(Diagnostic::UnknownExtern {
            address: 0x80,
            signature: "Foo.Bar".to_string(),
        });
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn display_includes_address() {
        let diagnostic = Diagnostic::AmbiguousRecovery {
            address: 0x100,
            detail: "two equally likely merge points".to_string(),
        };
        assert!(diagnostic.to_string().contains("0x00000100"));
    }
}
