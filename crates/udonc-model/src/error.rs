//! The fatal half of the error taxonomy (§7): conditions that abort the
//! pipeline for the current program. Recoverable conditions are reported
//! through [`crate::diagnostics::Diagnostics`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecompileError {
    /// The instruction stream itself cannot be decoded: truncated operand,
    /// opcode value outside the known set, or an address that falls outside
    /// the declared byte code length.
    #[error("malformed bytecode at address {address:#010x}: {reason}")]
    MalformedBytecode { address: u32, reason: String },

    /// The bytecode decodes fine but violates a structural precondition the
    /// rest of the pipeline depends on: a missing halt-jump sentinel, an
    /// entry point pointing past the end of the stream, a symbol table that
    /// does not agree with the heap.
    #[error("malformed program: {0}")]
    MalformedProgram(String),
}

pub type DecompileResult<T> = std::result::Result<T, DecompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_include_context() {
        let err = DecompileError::MalformedBytecode {
            address: 0x10,
            reason: "truncated operand".to_string(),
        };
        assert!(err.to_string().contains("0x00000010"));
    }
}
