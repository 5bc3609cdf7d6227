//! The decoded instruction stream.
//!
//! Every instruction is either 4 or 8 bytes wide depending on whether its
//! opcode carries an operand; addresses are byte offsets into the raw
//! bytecode, not instruction indices.

use serde::{Deserialize, Serialize};

/// Marks an indirect jump with no caller-supplied return address, and is
/// also the initial heap value of the reserved halt-jump constant.
pub const HALT_JUMP_SENTINEL: u32 = 0xFFFF_FFFF;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    Nop = 0,
    Push = 1,
    Pop = 2,
    JumpIfFalse = 4,
    Jump = 5,
    Extern = 6,
    Annotation = 7,
    JumpIndirect = 8,
    Copy = 9,
}

impl OpCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Nop),
            1 => Some(Self::Push),
            2 => Some(Self::Pop),
            4 => Some(Self::JumpIfFalse),
            5 => Some(Self::Jump),
            6 => Some(Self::Extern),
            7 => Some(Self::Annotation),
            8 => Some(Self::JumpIndirect),
            9 => Some(Self::Copy),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::Jump => "JUMP",
            Self::Extern => "EXTERN",
            Self::Annotation => "ANNOTATION",
            Self::JumpIndirect => "JUMP_INDIRECT",
            Self::Copy => "COPY",
        }
    }

    /// Opcodes that consume a trailing 4-byte big-endian operand.
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Self::Push
                | Self::JumpIfFalse
                | Self::Jump
                | Self::Extern
                | Self::Annotation
                | Self::JumpIndirect
        )
    }

    /// Operands that resolve to a symbol/heap name rather than a bare literal.
    pub fn has_operand_name(self) -> bool {
        self.has_operand()
    }

    pub fn size(self) -> u32 {
        if self.has_operand() {
            8
        } else {
            4
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::JumpIndirect)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub address: u32,
    pub opcode: OpCode,
    pub operand: Option<u32>,
    /// Symbol/heap name the operand resolved to, when the opcode names one.
    pub operand_name: Option<String>,
}

impl Instruction {
    pub fn size(&self) -> u32 {
        self.opcode.size()
    }

    pub fn next_address(&self) -> u32 {
        self.address + self.size()
    }

    pub fn is_conditional_jump(&self) -> bool {
        self.opcode == OpCode::JumpIfFalse
    }

    pub fn is_unconditional_jump(&self) -> bool {
        self.opcode == OpCode::Jump
    }

    pub fn is_jump(&self) -> bool {
        self.opcode.is_jump()
    }

    /// Target address for direct jumps (`JUMP`, `JUMP_IF_FALSE`); `None` for
    /// indirect jumps, whose target is only known after stack simulation.
    pub fn jump_target(&self) -> Option<u32> {
        match self.opcode {
            OpCode::Jump | OpCode::JumpIfFalse => self.operand,
            _ => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Some(operand) => write!(
                f,
                "{:08x}: {} 0x{:08x}",
                self.address,
                self.opcode.name(),
                operand
            ),
            None => write!(f, "{:08x}: {}", self.address, self.opcode.name()),
        }
    }
}
