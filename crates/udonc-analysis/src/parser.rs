//! Decodes the raw byte code into a linear [`Instruction`] stream (§4.1).

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use udonc_model::{DecompileError, DecompileResult, Instruction, OpCode, UdonProgramData};

/// Sequential decode of the program's raw byte code.
///
/// Holds its own address-to-instruction index so later stages can resolve a
/// jump target in O(1) without re-walking the vector.
pub struct BytecodeParser<'p> {
    program: &'p UdonProgramData,
}

impl<'p> BytecodeParser<'p> {
    pub fn new(program: &'p UdonProgramData) -> Self {
        Self { program }
    }

    pub fn parse(&self) -> DecompileResult<ParsedProgram> {
        debug!("parsing bytecode");
        let bytes = &self.program.byte_code;
        let mut instructions = Vec::new();
        let mut by_address = FxHashMap::default();

        let mut address = 0u32;
        while (address as usize) < bytes.len() {
            let instruction = self.parse_instruction_at(bytes, address)?;
            address = instruction.next_address();
            by_address.insert(instruction.address, instructions.len());
            instructions.push(instruction);
        }

        info!(count = instructions.len(), "parsed bytecode");
        Ok(ParsedProgram {
            instructions,
            by_address,
        })
    }

    fn parse_instruction_at(&self, bytes: &[u8], address: u32) -> DecompileResult<Instruction> {
        let addr = address as usize;
        let opcode_value = read_u32(bytes, addr).ok_or_else(|| DecompileError::MalformedBytecode {
            address,
            reason: "opcode read past end of bytecode".to_string(),
        })?;

        let opcode = OpCode::from_u32(opcode_value).ok_or(DecompileError::MalformedBytecode {
            address,
            reason: format!("unknown opcode value {opcode_value}"),
        })?;

        let mut operand = None;
        let mut operand_name = None;

        if opcode.has_operand() {
            let operand_value =
                read_u32(bytes, addr + 4).ok_or_else(|| DecompileError::MalformedBytecode {
                    address,
                    reason: "truncated operand".to_string(),
                })?;
            operand = Some(operand_value);

            if opcode.has_operand_name() {
                operand_name = Some(self.resolve_operand_name(opcode, operand_value, address)?);
            }
        }

        Ok(Instruction {
            address,
            opcode,
            operand,
            operand_name,
        })
    }

    fn resolve_operand_name(
        &self,
        opcode: OpCode,
        operand: u32,
        instruction_address: u32,
    ) -> DecompileResult<String> {
        if opcode == OpCode::Extern {
            let heap_entry = self.program.heap_entry(operand).ok_or_else(|| {
                DecompileError::MalformedBytecode {
                    address: instruction_address,
                    reason: format!("EXTERN operand {operand:#010x} has no heap entry"),
                }
            })?;
            heap_entry
                .value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| DecompileError::MalformedBytecode {
                    address: instruction_address,
                    reason: format!(
                        "EXTERN operand {operand:#010x} heap value is not a string signature"
                    ),
                })
        } else {
            self.program
                .symbol_by_address(operand)
                .map(|s| s.name.clone())
                .ok_or_else(|| DecompileError::MalformedBytecode {
                    address: instruction_address,
                    reason: format!("operand {operand:#010x} has no backing symbol"),
                })
        }
    }
}

/// Fills in `call_jump_target` for each declared entry point whose first
/// instruction is the halt-jump-sentinel `PUSH` (§4.1, §4.3 "call jump").
///
/// Entries whose first instruction is anything else keep `call_jump_target`
/// unset: they are plain function prologues, not call targets rewritten
/// from a caller's return address.
pub fn resolve_call_jump_targets(program: &mut UdonProgramData, parsed: &ParsedProgram) {
    for entry in &mut program.entry_points {
        let Some(first) = parsed.instruction_at(entry.address) else {
            continue;
        };
        if first.opcode != OpCode::Push {
            continue;
        }
        let Some(operand) = first.operand else {
            continue;
        };
        let is_halt_jump_const = first
            .operand_name
            .as_deref()
            .map(|name| name == udonc_model::HALT_JUMP_CONST_NAME)
            .unwrap_or(false);
        if !is_halt_jump_const {
            continue;
        }
        // The symbol name alone identifies the slot; confirm its *initial*
        // heap value really is the sentinel before trusting the pattern.
        let sentinel_confirmed = program
            .heap_entry(operand)
            .and_then(|entry| entry.value.as_u32())
            .map(|value| value == udonc_model::HALT_JUMP_SENTINEL)
            .unwrap_or(false);
        if sentinel_confirmed {
            entry.call_jump_target = Some(first.next_address());
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes(slice.try_into().ok()?))
}

/// The instruction stream plus an address index, ready for basic-block
/// discovery.
#[derive(Debug, Clone)]
pub struct ParsedProgram {
    pub instructions: Vec<Instruction>,
    by_address: FxHashMap<u32, usize>,
}

impl ParsedProgram {
    pub fn instruction_at(&self, address: u32) -> Option<&Instruction> {
        self.by_address.get(&address).map(|&i| &self.instructions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_model::{HeapEntry, HeapValue, SymbolInfo};

    fn program_with(byte_code: Vec<u8>) -> UdonProgramData {
        UdonProgramData {
            byte_code_length: byte_code.len(),
            byte_code,
            ..Default::default()
        }
    }

    #[test]
    fn parses_nop_stream() {
        // Two NOPs (opcode 0), 4 bytes each.
        let program = program_with(vec![0, 0, 0, 0, 0, 0, 0, 0]);
        let parsed = BytecodeParser::new(&program).parse().expect("parses");
        assert_eq!(parsed.instructions.len(), 2);
        assert_eq!(parsed.instructions[0].address, 0);
        assert_eq!(parsed.instructions[1].address, 4);
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        let program = program_with(vec![0, 0, 0, 3]); // opcode 3 is unassigned
        let result = BytecodeParser::new(&program).parse();
        assert!(matches!(
            result,
            Err(DecompileError::MalformedBytecode { .. })
        ));
    }

    #[test]
    fn truncated_operand_is_malformed() {
        // PUSH (opcode 1) with only 2 trailing bytes instead of 4.
        let program = program_with(vec![0, 0, 0, 1, 0, 0]);
        let result = BytecodeParser::new(&program).parse();
        assert!(matches!(
            result,
            Err(DecompileError::MalformedBytecode { .. })
        ));
    }

    #[test]
    fn push_operand_resolves_symbol_name() {
        let mut program = program_with(vec![0, 0, 0, 1, 0, 0, 0, 100]);
        program
            .symbols
            .insert("__const_x".to_string(), SymbolInfo::new("__const_x", "System.Int32", 100));
        let parsed = BytecodeParser::new(&program).parse().expect("parses");
        assert_eq!(
            parsed.instructions[0].operand_name.as_deref(),
            Some("__const_x")
        );
    }

    #[test]
    fn call_jump_target_set_for_halt_jump_prologue() {
        use udonc_model::EntryPointInfo;

        // PUSH __const_SystemUInt32_0 (addr 300); NOP
        let mut program = program_with(vec![0, 0, 0, 1, 0, 0, 1, 44, 0, 0, 0, 0]);
        program.symbols.insert(
            udonc_model::HALT_JUMP_CONST_NAME.to_string(),
            SymbolInfo::new(udonc_model::HALT_JUMP_CONST_NAME, "System.UInt32", 300),
        );
        program.heap_initial_values.insert(
            300,
            HeapEntry {
                address: 300,
                type_name: "System.UInt32".to_string(),
                value: HeapValue::Int(udonc_model::HALT_JUMP_SENTINEL as i64),
            },
        );
        program.entry_points.push(EntryPointInfo::new(None, 0));

        let parsed = BytecodeParser::new(&program).parse().expect("parses");
        resolve_call_jump_targets(&mut program, &parsed);
        assert_eq!(program.entry_points[0].call_jump_target, Some(8));
    }

    #[test]
    fn extern_operand_resolves_heap_string() {
        // EXTERN is opcode 6.
        let mut program = program_with(vec![0, 0, 0, 6, 0, 0, 0, 200]);
        program.heap_initial_values.insert(
            200,
            HeapEntry {
                address: 200,
                type_name: "System.String".to_string(),
                value: HeapValue::Str("Foo.Bar".to_string()),
            },
        );
        let parsed = BytecodeParser::new(&program).parse().expect("parses");
        assert_eq!(
            parsed.instructions[0].operand_name.as_deref(),
            Some("Foo.Bar")
        );
    }
}
