/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use super::Assembler;
use crate::arch::*;
use crate::ast::{AssemblyLine, Instruction, Operand, OperandKind};
use crate::errors::{AssemblyError, WarningKind};

/// Instruction families keyed on operand kind. The width-suffixed opcodes
/// are contiguous with the plain form (MOV, MOV8, MOV16), which is what the
/// `DestAndAny` handler relies on when it picks the narrowest encoding.
#[derive(Debug, Copy, Clone, PartialEq)]
enum Family {
    NoArgs,
    Register,
    DestAndAny,
    DestAndImm8,
    DestAndImm16,
    DestRegOrImm8,
    Imm8,
    Imm16,
    Addr,
    LoadStore { imm16_opcode: u8 },
}

const INSTRUCTIONS: &[(&str, u8, Family)] = &[
    ("nop", I_NOP, Family::NoArgs),
    ("cpucall", I_CPUCALL, Family::NoArgs),
    ("rti", I_RTI, Family::NoArgs),
    ("sti", I_STI, Family::NoArgs),
    ("dsi", I_DSI, Family::NoArgs),
    ("ret", I_RET, Family::NoArgs),
    ("push", I_PUSH, Family::Register),
    ("pop", I_POP, Family::Register),
    ("null", I_NULL, Family::Register),
    ("not", I_NOT, Family::Register),
    ("callr", I_CALLR, Family::Register),
    ("push8", I_PUSH8, Family::Imm8),
    ("push16", I_PUSH16, Family::Imm16),
    ("mov", I_MOV, Family::DestAndAny),
    ("add", I_ADD, Family::DestAndAny),
    ("sub", I_SUB, Family::DestAndAny),
    ("mul", I_MUL, Family::DestAndAny),
    ("cmp", I_CMP, Family::DestAndAny),
    ("cmg", I_CMG, Family::DestAndAny),
    ("cml", I_CML, Family::DestAndAny),
    ("and", I_AND, Family::DestAndAny),
    ("or", I_OR, Family::DestAndAny),
    ("mov8", I_MOV8, Family::DestAndImm8),
    ("add8", I_ADD8, Family::DestAndImm8),
    ("sub8", I_SUB8, Family::DestAndImm8),
    ("mul8", I_MUL8, Family::DestAndImm8),
    ("cmp8", I_CMP8, Family::DestAndImm8),
    ("cmg8", I_CMG8, Family::DestAndImm8),
    ("cml8", I_CML8, Family::DestAndImm8),
    ("and8", I_AND8, Family::DestAndImm8),
    ("or8", I_OR8, Family::DestAndImm8),
    ("shr8", I_SHR8, Family::DestAndImm8),
    ("shl8", I_SHL8, Family::DestAndImm8),
    ("mov16", I_MOV16, Family::DestAndImm16),
    ("add16", I_ADD16, Family::DestAndImm16),
    ("sub16", I_SUB16, Family::DestAndImm16),
    ("mul16", I_MUL16, Family::DestAndImm16),
    ("cmp16", I_CMP16, Family::DestAndImm16),
    ("cmg16", I_CMG16, Family::DestAndImm16),
    ("cml16", I_CML16, Family::DestAndImm16),
    ("and16", I_AND16, Family::DestAndImm16),
    ("or16", I_OR16, Family::DestAndImm16),
    ("jnz", I_JNZ, Family::DestAndImm16),
    ("load16", I_LOAD16, Family::DestAndImm16),
    ("store16", I_STORE16, Family::DestAndImm16),
    ("shr", I_SHR, Family::DestRegOrImm8),
    ("shl", I_SHL, Family::DestRegOrImm8),
    ("jmp", I_JMP, Family::Addr),
    ("jeq", I_JEQ, Family::Addr),
    ("call", I_CALL, Family::Addr),
    ("load", I_LOAD, Family::LoadStore { imm16_opcode: I_LOAD16 }),
    ("store", I_STORE, Family::LoadStore { imm16_opcode: I_STORE16 }),
];

impl Assembler {
    pub(super) fn process_instruction(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
    ) -> Result<(), AssemblyError> {
        let entry = INSTRUCTIONS
            .iter()
            .find(|(name, _, _)| *name == ins.mnemonic);

        let (opcode, family) = match entry {
            Some(&(_, opcode, family)) => (opcode, family),
            None => {
                return Err(self.error(line.line_number, ins.column, "unknown instruction"));
            }
        };

        // Link-point offsets are computed from the cursor, so alignment has
        // to happen before any operand is resolved.
        self.align_cursor();

        match family {
            Family::NoArgs => self.ins_no_arguments(line, ins, opcode),
            Family::Register => self.ins_register(line, ins, opcode),
            Family::DestAndAny => self.ins_dest_and_any(line, ins, opcode),
            Family::DestAndImm8 => self.ins_dest_and_imm8(line, ins, opcode),
            Family::DestAndImm16 => self.ins_dest_and_imm16(line, ins, opcode),
            Family::DestRegOrImm8 => self.ins_dest_reg_or_imm8(line, ins, opcode),
            Family::Imm8 => self.ins_imm8(line, ins, opcode),
            Family::Imm16 => self.ins_imm16(line, ins, opcode),
            Family::Addr => self.ins_addr(line, ins, opcode),
            Family::LoadStore { imm16_opcode } => {
                self.ins_load_and_store(line, ins, opcode, imm16_opcode)
            }
        }
    }

    fn ins_no_arguments(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        if let Some(extra) = ins.operands.first() {
            return Err(self.error(
                line.line_number,
                extra.column,
                format!("{} does not take any arguments", ins.mnemonic),
            ));
        }

        self.emit_slot(&[opcode]);
        Ok(())
    }

    fn ins_register(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_operands(line, ins, 1, "missing register argument")?;
        let register = self.expect_register(line, &ins.operands[0])?;

        self.emit_slot(&[opcode, register]);
        Ok(())
    }

    fn ins_imm8(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_operands(line, ins, 1, "missing immediate argument")?;
        let value = self.expect_imm8(line, &ins.operands[0])?;

        self.emit_slot(&[opcode, value]);
        Ok(())
    }

    fn ins_imm16(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_operands(line, ins, 1, "missing immediate argument")?;
        let operand = ins.operands[0].clone();

        let value = match &operand.kind {
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, operand.column)?;
                *value as u16
            }
            OperandKind::Symbol(symbol) => {
                self.resolve_value_or_link(line, symbol, self.pos + 1, operand.column)?
            }
            OperandKind::Register(_) => {
                return Err(self.error(
                    line.line_number,
                    operand.column,
                    "expected an immediate value",
                ));
            }
        };

        let [low, high] = value.to_le_bytes();
        self.emit_slot(&[opcode, low, high]);
        Ok(())
    }

    fn ins_dest_and_any(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        const IMM8_MODE: u8 = 1;
        const IMM16_MODE: u8 = 2;

        self.expect_dest_and_source(line, ins)?;
        let dest = self.expect_register(line, &ins.operands[0])?;
        let source = ins.operands[1].clone();

        match &source.kind {
            OperandKind::Register(src) => {
                // register, register
                self.emit_slot(&[opcode, dest, *src]);
            }
            OperandKind::Symbol(symbol) => {
                let addr =
                    self.resolve_value_or_link(line, symbol, self.pos + 2, source.column)?;
                let [low, high] = addr.to_le_bytes();
                self.emit_slot(&[opcode + IMM16_MODE, dest, low, high]);
            }
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, source.column)?;

                if *value < 256 {
                    // register, imm8
                    self.emit_slot(&[opcode + IMM8_MODE, dest, *value as u8]);
                } else {
                    // register, imm16
                    if register_width(dest) == RegisterWidth::Byte {
                        self.warn(
                            WarningKind::Truncation,
                            line.line_number,
                            source.column,
                            "value does not fit in half-register, it will be truncated",
                        );
                    }

                    let [low, high] = (*value as u16).to_le_bytes();
                    self.emit_slot(&[opcode + IMM16_MODE, dest, low, high]);
                }
            }
        }

        Ok(())
    }

    fn ins_dest_and_imm8(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_dest_and_source(line, ins)?;
        let dest = self.expect_register(line, &ins.operands[0])?;
        let value = self.expect_imm8(line, &ins.operands[1])?;

        self.emit_slot(&[opcode, dest, value]);
        Ok(())
    }

    fn ins_dest_and_imm16(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_dest_and_source(line, ins)?;
        let dest = self.expect_register(line, &ins.operands[0])?;
        let source = ins.operands[1].clone();

        let value = match &source.kind {
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, source.column)?;
                *value as u16
            }
            OperandKind::Symbol(symbol) => {
                self.resolve_value_or_link(line, symbol, self.pos + 2, source.column)?
            }
            OperandKind::Register(_) => {
                return Err(self.error(
                    line.line_number,
                    source.column,
                    "expected an immediate or address",
                ));
            }
        };

        let [low, high] = value.to_le_bytes();
        self.emit_slot(&[opcode, dest, low, high]);
        Ok(())
    }

    fn ins_dest_reg_or_imm8(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_dest_and_source(line, ins)?;
        let dest = self.expect_register(line, &ins.operands[0])?;
        let source = ins.operands[1].clone();

        match &source.kind {
            OperandKind::Register(src) => {
                self.emit_slot(&[opcode, dest, *src]);
            }
            _ => {
                let value = self.expect_imm8(line, &source)?;
                self.emit_slot(&[opcode + 1, dest, value]);
            }
        }

        Ok(())
    }

    fn ins_addr(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_operands(line, ins, 1, "missing address argument")?;
        let operand = ins.operands[0].clone();

        let addr = match &operand.kind {
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, operand.column)?;
                *value as u16
            }
            OperandKind::Symbol(symbol) => {
                self.resolve_value_or_link(line, symbol, self.pos + 1, operand.column)?
            }
            OperandKind::Register(_) => {
                return Err(self.error(line.line_number, operand.column, "expected an address"));
            }
        };

        let [low, high] = addr.to_le_bytes();
        self.emit_slot(&[opcode, low, high]);
        Ok(())
    }

    fn ins_load_and_store(
        &mut self,
        line: &AssemblyLine,
        ins: &Instruction,
        r_opcode: u8,
        imm16_opcode: u8,
    ) -> Result<(), AssemblyError> {
        self.expect_dest_and_source(line, ins)?;
        let operand = self.expect_register(line, &ins.operands[0])?;
        let addr_operand = ins.operands[1].clone();

        let addr = match &addr_operand.kind {
            OperandKind::Register(pointer) => {
                self.emit_slot(&[r_opcode, operand, *pointer]);
                return Ok(());
            }
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, addr_operand.column)?;
                *value as u16
            }
            OperandKind::Symbol(symbol) => {
                self.resolve_value_or_link(line, symbol, self.pos + 2, addr_operand.column)?
            }
        };

        let [low, high] = addr.to_le_bytes();
        self.emit_slot(&[imm16_opcode, operand, low, high]);
        Ok(())
    }

    // --- operand checks ---

    fn expect_operands(
        &self,
        line: &AssemblyLine,
        ins: &Instruction,
        count: usize,
        missing: &str,
    ) -> Result<(), AssemblyError> {
        if ins.operands.len() < count {
            return Err(self.error(line.line_number, self.snippet(line.line_number).len(), missing));
        }

        if ins.operands.len() > count {
            return Err(self.error(
                line.line_number,
                ins.operands[count].column,
                format!("unwanted argument for {} instruction", ins.mnemonic),
            ));
        }

        Ok(())
    }

    fn expect_dest_and_source(
        &self,
        line: &AssemblyLine,
        ins: &Instruction,
    ) -> Result<(), AssemblyError> {
        if ins.operands.is_empty() {
            return Err(self.error(
                line.line_number,
                ins.column + ins.mnemonic.len(),
                "missing destination register",
            ));
        }

        if ins.operands.len() == 1 {
            return Err(self.error(
                line.line_number,
                self.snippet(line.line_number).len(),
                "missing source register or immediate",
            ));
        }

        if ins.operands.len() > 2 {
            return Err(self.error(
                line.line_number,
                ins.operands[2].column,
                format!("unwanted argument for {} instruction", ins.mnemonic),
            ));
        }

        Ok(())
    }

    fn expect_register(
        &self,
        line: &AssemblyLine,
        operand: &Operand,
    ) -> Result<u8, AssemblyError> {
        match operand.kind {
            OperandKind::Register(id) => Ok(id),
            _ => Err(self.error(
                line.line_number,
                operand.column,
                "expected a register as the destination argument",
            )),
        }
    }

    fn expect_imm8(&self, line: &AssemblyLine, operand: &Operand) -> Result<u8, AssemblyError> {
        match &operand.kind {
            OperandKind::Immediate(value) => {
                self.check_int_range(*value, line, operand.column)?;
                if *value > 255 {
                    return Err(self.error(
                        line.line_number,
                        operand.column,
                        "value cannot fit in a 8-bit byte",
                    ));
                }
                Ok(*value as u8)
            }
            OperandKind::Symbol(_) => Err(self.error(
                line.line_number,
                operand.column,
                "an 8-bit immediate is allowed here, an address is too wide",
            )),
            OperandKind::Register(_) => Err(self.error(
                line.line_number,
                operand.column,
                "expected an immediate value",
            )),
        }
    }
}
