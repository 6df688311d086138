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

use super::{Assembler, ExportedName, NamedValue};
use crate::ast::{AssemblyLine, Directive, Name, Operand, OperandKind};
use crate::errors::{AssemblyError, WarningKind};

impl Assembler {
    pub(super) fn process_directive(
        &mut self,
        line: &AssemblyLine,
        directive: &Directive,
    ) -> Result<(), AssemblyError> {
        match directive {
            Directive::Org(operand) => self.directive_org(line, operand),
            Directive::Byte(operand) => self.directive_byte(line, operand),
            Directive::String { bytes, .. } => {
                self.directive_string(bytes);
                Ok(())
            }
            Directive::Resv(operand) => self.directive_resv(line, operand),
            Directive::Value { name, value } => self.directive_value(line, name, value),
            Directive::Export { name } => {
                self.directive_export(line, name);
                Ok(())
            }
        }
    }

    fn directive_org(
        &mut self,
        line: &AssemblyLine,
        operand: &Operand,
    ) -> Result<(), AssemblyError> {
        let addr = self.expect_unsigned(line, operand, "expected an origin address")?;

        if self.pos > addr as usize {
            self.warn(
                WarningKind::OriginOverlap,
                line.line_number,
                operand.column,
                "origin point may overlap existing data",
            );
        }

        // An origin before anything else pins the whole section.
        if self.code.is_empty() && self.labels.is_empty() && self.first_org.is_none() {
            self.first_org = Some(addr);
        }

        self.pos = addr as usize;
        Ok(())
    }

    fn directive_byte(
        &mut self,
        line: &AssemblyLine,
        operand: &Operand,
    ) -> Result<(), AssemblyError> {
        let value = match operand.kind {
            OperandKind::Immediate(value) => value,
            _ => {
                return Err(self.error(
                    line.line_number,
                    operand.column,
                    "expected a byte value here",
                ));
            }
        };

        if value > 255 {
            return Err(self.error(
                line.line_number,
                operand.column,
                "value for a byte is too large, try .word instead",
            ));
        }

        self.mark_emission();
        self.code.insert(value as u8, self.pos);
        self.pos += 1;
        Ok(())
    }

    fn directive_string(&mut self, bytes: &[u8]) {
        self.mark_emission();
        self.code.insert_range(bytes, self.pos);
        self.pos += bytes.len();
        self.code.insert(0, self.pos);
        self.pos += 1;
    }

    fn directive_resv(
        &mut self,
        line: &AssemblyLine,
        operand: &Operand,
    ) -> Result<(), AssemblyError> {
        let bytes_to_resv =
            self.expect_unsigned(line, operand, "expected an amount of bytes to reserve")?;

        self.mark_emission();
        self.code.insert_fill(0, self.pos, bytes_to_resv as usize);
        self.pos += bytes_to_resv as usize;
        Ok(())
    }

    fn directive_value(
        &mut self,
        line: &AssemblyLine,
        name: &Name,
        value: &Operand,
    ) -> Result<(), AssemblyError> {
        let value = match value.kind {
            OperandKind::Immediate(imm) => {
                self.check_int_range(imm, line, value.column)?;
                imm
            }
            _ => {
                return Err(self.error(line.line_number, value.column, "expected a value"));
            }
        };

        self.values.push(NamedValue {
            name: name.text.clone(),
            value,
        });
        Ok(())
    }

    fn directive_export(&mut self, line: &AssemblyLine, name: &Name) {
        self.exports.push(ExportedName {
            name: name.text.clone(),
            line: line.line_number,
            column: name.column,
        });
    }

    fn expect_unsigned(
        &self,
        line: &AssemblyLine,
        operand: &Operand,
        what: &str,
    ) -> Result<u16, AssemblyError> {
        match operand.kind {
            OperandKind::Immediate(value) => {
                self.check_int_range(value, line, operand.column)?;
                if value < 0 {
                    return Err(self.error(
                        line.line_number,
                        operand.column,
                        "value is below the allowed range",
                    ));
                }
                Ok(value as u16)
            }
            _ => Err(self.error(line.line_number, operand.column, what)),
        }
    }
}
