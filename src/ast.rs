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

/// A name with the column it starts at, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub column: usize,
}

// Represents all possible forms an argument to an instruction can take.
// Symbols are unresolved here; the assembler decides whether one names a
// `.value` constant or becomes a link point.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Register(u8),
    Immediate(i64),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Org(Operand),                          // .org 0x1000
    Byte(Operand),                         // .byte 0x7f
    String { bytes: Vec<u8>, column: usize }, // .string "text", escapes resolved
    Resv(Operand),                         // .resv 32
    Value { name: Name, value: Operand },  // .value NAME 0x01
    Export { name: Name },                 // .export NAME
}

// A single instruction line: the mnemonic and its raw operands. Family
// checking (operand count, kinds, widths) happens in the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: String,
    pub column: usize,
    pub operands: Vec<Operand>,
}

// --- Assembly Line Structure ---

// Represents a single source line, which carries a label, a directive or an
// instruction. Empty lines are dropped by the parser.
#[derive(Debug, Clone, Default)]
pub struct AssemblyLine {
    pub line_number: usize,
    pub label: Option<Name>,
    pub directive: Option<Directive>,
    pub instruction: Option<Instruction>,
}
