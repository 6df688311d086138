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

mod operand_builders;

use crate::ast::*;
use crate::errors::AssemblyError;
use operand_builders::{build_name, build_operand, build_string_bytes, custom_error};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

// Derive the parser from our grammar file.
#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct IridParser;

// Main parsing function that takes the entire source code string.
pub fn parse_source(source: &str) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let pairs = IridParser::parse(Rule::program, source).map_err(Box::new)?;
    let mut ast = Vec::new();

    for statement in pairs.flatten().filter(|p| p.as_rule() == Rule::statement) {
        let line_number = statement.as_span().start_pos().line_col().0;
        let inner = statement.into_inner().next().unwrap();
        let mut assembly_line = AssemblyLine {
            line_number,
            ..Default::default()
        };

        match inner.as_rule() {
            Rule::label_decl => {
                assembly_line.label = Some(build_name(inner.into_inner().next().unwrap()));
            }
            Rule::directive => {
                assembly_line.directive = Some(build_directive(inner)?);
            }
            Rule::instruction => {
                assembly_line.instruction = Some(build_instruction(inner)?);
            }
            _ => {}
        }

        ast.push(assembly_line);
    }

    Ok(ast)
}

fn build_directive(pair: Pair<Rule>) -> Result<Directive, AssemblyError> {
    let inner = pair.into_inner().next().unwrap();

    match inner.as_rule() {
        Rule::org_directive => {
            let operand = build_operand(inner.into_inner().next().unwrap());
            Ok(Directive::Org(operand))
        }
        Rule::byte_directive => {
            let operand = build_operand(inner.into_inner().next().unwrap());
            Ok(Directive::Byte(operand))
        }
        Rule::string_directive => {
            let string = inner.into_inner().next().unwrap();
            let column = string.as_span().start_pos().line_col().1 - 1;
            Ok(Directive::String {
                bytes: build_string_bytes(string.as_str()),
                column,
            })
        }
        Rule::resv_directive => {
            let operand = build_operand(inner.into_inner().next().unwrap());
            Ok(Directive::Resv(operand))
        }
        Rule::value_directive => {
            let mut parts = inner.into_inner();
            let name = build_name(parts.next().unwrap());
            let value = build_operand(parts.next().unwrap());
            Ok(Directive::Value { name, value })
        }
        Rule::export_directive => {
            let name = build_name(inner.into_inner().next().unwrap());
            Ok(Directive::Export { name })
        }
        Rule::unknown_directive => {
            let span = inner.as_span();
            let name = inner.into_inner().next().unwrap();
            let message = match name.as_str() {
                "org" => ".org expects an origin address",
                "byte" => ".byte expects a single byte value",
                "string" => ".string expects a double-quoted string",
                "resv" => ".resv expects an amount of bytes to reserve",
                "value" => ".value expects a name and an integer value",
                "export" => ".export expects a symbol name",
                _ => "unknown directive",
            };
            Err(custom_error(span, message))
        }
        _ => unreachable!(),
    }
}

fn build_instruction(pair: Pair<Rule>) -> Result<Instruction, AssemblyError> {
    let column = pair.as_span().start_pos().line_col().1 - 1;
    let mut parts = pair.into_inner();
    let mnemonic = parts.next().unwrap().as_str().to_string();
    let operands = parts.map(build_operand).collect();

    Ok(Instruction {
        mnemonic,
        column,
        operands,
    })
}

// ------------- unit tests -------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nop() {
        let lines = parse_source("nop\n").unwrap();
        assert_eq!(lines.len(), 1);
        let ins = lines[0].instruction.as_ref().unwrap();
        assert_eq!(ins.mnemonic, "nop");
        assert!(ins.operands.is_empty());
        assert_eq!(lines[0].label, None);
    }

    #[test]
    fn test_parse_mov_registers() {
        let lines = parse_source("mov r0, r1\n").unwrap();
        let ins = lines[0].instruction.as_ref().unwrap();
        assert_eq!(ins.mnemonic, "mov");
        assert_eq!(ins.operands.len(), 2);
        assert_eq!(ins.operands[0].kind, OperandKind::Register(crate::arch::R_R0));
        assert_eq!(ins.operands[1].kind, OperandKind::Register(crate::arch::R_R1));
    }

    #[test]
    fn test_parse_commas_are_optional() {
        let lines = parse_source("add r0 r1\n").unwrap();
        let ins = lines[0].instruction.as_ref().unwrap();
        assert_eq!(ins.operands.len(), 2);
    }

    #[test]
    fn test_parse_half_registers() {
        let lines = parse_source("mov h2, l3\n").unwrap();
        let ins = lines[0].instruction.as_ref().unwrap();
        assert_eq!(ins.operands[0].kind, OperandKind::Register(crate::arch::R_H2));
        assert_eq!(ins.operands[1].kind, OperandKind::Register(crate::arch::R_L3));
    }

    #[test]
    fn test_parse_integer_bases() {
        let lines = parse_source("mov r0, 0x10\nmov r0, 0o17\nmov r0, 0b101\nmov r0, 42\n").unwrap();
        let imm = |i: usize| lines[i].instruction.as_ref().unwrap().operands[1].kind.clone();
        assert_eq!(imm(0), OperandKind::Immediate(0x10));
        assert_eq!(imm(1), OperandKind::Immediate(0o17));
        assert_eq!(imm(2), OperandKind::Immediate(0b101));
        assert_eq!(imm(3), OperandKind::Immediate(42));
    }

    #[test]
    fn test_parse_char_literal() {
        let lines = parse_source("mov8 h0, 'A'\nmov8 h0, '\\n'\n").unwrap();
        let imm = |i: usize| lines[i].instruction.as_ref().unwrap().operands[1].kind.clone();
        assert_eq!(imm(0), OperandKind::Immediate(b'A' as i64));
        assert_eq!(imm(1), OperandKind::Immediate(b'\n' as i64));
    }

    #[test]
    fn test_parse_symbol_operand() {
        let lines = parse_source("jmp main\ncall @loop\n").unwrap();
        let op = |i: usize| lines[i].instruction.as_ref().unwrap().operands[0].kind.clone();
        assert_eq!(op(0), OperandKind::Symbol("main".to_string()));
        assert_eq!(op(1), OperandKind::Symbol("@loop".to_string()));
    }

    #[test]
    fn test_register_like_symbol_stays_symbol() {
        // r9 is not a register, so it parses as a linkable symbol.
        let lines = parse_source("jmp r9\n").unwrap();
        let ins = lines[0].instruction.as_ref().unwrap();
        assert_eq!(ins.operands[0].kind, OperandKind::Symbol("r9".to_string()));
    }

    #[test]
    fn test_parse_label_declaration() {
        let lines = parse_source("main:\n@loop:\n").unwrap();
        assert_eq!(lines[0].label.as_ref().unwrap().text, "main");
        assert_eq!(lines[1].label.as_ref().unwrap().text, "@loop");
    }

    #[test]
    fn test_parse_directives() {
        let source = ".org 0x1000\n.byte 255\n.resv 16\n.value TEN 10\n.export main\n";
        let lines = parse_source(source).unwrap();

        assert!(matches!(lines[0].directive, Some(Directive::Org(_))));
        assert!(matches!(lines[1].directive, Some(Directive::Byte(_))));
        assert!(matches!(lines[2].directive, Some(Directive::Resv(_))));

        match lines[3].directive.as_ref().unwrap() {
            Directive::Value { name, value } => {
                assert_eq!(name.text, "TEN");
                assert_eq!(value.kind, OperandKind::Immediate(10));
            }
            other => panic!("expected .value, got {:?}", other),
        }

        match lines[4].directive.as_ref().unwrap() {
            Directive::Export { name } => assert_eq!(name.text, "main"),
            other => panic!("expected .export, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_string_directive() {
        let lines = parse_source(".string \"hi\\n\"\n").unwrap();
        match lines[0].directive.as_ref().unwrap() {
            Directive::String { bytes, .. } => assert_eq!(bytes, &[b'h', b'i', b'\n']),
            other => panic!("expected .string, got {:?}", other),
        }
    }

    #[test]
    fn test_string_keeps_comment_marker() {
        let lines = parse_source(".string \"a;b\" ; real comment\n").unwrap();
        match lines[0].directive.as_ref().unwrap() {
            Directive::String { bytes, .. } => assert_eq!(bytes, &[b'a', b';', b'b']),
            other => panic!("expected .string, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_and_blank_lines_dropped() {
        let lines = parse_source("; header\n\n  nop ; trailing\n\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_number, 3);
    }

    #[test]
    fn test_unknown_directive_is_an_error() {
        assert!(parse_source(".frobnicate 1\n").is_err());
    }

    #[test]
    fn test_last_line_without_newline() {
        let lines = parse_source("nop").unwrap();
        assert_eq!(lines.len(), 1);
    }
}
