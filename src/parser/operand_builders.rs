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

use super::Rule;
use crate::arch;
use crate::ast::{Name, Operand, OperandKind};
use crate::errors::AssemblyError;
use pest::Span;
use pest::iterators::Pair;

pub fn custom_error(span: Span, message: &str) -> AssemblyError {
    AssemblyError::Parse(Box::new(pest::error::Error::new_from_span(
        pest::error::ErrorVariant::CustomError {
            message: message.to_string(),
        },
        span,
    )))
}

pub fn build_name(pair: Pair<Rule>) -> Name {
    Name {
        text: pair.as_str().to_string(),
        column: pair.as_span().start_pos().line_col().1 - 1,
    }
}

pub fn build_operand(pair: Pair<Rule>) -> Operand {
    let column = pair.as_span().start_pos().line_col().1 - 1;
    let inner = pair.into_inner().next().unwrap();

    let kind = match inner.as_rule() {
        Rule::register => {
            OperandKind::Register(arch::register_id_from_name(inner.as_str()).unwrap())
        }
        Rule::number => {
            let number = inner.into_inner().next().unwrap();
            match number.as_rule() {
                Rule::integer => OperandKind::Immediate(parse_integer(number.as_str())),
                Rule::char_literal => OperandKind::Immediate(parse_char_literal(number.as_str())),
                _ => unreachable!(),
            }
        }
        Rule::symbol => OperandKind::Symbol(inner.as_str().to_string()),
        _ => unreachable!(),
    };

    Operand { kind, column }
}

/// Parses an integer literal in any of the accepted bases. Values too large
/// for an i64 saturate, which the assembler then rejects as out of range.
fn parse_integer(text: &str) -> i64 {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse::<i64>()
    };

    let value = parsed.unwrap_or(i64::MAX);
    if negative { -value } else { value }
}

fn parse_char_literal(text: &str) -> i64 {
    // The grammar guarantees the shape 'c' or '\c'.
    let inner = &text[1..text.len() - 1];
    let mut chars = inner.chars();

    match chars.next().unwrap() {
        '\\' => escape_char_to_byte(chars.next().unwrap()) as i64,
        c => c as i64,
    }
}

/// Resolves the escapes the assembler understands; anything else maps to a
/// NUL byte, matching the reference toolchain.
fn escape_char_to_byte(c: char) -> u8 {
    match c {
        'a' => 0x07,
        'b' => 0x08,
        'e' => 0x1b,
        'f' => 0x0c,
        'n' => b'\n',
        'r' => b'\r',
        't' => b'\t',
        'v' => 0x0b,
        '\\' => b'\\',
        '"' => b'"',
        '\'' => b'\'',
        _ => 0,
    }
}

pub fn build_string_bytes(text: &str) -> Vec<u8> {
    // Strip the surrounding double quotes.
    let inner = &text[1..text.len() - 1];
    let mut bytes = Vec::new();
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                bytes.push(escape_char_to_byte(escaped));
            }
            continue;
        }

        let mut utf8 = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    bytes
}
