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

use iridtools::arch::*;
use iridtools::iof::reader::Object;
use iridtools::{assemble_object, assemble_raw};

#[test]
fn test_object_carries_symbols_links_and_exports() {
    let source = "\
main:
	mov r1, message
	call puts
	mov8 r0, 0x10
	cpucall
message:
.string \"hi\"
.export main
";

    let bytes = assemble_object("greet.s", source).unwrap();
    let object = Object::parse(&bytes, "greet.iof").unwrap();
    assert_eq!(object.sections.len(), 1);

    let section = &object.sections[0];
    assert_eq!(section.name().unwrap(), "greet.s");

    let mut symbols = Vec::new();
    for symbol in section.symbols().unwrap() {
        symbols.push((section.string_by_id(symbol.string_id).unwrap(), symbol.addr));
    }
    assert_eq!(
        symbols,
        vec![("main".to_string(), 0), ("message".to_string(), 16)]
    );

    let mut links = Vec::new();
    for link in section.links().unwrap() {
        links.push((section.string_by_id(link.string_id).unwrap(), link.addr));
    }
    // `message` is known but still linked (operand slot at 0 + 2); `puts`
    // is external (operand slot at 4 + 1).
    assert_eq!(
        links,
        vec![("message".to_string(), 2), ("puts".to_string(), 5)]
    );

    let exports = section.exports().unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(
        section.string_by_id(exports[0].string_id).unwrap(),
        "main"
    );
    assert_eq!(exports[0].offset, 0);
}

#[test]
fn test_object_round_trip_preserves_code() {
    let source = "mov r0, 0x10\ncpucall\n";
    let raw = assemble_raw("mini.s", source).unwrap();

    let bytes = assemble_object("mini.s", source).unwrap();
    let object = Object::parse(&bytes, "mini.iof").unwrap();
    assert_eq!(object.sections[0].code().unwrap(), &raw[..]);
}

#[test]
fn test_leading_org_sets_static_origin() {
    let source = ".org 0x200\nstart:\nnop\n";
    let bytes = assemble_object("fixed.s", source).unwrap();
    let object = Object::parse(&bytes, "fixed.iof").unwrap();

    let section = &object.sections[0];
    assert!(section.header.has_static_origin());
    assert_eq!(section.header.origin, 0x200);
    // The gap below the origin is stripped; only the nop slot remains.
    assert_eq!(section.header.code_size, 4);

    // Symbols keep their cursor-relative addresses.
    let symbols = section.symbols().unwrap();
    assert_eq!(symbols[0].addr, 0x200);
}

#[test]
fn test_org_mid_file_does_not_set_origin() {
    let source = "start:\nnop\n.org 0x100\nnop\n";
    let bytes = assemble_object("float.s", source).unwrap();
    let object = Object::parse(&bytes, "float.iof").unwrap();

    let section = &object.sections[0];
    assert!(!section.header.has_static_origin());
    assert_eq!(section.header.code_size, 0x104);
}

#[test]
fn test_diagnostic_carries_file_line_and_caret() {
    let source = "nop\nmov r0, r9x 5\n";
    let err = assemble_raw("bad.s", source).unwrap_err();
    let rendered = err.to_string();

    assert!(rendered.contains("bad.s"), "missing file name: {}", rendered);
    assert!(rendered.contains("   2 | mov r0, r9x 5"), "missing snippet: {}", rendered);
    assert!(rendered.contains("^ "), "missing caret: {}", rendered);
}

#[test]
fn test_alignment_shifts_branch_target_onto_instruction() {
    // A label between data and an instruction must land on the aligned
    // instruction, so the branch does not jump into padding.
    let source = "\
.byte 1
entry:
	nop
	jmp entry
";
    let code = assemble_raw("align.s", source).unwrap();

    // entry was shifted from 1 to 4; the jmp at 8 targets 4.
    assert_eq!(code[4], I_NOP);
    assert_eq!(code[8], I_JMP);
    assert_eq!(code[9], 0x04);
    assert_eq!(code[10], 0x00);
}

#[test]
fn test_value_directive_resolves_before_linking() {
    let source = ".value PORT 0x42\n.value COUNT 3\nmov16 r1, PORT\nmov r2, COUNT\n";
    let bytes = assemble_object("values.s", source).unwrap();
    let object = Object::parse(&bytes, "values.iof").unwrap();

    // Values substitute literals, so no link points are emitted.
    let section = &object.sections[0];
    assert_eq!(section.links().unwrap().len(), 0);

    let code = section.code().unwrap();
    assert_eq!(&code[0..4], &[I_MOV16, R_R1, 0x42, 0x00]);
    assert_eq!(&code[4..8], &[I_MOV16, R_R2, 0x03, 0x00]);
}

#[test]
fn test_char_and_escape_literals() {
    let code = assemble_raw(
        "chars.s",
        "mov8 h0, 'A'\nmov8 h0, '\\n'\nmov8 h0, '\\e'\nmov8 h0, '\\\\'\n",
    )
    .unwrap();

    assert_eq!(code[2], b'A');
    assert_eq!(code[6], b'\n');
    assert_eq!(code[10], 0x1b);
    assert_eq!(code[14], b'\\');
}

#[test]
fn test_string_escapes_and_nul() {
    let code = assemble_raw("str.s", ".string \"a\\tb\\\"c\"\n").unwrap();
    assert_eq!(code, vec![b'a', b'\t', b'b', b'"', b'c', 0]);
}

#[test]
fn test_stdin_style_input_name_in_diagnostics() {
    let err = assemble_raw("-", ".byte 999\n").unwrap_err();
    assert!(err.to_string().contains("irid-as: error in -"));
}

#[test]
fn test_local_label_follows_most_recent_global() {
    let source = "\
first:
	jmp @next
@next:
	nop
second:
	jmp @next
@next:
	nop
";
    let code = assemble_raw("locals.s", source).unwrap();

    // first@next = 4, second@next = 12.
    assert_eq!(code[1], 0x04);
    assert_eq!(code[9], 0x0c);
}
