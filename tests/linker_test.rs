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
use iridtools::assemble_object;
use iridtools::errors::LinkError;
use iridtools::iof::reader::Object;
use iridtools::linker::link_buffers;
use std::fs;

fn link_sources(sources: &[(&str, &str)]) -> Result<Vec<u8>, LinkError> {
    let mut buffers = Vec::new();
    for (name, source) in sources {
        let object = assemble_object(name, source).unwrap();
        buffers.push((name.to_string(), object));
    }

    link_buffers(&buffers)
}

#[test]
fn test_single_object_image_matches_raw_binary() {
    let source = "main:\nmov r0, 0x10\ncpucall\n";
    let image = link_sources(&[("main.s", source)]).unwrap();
    let raw = iridtools::assemble_raw("main.s", source).unwrap();
    assert_eq!(image, raw);
}

#[test]
fn test_cross_object_symbols_patched() {
    // Object A exports `main` at a nonzero offset; object B calls it.
    let a = "\
	nop
	nop
main:
	nop
	ret
.export main
";
    let b = "\
puts:
	call main
	ret
.export puts
";

    let image = link_sources(&[("a.s", a), ("b.s", b)]).unwrap();

    // a.s occupies [0, 16); b.s is appended at 16. main sits at 8.
    assert_eq!(image.len(), 24);
    assert_eq!(image[16], I_CALL);
    assert_eq!(image[17], 0x08);
    assert_eq!(image[18], 0x00);
}

#[test]
fn test_mutual_references_between_objects() {
    let a = "\
main:
	call puts
	mov8 r0, 0x10
	cpucall
.export main
";
    let b = "\
puts:
	call main
	ret
.export puts
";

    let image = link_sources(&[("a.s", a), ("b.s", b)]).unwrap();

    // a.s at [0, 12), b.s at [12, 20). puts = 12, main = 0.
    assert_eq!(image[0], I_CALL);
    assert_eq!(image[1], 0x0c);
    assert_eq!(image[12], I_CALL);
    assert_eq!(image[13], 0x00);
}

#[test]
fn test_static_origin_section_placed_at_origin() {
    let fixed = ".org 0x400\nhandler:\nnop\nret\n.export handler\n";
    let float = "main:\njmp handler\n.export main\n";

    let image = link_sources(&[("fixed.s", fixed), ("float.s", float)]).unwrap();

    // The fixed section lands at 0x400; the floating one fills from 0.
    assert_eq!(image.len(), 0x408);
    assert_eq!(image[0x400], I_NOP);
    assert_eq!(image[0x404], I_RET);
    assert_eq!(image[0], I_JMP);
    assert_eq!(image[1], 0x00);
    assert_eq!(image[2], 0x04);
}

#[test]
fn test_duplicate_export_across_objects_fatal() {
    let a = "main:\nnop\n.export main\n";
    let b = "main:\nret\n.export main\n";

    let result = link_sources(&[("a.s", a), ("b.s", b)]);
    assert_eq!(
        result,
        Err(LinkError::DuplicateExport {
            symbol: "main".to_string()
        })
    );
}

#[test]
fn test_unresolved_symbol_names_offender() {
    let source = "main:\ncall missing_function\n";
    let result = link_sources(&[("main.s", source)]);
    assert_eq!(
        result,
        Err(LinkError::UnresolvedSymbol {
            symbol: "missing_function".to_string()
        })
    );
}

#[test]
fn test_non_exported_symbols_stay_local() {
    // `helper` is not exported by a.s, so b.s cannot see it.
    let a = "helper:\nret\n";
    let b = "main:\ncall helper\n.export main\n";

    let result = link_sources(&[("a.s", a), ("b.s", b)]);
    assert_eq!(
        result,
        Err(LinkError::UnresolvedSymbol {
            symbol: "helper".to_string()
        })
    );
}

#[test]
fn test_objects_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();

    let a_path = dir.path().join("a.iof");
    let b_path = dir.path().join("b.iof");
    fs::write(&a_path, assemble_object("a.s", "main:\nnop\n.export main\n").unwrap()).unwrap();
    fs::write(&b_path, assemble_object("b.s", "jmp main\n").unwrap()).unwrap();

    let a_data = fs::read(&a_path).unwrap();
    let b_data = fs::read(&b_path).unwrap();

    let objects = vec![
        Object::parse(&a_data, "a.iof").unwrap(),
        Object::parse(&b_data, "b.iof").unwrap(),
    ];

    let image = iridtools::linker::link_objects(&objects).unwrap();
    assert_eq!(image[4], I_JMP);
    assert_eq!(image[5], 0x00);
    assert_eq!(image[6], 0x00);
}

#[test]
fn test_rejects_non_iof_input() {
    let result = link_buffers(&[("garbage.bin".to_string(), vec![0u8; 64])]);
    assert_eq!(
        result,
        Err(LinkError::BadMagic {
            path: "garbage.bin".to_string()
        })
    );
}
