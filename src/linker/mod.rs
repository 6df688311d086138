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

pub mod dump;
pub mod region;

use crate::arch::MEMORY_SIZE;
use crate::errors::LinkError;
use crate::iof::reader::{Object, Section};
use region::RegionTable;
use std::collections::HashMap;

/// A section picked out of an object, with its placement. `load_bias` is
/// what a section-relative address is shifted by to become absolute: for a
/// static-origin section the code starts at `origin` and the bias is zero,
/// for an appended section it is the allocation base.
struct SectionEntry<'a, 'b> {
    section: &'b Section<'a>,
    name: String,
    load_bias: usize,
    load_base: usize,
    code_size: usize,
}

/// Combines the sections of all given objects into a flat executable image.
///
/// Placement first honors `STATIC_ORIGIN` sections, then appends the rest
/// into free regions. Every link point is patched with the little-endian
/// absolute address of its symbol, resolved against the section's own
/// symbol table first and the global export map second.
pub fn link_objects(objects: &[Object<'_>]) -> Result<Vec<u8>, LinkError> {
    let mut entries = Vec::new();
    let mut regions = RegionTable::new(MEMORY_SIZE);

    for object in objects {
        for section in &object.sections {
            entries.push(SectionEntry {
                section,
                name: section.name()?,
                load_bias: 0,
                load_base: 0,
                code_size: section.header.code_size as usize,
            });
        }
    }

    // Sections with an explicit origin go exactly there.
    for entry in &mut entries {
        if !entry.section.header.has_static_origin() || entry.code_size == 0 {
            continue;
        }

        let origin = entry.section.header.origin as usize;
        regions
            .insert(origin, entry.code_size)
            .map_err(|_| LinkError::Overlap {
                name: entry.name.clone(),
            })?;

        entry.load_base = origin;
        entry.load_bias = 0;
    }

    // Everything else is appended into the remaining free space.
    for entry in &mut entries {
        if entry.section.header.has_static_origin() || entry.code_size == 0 {
            continue;
        }

        let start = regions
            .first_fit(entry.code_size)
            .ok_or_else(|| LinkError::NoSpace {
                name: entry.name.clone(),
            })?;

        regions
            .insert(start, entry.code_size)
            .map_err(|_| LinkError::NoSpace {
                name: entry.name.clone(),
            })?;

        entry.load_base = start;
        entry.load_bias = start;
    }

    // Global symbol map: every export becomes (name) -> absolute address.
    let mut globals: HashMap<String, usize> = HashMap::new();

    for entry in &entries {
        for export in entry.section.exports()? {
            let name = entry.section.string_by_id(export.string_id)?;

            // An export must name a symbol of its own section.
            if entry.section.symbol_reladdr(export.string_id)?.is_none() {
                return Err(LinkError::UnresolvedSymbol { symbol: name });
            }

            let absolute = entry.load_bias + export.offset as usize;
            if globals.insert(name.clone(), absolute).is_some() {
                return Err(LinkError::DuplicateExport { symbol: name });
            }
        }
    }

    // Lay the code down, then patch every link point.
    let mut output = vec![0u8; MEMORY_SIZE];
    let mut image_end = 0;

    for entry in &entries {
        if entry.code_size == 0 {
            continue;
        }

        let code = entry.section.code()?;
        output[entry.load_base..entry.load_base + code.len()].copy_from_slice(code);
        image_end = usize::max(image_end, entry.load_base + code.len());
    }

    for entry in &entries {
        for link in entry.section.links()? {
            let symbol = entry.section.string_by_id(link.string_id)?;

            let target = match entry.section.symbol_reladdr(link.string_id)? {
                Some(reladdr) => entry.load_bias + reladdr as usize,
                None => *globals
                    .get(&symbol)
                    .ok_or(LinkError::UnresolvedSymbol { symbol })?,
            };

            let location = entry.load_bias + link.addr as usize;
            let [low, high] = (target as u16).to_le_bytes();
            output[location] = low;
            output[location + 1] = high;
        }
    }

    output.truncate(image_end);
    Ok(output)
}

/// Convenience wrapper for callers holding raw object files.
pub fn link_buffers(inputs: &[(String, Vec<u8>)]) -> Result<Vec<u8>, LinkError> {
    let mut objects = Vec::new();
    for (path, data) in inputs {
        objects.push(Object::parse(data, path)?);
    }

    link_objects(&objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iof::writer::{ObjectBuilder, SectionBuilder};

    fn object_bytes(section: SectionBuilder) -> Vec<u8> {
        let mut builder = ObjectBuilder::new();
        builder.add_section(section);
        builder.build()
    }

    #[test]
    fn test_single_section_lands_at_zero() {
        let mut section = SectionBuilder::new();
        section.set_name("a.s");
        section.set_code(vec![1, 2, 3, 4]);

        let bytes = object_bytes(section);
        let image = link_buffers(&[("a.iof".to_string(), bytes)]).unwrap();
        assert_eq!(image, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_static_origin_placement() {
        let mut code = vec![0u8; 0x20];
        code.extend_from_slice(&[0xaa, 0xbb]);

        let mut section = SectionBuilder::new();
        section.set_name("fixed.s");
        section.set_code(code);
        section.set_origin(0x20);

        let bytes = object_bytes(section);
        let image = link_buffers(&[("fixed.iof".to_string(), bytes)]).unwrap();

        assert_eq!(image.len(), 0x22);
        assert_eq!(&image[0x20..], &[0xaa, 0xbb]);
    }

    #[test]
    fn test_internal_link_resolved_against_own_symbols() {
        // jmp-like slot at offset 1..3 referencing a local symbol at 8.
        let mut section = SectionBuilder::new();
        section.set_name("self.s");
        section.set_code(vec![0x30, 0, 0, 0, 0, 0, 0, 0, 0x19, 0, 0, 0]);
        section.add_symbol("target", 8);
        section.add_link("target", 1);

        let bytes = object_bytes(section);
        let image = link_buffers(&[("self.iof".to_string(), bytes)]).unwrap();
        assert_eq!(image[1], 0x08);
        assert_eq!(image[2], 0x00);
    }

    #[test]
    fn test_cross_object_link() {
        // Object A exports main at its offset 4. Object B references it.
        let mut a = SectionBuilder::new();
        a.set_name("a.s");
        a.set_code(vec![0; 8]);
        a.add_symbol("main", 4);
        a.add_export("main", 4);

        let mut b = SectionBuilder::new();
        b.set_name("b.s");
        b.set_code(vec![0x33, 0, 0, 0]);
        b.add_link("main", 1);

        let image = link_buffers(&[
            ("a.iof".to_string(), object_bytes(a)),
            ("b.iof".to_string(), object_bytes(b)),
        ])
        .unwrap();

        // a.s placed at 0, b.s appended at 8; main resolves to 4.
        assert_eq!(image.len(), 12);
        assert_eq!(image[8], 0x33);
        assert_eq!(image[9], 0x04);
        assert_eq!(image[10], 0x00);
    }

    #[test]
    fn test_unresolved_symbol_is_fatal() {
        let mut section = SectionBuilder::new();
        section.set_name("broken.s");
        section.set_code(vec![0x30, 0, 0, 0]);
        section.add_link("missing", 1);

        let result = link_buffers(&[("broken.iof".to_string(), object_bytes(section))]);
        assert_eq!(
            result,
            Err(LinkError::UnresolvedSymbol {
                symbol: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_export_is_fatal() {
        let mut a = SectionBuilder::new();
        a.set_name("a.s");
        a.set_code(vec![0; 4]);
        a.add_symbol("main", 0);
        a.add_export("main", 0);

        let mut b = SectionBuilder::new();
        b.set_name("b.s");
        b.set_code(vec![0; 4]);
        b.add_symbol("main", 0);
        b.add_export("main", 0);

        let result = link_buffers(&[
            ("a.iof".to_string(), object_bytes(a)),
            ("b.iof".to_string(), object_bytes(b)),
        ]);

        assert_eq!(
            result,
            Err(LinkError::DuplicateExport {
                symbol: "main".to_string()
            })
        );
    }

    #[test]
    fn test_appended_section_avoids_static_one() {
        // A static section occupies [0, 8); the appended one must follow.
        let mut fixed = SectionBuilder::new();
        fixed.set_name("fixed.s");
        fixed.set_code(vec![0xee; 8]);
        fixed.set_origin(0);

        let mut float = SectionBuilder::new();
        float.set_name("float.s");
        float.set_code(vec![0x11; 4]);

        let image = link_buffers(&[
            ("fixed.iof".to_string(), object_bytes(fixed)),
            ("float.iof".to_string(), object_bytes(float)),
        ])
        .unwrap();

        assert_eq!(&image[0..8], &[0xee; 8]);
        assert_eq!(&image[8..12], &[0x11; 4]);
    }

    #[test]
    fn test_overlapping_static_sections_rejected() {
        let mut a = SectionBuilder::new();
        a.set_name("a.s");
        a.set_code(vec![0; 8]);
        a.set_origin(0);

        let mut b = SectionBuilder::new();
        b.set_name("b.s");
        b.set_code(vec![0; 8]);
        b.set_origin(4);

        let result = link_buffers(&[
            ("a.iof".to_string(), object_bytes(a)),
            ("b.iof".to_string(), object_bytes(b)),
        ]);

        assert_eq!(
            result,
            Err(LinkError::Overlap {
                name: "b.s".to_string()
            })
        );
    }
}
