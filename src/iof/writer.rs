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

use super::*;
use crate::bytebuffer::ByteBuffer;

/// Builds one IOF section: code blob plus its symbol, link, export and
/// string tables. Strings are deduplicated; the same byte-string always maps
/// to the same 16-bit id within the section.
#[derive(Debug, Default)]
pub struct SectionBuilder {
    name: String,
    code: Vec<u8>,
    flags: u16,
    origin: u16,
    origin_set: bool,
    symbols: Vec<(u16, u16)>,
    links: Vec<(u16, u16)>,
    exports: Vec<(u16, u16)>,
    strings: Vec<String>,
}

impl SectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn set_code(&mut self, code: Vec<u8>) {
        self.code = code;
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }

    pub fn set_origin(&mut self, origin: u16) {
        self.flags |= SFLAG_STATIC_ORIGIN;
        self.origin = origin;
        self.origin_set = true;
    }

    pub fn add_symbol(&mut self, name: &str, addr: u16) {
        let id = self.string_id(name);
        self.symbols.push((id, addr));
    }

    pub fn add_link(&mut self, to: &str, addr: u16) {
        let id = self.string_id(to);
        self.links.push((id, addr));
    }

    pub fn add_export(&mut self, label: &str, offset: u16) {
        let id = self.string_id(label);
        self.exports.push((id, offset));
    }

    fn string_id(&mut self, value: &str) -> u16 {
        for (id, string) in self.strings.iter().enumerate() {
            if string == value {
                return id as u16;
            }
        }

        self.strings.push(value.to_string());
        (self.strings.len() - 1) as u16
    }

    /// Serializes the section with all internal addresses section-relative.
    pub fn build(&self) -> Vec<u8> {
        let mut res = ByteBuffer::new();
        let mut header = SectionHeader {
            flags: self.flags,
            origin: self.origin,
            ..Default::default()
        };

        res.insert_fill(0, 0, SECTION_HEADER_SIZE);

        // Remove unnecessary padding before the first origin, if any.
        let code = if self.origin_set {
            let start = usize::min(self.origin as usize, self.code.len());
            &self.code[start..]
        } else {
            &self.code[..]
        };

        header.code_addr = res.len() as u16;
        header.code_size = code.len() as u16;
        res.append_range(code);

        // Insert symbols.
        header.symbols_addr = res.len() as u16;
        header.symbols_count = self.symbols.len() as u16;
        for &(string_id, addr) in &self.symbols {
            res.append_range(&Symbol { string_id, addr }.encode());
        }

        // Insert link points.
        header.links_addr = res.len() as u16;
        header.links_count = self.links.len() as u16;
        for &(string_id, addr) in &self.links {
            res.append_range(&Link { string_id, addr }.encode());
        }

        // Insert export points.
        header.exports_addr = res.len() as u16;
        header.exports_count = self.exports.len() as u16;
        for &(string_id, offset) in &self.exports {
            res.append_range(&Export { string_id, offset }.encode());
        }

        // Insert name.
        header.sname_addr = res.len() as u16;
        header.sname_size = self.name.len() as u16;
        res.append_range(self.name.as_bytes());
        res.append(0);

        // Insert strings: the entry table first, each entry patched once its
        // string bytes land at the end of the buffer.
        header.strings_addr = res.len() as u16;
        header.strings_count = self.strings.len() as u16;
        res.insert_fill(0, header.strings_addr as usize, RECORD_SIZE * self.strings.len());

        for (i, string) in self.strings.iter().enumerate() {
            let entry = StringEntry {
                id: i as u16,
                addr: res.len() as u16,
            };

            res.insert_range(
                &entry.encode(),
                header.strings_addr as usize + RECORD_SIZE * i,
            );
            res.append_range(string.as_bytes());
            res.append(0);
        }

        // Write the header back.
        res.insert_range(&header.encode(), 0);

        res.into_vec()
    }
}

/// Builds a whole IOF object: header, section-pointer array, then the
/// sections in registration order.
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    sections: Vec<SectionBuilder>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_section(&mut self, section: SectionBuilder) -> &mut Self {
        self.sections.push(section);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        let header = Header {
            format: FORMAT,
            addrwidth: ADDR_WIDTH,
            section_count: self.sections.len() as u16,
            section_addr: HEADER_SIZE as u16,
            endianness: ENDIANNESS_LITTLE,
        };

        buf.append_range(&header.encode());

        // The section-pointer array follows the header.
        let pointer_array = buf.len();
        buf.insert_fill(0, pointer_array, POINTER_SIZE * self.sections.len());

        for (i, section) in self.sections.iter().enumerate() {
            let addr = buf.len() as u16;
            buf.insert_range(&addr.to_le_bytes(), pointer_array + POINTER_SIZE * i);
            buf.append_range(&section.build());
        }

        buf.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_deduplication() {
        let mut section = SectionBuilder::new();
        section.add_symbol("main", 0);
        section.add_export("main", 0);
        section.add_link("puts", 8);
        section.add_link("puts", 16);

        assert_eq!(section.strings.len(), 2);
        assert_eq!(section.symbols[0].0, section.exports[0].0);
        assert_eq!(section.links[0].0, section.links[1].0);
    }

    #[test]
    fn test_section_layout_order() {
        let mut section = SectionBuilder::new();
        section.set_name("test.s");
        section.set_code(vec![0xaa; 8]);
        section.add_symbol("main", 0);

        let bytes = section.build();
        let header = SectionHeader::decode(&bytes, 0).unwrap();

        assert_eq!(header.code_addr as usize, SECTION_HEADER_SIZE);
        assert_eq!(header.code_size, 8);
        assert_eq!(header.symbols_addr, header.code_addr + 8);
        assert_eq!(header.symbols_count, 1);
        assert!(header.sname_addr > header.symbols_addr);
        assert!(header.strings_addr > header.sname_addr);
    }

    #[test]
    fn test_origin_strips_leading_gap() {
        let mut code = vec![0u8; 0x20];
        code.extend_from_slice(&[1, 2, 3, 4]);

        let mut section = SectionBuilder::new();
        section.set_code(code);
        section.set_origin(0x20);

        let bytes = section.build();
        let header = SectionHeader::decode(&bytes, 0).unwrap();

        assert!(header.has_static_origin());
        assert_eq!(header.origin, 0x20);
        assert_eq!(header.code_size, 4);

        let code_start = header.code_addr as usize;
        assert_eq!(&bytes[code_start..code_start + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_object_pointer_array() {
        let mut first = SectionBuilder::new();
        first.set_name("a");
        let mut second = SectionBuilder::new();
        second.set_name("b");

        let mut builder = ObjectBuilder::new();
        builder.add_section(first);
        builder.add_section(second);
        let bytes = builder.build();

        let header = Header::decode(&bytes, "mem").unwrap();
        assert_eq!(header.section_count, 2);
        assert_eq!(header.section_addr as usize, HEADER_SIZE);

        let first_ptr = u16::from_le_bytes([bytes[16], bytes[17]]) as usize;
        let second_ptr = u16::from_le_bytes([bytes[18], bytes[19]]) as usize;
        assert_eq!(first_ptr, HEADER_SIZE + 2 * POINTER_SIZE);
        assert!(second_ptr > first_ptr);

        // Both pointers land on valid section headers.
        assert!(SectionHeader::decode(&bytes, first_ptr).is_ok());
        assert!(SectionHeader::decode(&bytes, second_ptr).is_ok());
    }
}
