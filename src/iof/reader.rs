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
use crate::errors::LinkError;

/// A parsed view over an IOF object. The underlying bytes are borrowed; all
/// internal pointers stay 16-bit offsets into the buffer.
#[derive(Debug)]
pub struct Object<'a> {
    pub header: Header,
    pub sections: Vec<Section<'a>>,
    pub source_path: String,
}

impl<'a> Object<'a> {
    pub fn parse(data: &'a [u8], path: &str) -> Result<Self, LinkError> {
        let header = Header::decode(data, path)?;
        let mut sections = Vec::new();

        for i in 0..header.section_count as usize {
            let pointer = read_u16(data, header.section_addr as usize + POINTER_SIZE * i)?;
            sections.push(Section::parse(data, pointer as usize)?);
        }

        Ok(Self {
            header,
            sections,
            source_path: path.to_string(),
        })
    }
}

/// One section of a parsed object. `base` is the section's offset in the
/// file; every address in the section header is relative to it.
#[derive(Debug)]
pub struct Section<'a> {
    data: &'a [u8],
    pub base: usize,
    pub header: SectionHeader,
}

impl<'a> Section<'a> {
    fn parse(data: &'a [u8], base: usize) -> Result<Self, LinkError> {
        let header = SectionHeader::decode(data, base)?;
        let section = Self { data, base, header };

        // Fail early on truncated sub-tables instead of on first access.
        section.code()?;
        section.symbols()?;
        section.links()?;
        section.exports()?;
        section.strings()?;

        Ok(section)
    }

    pub fn code(&self) -> Result<&'a [u8], LinkError> {
        let start = self.base + self.header.code_addr as usize;
        let end = start + self.header.code_size as usize;

        if end > self.data.len() {
            return Err(LinkError::Truncated {
                reason: format!("section code [{:#06x}..{:#06x}] is out of bounds", start, end),
            });
        }

        Ok(&self.data[start..end])
    }

    pub fn symbols(&self) -> Result<Vec<Symbol>, LinkError> {
        let base = self.base + self.header.symbols_addr as usize;
        (0..self.header.symbols_count as usize)
            .map(|i| Symbol::decode(self.data, base + RECORD_SIZE * i))
            .collect()
    }

    pub fn links(&self) -> Result<Vec<Link>, LinkError> {
        let base = self.base + self.header.links_addr as usize;
        (0..self.header.links_count as usize)
            .map(|i| Link::decode(self.data, base + RECORD_SIZE * i))
            .collect()
    }

    pub fn exports(&self) -> Result<Vec<Export>, LinkError> {
        let base = self.base + self.header.exports_addr as usize;
        (0..self.header.exports_count as usize)
            .map(|i| Export::decode(self.data, base + RECORD_SIZE * i))
            .collect()
    }

    pub fn strings(&self) -> Result<Vec<StringEntry>, LinkError> {
        let base = self.base + self.header.strings_addr as usize;
        (0..self.header.strings_count as usize)
            .map(|i| StringEntry::decode(self.data, base + RECORD_SIZE * i))
            .collect()
    }

    /// Resolves a string id through the section string table.
    pub fn string_by_id(&self, strid: u16) -> Result<String, LinkError> {
        for entry in self.strings()? {
            if entry.id == strid {
                return self.read_nul_terminated(self.base + entry.addr as usize);
            }
        }

        Err(LinkError::MissingString { strid })
    }

    pub fn name(&self) -> Result<String, LinkError> {
        self.read_nul_terminated(self.base + self.header.sname_addr as usize)
    }

    /// Section-relative address of the symbol with the given string id.
    pub fn symbol_reladdr(&self, strid: u16) -> Result<Option<u16>, LinkError> {
        for symbol in self.symbols()? {
            if symbol.string_id == strid {
                return Ok(Some(symbol.addr));
            }
        }

        Ok(None)
    }

    pub fn is_exported(&self, strid: u16) -> Result<bool, LinkError> {
        Ok(self.exports()?.iter().any(|e| e.string_id == strid))
    }

    fn read_nul_terminated(&self, start: usize) -> Result<String, LinkError> {
        if start >= self.data.len() {
            return Err(LinkError::Truncated {
                reason: format!("string at {:#06x} is out of bounds", start),
            });
        }

        let bytes: Vec<u8> = self.data[start..]
            .iter()
            .take_while(|&&b| b != 0)
            .copied()
            .collect();

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iof::writer::{ObjectBuilder, SectionBuilder};

    fn sample_object() -> Vec<u8> {
        let mut section = SectionBuilder::new();
        section.set_name("sample.s");
        section.set_code(vec![0x14, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00]);
        section.add_symbol("main", 0);
        section.add_symbol("main@loop", 4);
        section.add_link("puts", 2);
        section.add_export("main", 0);

        let mut builder = ObjectBuilder::new();
        builder.add_section(section);
        builder.build()
    }

    #[test]
    fn test_parse_round_trip() {
        let bytes = sample_object();
        let object = Object::parse(&bytes, "sample.iof").unwrap();

        assert_eq!(object.header.section_count, 1);
        assert_eq!(object.sections.len(), 1);

        let section = &object.sections[0];
        assert_eq!(section.name().unwrap(), "sample.s");
        assert_eq!(
            section.code().unwrap(),
            &[0x14, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00]
        );

        let symbols = section.symbols().unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(section.string_by_id(symbols[0].string_id).unwrap(), "main");
        assert_eq!(
            section.string_by_id(symbols[1].string_id).unwrap(),
            "main@loop"
        );

        let links = section.links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(section.string_by_id(links[0].string_id).unwrap(), "puts");
        assert_eq!(links[0].addr, 2);

        let exports = section.exports().unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(section.symbol_reladdr(exports[0].string_id).unwrap(), Some(0));
        assert!(section.is_exported(exports[0].string_id).unwrap());
    }

    #[test]
    fn test_reserialize_is_byte_identical() {
        // Write -> parse -> rebuild with the same registration order.
        let bytes = sample_object();
        let object = Object::parse(&bytes, "sample.iof").unwrap();
        let section = &object.sections[0];

        let mut rebuilt = SectionBuilder::new();
        rebuilt.set_name(&section.name().unwrap());
        rebuilt.set_code(section.code().unwrap().to_vec());
        for symbol in section.symbols().unwrap() {
            rebuilt.add_symbol(&section.string_by_id(symbol.string_id).unwrap(), symbol.addr);
        }
        for link in section.links().unwrap() {
            rebuilt.add_link(&section.string_by_id(link.string_id).unwrap(), link.addr);
        }
        for export in section.exports().unwrap() {
            rebuilt.add_export(
                &section.string_by_id(export.string_id).unwrap(),
                export.offset,
            );
        }

        let mut builder = ObjectBuilder::new();
        builder.add_section(rebuilt);
        assert_eq!(builder.build(), bytes);
    }

    #[test]
    fn test_missing_string_id() {
        let bytes = sample_object();
        let object = Object::parse(&bytes, "sample.iof").unwrap();
        assert_eq!(
            object.sections[0].string_by_id(99),
            Err(LinkError::MissingString { strid: 99 })
        );
    }

    #[test]
    fn test_truncated_object_rejected() {
        let bytes = sample_object();
        assert!(Object::parse(&bytes[..20], "cut.iof").is_err());
    }
}
