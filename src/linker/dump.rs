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

//! Non-linking introspection: dump the header or symbol table of an object
//! in human-readable or portable (line-per-field) form. These modes never
//! touch the output image.

use crate::errors::LinkError;
use crate::iof::MAGIC;
use crate::iof::reader::{Object, Section};

pub fn dump_header(object: &Object) -> Result<(), LinkError> {
    println!("\nIOF header for {}:", object.source_path);
    println!(
        "  Magic:            {:x} {:x} {:x} {:x}",
        MAGIC[0], MAGIC[1], MAGIC[2], MAGIC[3]
    );
    println!("  Format:           {}", object.header.format);
    println!("  Address width:    {} bits", object.header.addrwidth as u32 * 8);
    println!("  Section count:    {}", object.header.section_count);
    println!("  Section addr:     0x{:04x}", object.header.section_addr);
    println!(
        "  Endianness:       {} ({})",
        object.header.endianness,
        if object.header.endianness == 0 {
            "little-endian"
        } else {
            "?"
        }
    );

    for (index, section) in object.sections.iter().enumerate() {
        dump_section_header(section, index)?;
    }

    Ok(())
}

fn dump_section_header(section: &Section, index: usize) -> Result<(), LinkError> {
    let header = &section.header;

    println!("\nSection {}:", index);
    println!("  Base address:     0x{:04x}", section.base);
    println!("  Name address:     0x{:04x}", header.sname_addr);
    println!("  Name size:        {}", header.sname_size);
    println!("  Name:             '{}'", section.name()?);
    println!("  Flags:            {}", header.flags);
    println!("  Origin:           0x{:04x}", header.origin);
    println!(
        "  Code address:     0x{:04x} (=0x{:04x})",
        header.code_addr,
        header.code_addr as usize + section.base
    );
    println!(
        "  Code size:        {} ({:.2} kB)",
        header.code_size,
        header.code_size as f32 / 1024.0
    );
    println!(
        "  Symbol address:   0x{:04x} (=0x{:04x})",
        header.symbols_addr,
        header.symbols_addr as usize + section.base
    );
    println!("  Symbol count:     {}", header.symbols_count);
    println!(
        "  Links address:    0x{:04x} (=0x{:04x})",
        header.links_addr,
        header.links_addr as usize + section.base
    );
    println!("  Links count:      {}", header.links_count);
    println!(
        "  Exports address:  0x{:04x} (=0x{:04x})",
        header.exports_addr,
        header.exports_addr as usize + section.base
    );
    println!("  Exports count:    {}", header.exports_count);
    println!(
        "  Strings address:  0x{:04x} (=0x{:04x})",
        header.strings_addr,
        header.strings_addr as usize + section.base
    );
    println!("  Strings count:    {}", header.strings_count);

    Ok(())
}

pub fn dump_header_portable(object: &Object) -> Result<(), LinkError> {
    println!(
        "magic: {:x} {:x} {:x} {:x}",
        MAGIC[0], MAGIC[1], MAGIC[2], MAGIC[3]
    );
    println!("format: {}", object.header.format);
    println!("addr_width_bits: {}", object.header.addrwidth as u32 * 8);
    println!("section_count: {}", object.header.section_count);
    println!("section_addr: {}", object.header.section_addr);
    println!(
        "endianness: {}",
        if object.header.endianness == 0 {
            "little-endian"
        } else {
            "?"
        }
    );

    for (index, section) in object.sections.iter().enumerate() {
        let header = &section.header;
        println!("SECTION: {}", index);
        println!("base_addr: {}", section.base);
        println!("name_addr: {}", header.sname_addr);
        println!("name_size: {}", header.sname_size);
        println!("name: {}", section.name()?);
        println!("flags: {}", header.flags);
        println!("origin: {}", header.origin);
        println!("code_addr: {}", header.code_addr);
        println!("code_size: {}", header.code_size);
        println!("symbols_addr: {}", header.symbols_addr);
        println!("symbols_count: {}", header.symbols_count);
        println!("links_addr: {}", header.links_addr);
        println!("links_count: {}", header.links_count);
        println!("exports_addr: {}", header.exports_addr);
        println!("exports_count: {}", header.exports_count);
        println!("strings_addr: {}", header.strings_addr);
        println!("strings_count: {}", header.strings_count);
    }

    Ok(())
}

pub fn dump_symbols(object: &Object, only_exports: bool) -> Result<(), LinkError> {
    println!("Symbols for {}:", object.source_path);
    println!("  ADDR        SECT  TYPE    SYMBOL");

    for section in &object.sections {
        let name = section.name()?;

        for symbol in section.symbols()? {
            let is_exported = section.is_exported(symbol.string_id)?;
            if only_exports && !is_exported {
                continue;
            }

            println!(
                "  0x{:04x}  {:>8}  {}  {}",
                symbol.addr,
                name,
                if is_exported { "EXPORT" } else { "LOCAL " },
                section.string_by_id(symbol.string_id)?
            );
        }
    }

    Ok(())
}

pub fn dump_symbols_portable(object: &Object, only_exports: bool) -> Result<(), LinkError> {
    for section in &object.sections {
        let name = section.name()?;

        for symbol in section.symbols()? {
            let is_exported = section.is_exported(symbol.string_id)?;
            if only_exports && !is_exported {
                continue;
            }

            println!(
                "{} {} {} {}",
                symbol.addr,
                name,
                if is_exported { 'X' } else { 'L' },
                section.string_by_id(symbol.string_id)?
            );
        }
    }

    Ok(())
}
