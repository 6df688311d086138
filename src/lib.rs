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

//! Toolchain for the Irid 16-bit architecture: assembler, IOF linker and
//! emulator, shared by the `irid-as`, `irid-ld` and `irid-emul` binaries.

pub mod arch;
pub mod assembler;
pub mod ast;
pub mod bytebuffer;
pub mod emul;
pub mod errors;
pub mod iof;
pub mod linker;
pub mod parser;

use assembler::Assembler;
use errors::AssemblyError;

extern crate pest;
extern crate pest_derive;

/// Assembles a source file into a relocatable IOF object.
pub fn assemble_object(inputname: &str, source: &str) -> Result<Vec<u8>, AssemblyError> {
    let mut assembler = Assembler::new(inputname, source);
    assembler.assemble()?;
    assembler.as_object()
}

/// Assembles a source file into a raw flat binary with all link points
/// resolved in place.
pub fn assemble_raw(inputname: &str, source: &str) -> Result<Vec<u8>, AssemblyError> {
    let mut assembler = Assembler::new(inputname, source);
    assembler.assemble()?;
    assembler.as_raw_binary()
}
