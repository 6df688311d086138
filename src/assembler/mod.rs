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

mod directives;
mod instructions;

use crate::ast::{AssemblyLine, Name};
use crate::bytebuffer::ByteBuffer;
use crate::errors::{
    AssemblyError, Diagnostic, Severity, WARNING_KIND_COUNT, WarningKind,
};
use crate::iof::writer::{ObjectBuilder, SectionBuilder};
use crate::parser;

/// A declared label: section-relative byte offset plus the line it was
/// declared on, kept for duplicate-declaration reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub offset: usize,
    pub declaration_line: usize,
}

/// A named constant registered with `.value`. Resolves like a label but
/// yields a literal instead of an address.
#[derive(Debug, Clone, PartialEq)]
struct NamedValue {
    name: String,
    value: i64,
}

/// An operand that named a symbol with no known value at emission time:
/// the symbol name and the code offset of the 16-bit slot to patch.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPoint {
    pub symbol: String,
    pub offset: usize,
    line: usize,
    column: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct ExportedName {
    name: String,
    line: usize,
    column: usize,
}

/// Public assembler API. Set up an assembler with a source and input name,
/// call `assemble()`, then retrieve the result with either `as_object()` or
/// `as_raw_binary()`.
pub struct Assembler {
    inputname: String,
    source: String,
    source_lines: Vec<String>,

    code: ByteBuffer,
    pos: usize,
    lowest_pos: usize,
    first_org: Option<u16>,

    labels: Vec<Label>,
    values: Vec<NamedValue>,
    exports: Vec<ExportedName>,
    link_points: Vec<LinkPoint>,
    last_label: String,

    warnings: [bool; WARNING_KIND_COUNT],
}

impl Assembler {
    pub fn new(inputname: &str, source: &str) -> Self {
        Self {
            inputname: inputname.to_string(),
            source: source.to_string(),
            source_lines: source.lines().map(str::to_string).collect(),
            code: ByteBuffer::new(),
            pos: 0,
            lowest_pos: usize::MAX,
            first_org: None,
            labels: Vec::new(),
            values: Vec::new(),
            exports: Vec::new(),
            link_points: Vec::new(),
            last_label: String::new(),
            warnings: [true; WARNING_KIND_COUNT],
        }
    }

    pub fn set_warning(&mut self, warning: WarningKind, enabled: bool) {
        self.warnings[warning as usize] = enabled;
    }

    pub fn assemble(&mut self) -> Result<(), AssemblyError> {
        let lines = parser::parse_source(&self.source)?;

        // There are 3 types of lines: labels, directives & instructions.
        for line in &lines {
            if let Some(label) = &line.label {
                self.declare_label(line, label)?;
            }

            if let Some(directive) = &line.directive {
                self.process_directive(line, directive)?;
            }

            if let Some(instruction) = &line.instruction {
                self.process_instruction(line, instruction)?;
            }
        }

        Ok(())
    }

    /// Retrieve a linkable object in the IOF format.
    pub fn as_object(&self) -> Result<Vec<u8>, AssemblyError> {
        let mut section = SectionBuilder::new();

        section.set_name(&self.inputname);
        section.set_code(self.code.as_slice().to_vec());

        // A leading `.org` pins the whole section; the writer strips the
        // gap below the origin.
        if let Some(origin) = self.first_org {
            if self.lowest_pos >= origin as usize {
                section.set_origin(origin);
            }
        }

        for label in &self.labels {
            section.add_symbol(&label.name, label.offset as u16);
        }

        for point in &self.link_points {
            section.add_link(&point.symbol, point.offset as u16);
        }

        for export in &self.exports {
            // We need to find the exported name in the label array.
            match self.find_label(&export.name) {
                Some(label) => section.add_export(&label.name, label.offset as u16),
                None => {
                    return Err(self.error(
                        export.line,
                        export.column,
                        "cannot find exported label",
                    ));
                }
            }
        }

        let mut builder = ObjectBuilder::new();
        builder.add_section(section);
        Ok(builder.build())
    }

    /// Retrieve a raw binary of the processed code, directly executable on
    /// the CPU. All link points are resolved in place.
    pub fn as_raw_binary(&self) -> Result<Vec<u8>, AssemblyError> {
        let mut code = self.code.clone();

        for point in &self.link_points {
            let label = self.find_label(&point.symbol).ok_or_else(|| {
                self.error(
                    point.line,
                    point.column,
                    format!("cannot find label `{}`", point.symbol),
                )
            })?;

            code.insert((label.offset % 256) as u8, point.offset);
            code.insert((label.offset >> 8) as u8, point.offset + 1);
        }

        Ok(code.into_vec())
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn link_points(&self) -> &[LinkPoint] {
        &self.link_points
    }

    // --- label handling ---

    fn declare_label(&mut self, line: &AssemblyLine, name: &Name) -> Result<(), AssemblyError> {
        let mut label_str = name.text.clone();
        let is_local = label_str.starts_with('@');

        if is_local {
            if self.last_label.is_empty() {
                return Err(self.error(
                    line.line_number,
                    name.column,
                    "regular label has to exist before local label",
                ));
            }

            label_str = format!("{}{}", self.last_label, label_str);
        }

        if let Some(existing) = self.find_label(&label_str) {
            return Err(self.error(
                line.line_number,
                name.column,
                format!(
                    "this label was already declared on line {}",
                    existing.declaration_line
                ),
            ));
        }

        if !is_local {
            self.last_label = label_str.clone();
        }

        self.labels.push(Label {
            name: label_str,
            offset: self.pos,
            declaration_line: line.line_number,
        });

        Ok(())
    }

    fn find_label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.name == name)
    }

    /// Resolves a symbol operand: a `.value` constant substitutes its
    /// literal, anything else becomes a link point encoded as 0.
    fn resolve_value_or_link(
        &mut self,
        line: &AssemblyLine,
        symbol: &str,
        code_offset: usize,
        column: usize,
    ) -> Result<u16, AssemblyError> {
        for value in &self.values {
            if value.name == symbol {
                return Ok(value.value as u16);
            }
        }

        let mut resolved = symbol.to_string();
        if resolved.starts_with('@') {
            if self.last_label.is_empty() {
                return Err(self.error(
                    line.line_number,
                    column,
                    "local label needs a regular label before it",
                ));
            }
            resolved = format!("{}{}", self.last_label, resolved);
        }

        self.link_points.push(LinkPoint {
            symbol: resolved,
            offset: code_offset,
            line: line.line_number,
            column,
        });

        Ok(0)
    }

    // --- emission ---

    /// All instructions are 4-byte aligned. Realigning the cursor forward
    /// shifts any label still pointing at the old cursor, so that a label
    /// declared right before an instruction lands on its first byte.
    fn align_cursor(&mut self) {
        if self.pos % 4 == 0 {
            return;
        }

        let align_offset = 4 - self.pos % 4;
        for label in &mut self.labels {
            if label.offset == self.pos {
                label.offset += align_offset;
            }
        }

        self.pos += align_offset;
    }

    /// Writes one zero-padded 4-byte instruction slot at the cursor. The
    /// cursor must already be aligned.
    fn emit_slot(&mut self, bytes: &[u8]) {
        let mut slot = [0u8; 4];
        slot[..bytes.len()].copy_from_slice(bytes);

        self.mark_emission();
        self.code.insert_range(&slot, self.pos);
        self.pos += 4;
    }

    fn mark_emission(&mut self) {
        if self.pos < self.lowest_pos {
            self.lowest_pos = self.pos;
        }
    }

    // --- diagnostics ---

    fn snippet(&self, line: usize) -> String {
        self.source_lines
            .get(line.saturating_sub(1))
            .cloned()
            .unwrap_or_default()
    }

    fn error(
        &self,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> AssemblyError {
        AssemblyError::Source(Diagnostic {
            file: self.inputname.clone(),
            line,
            column,
            snippet: self.snippet(line),
            message: message.into(),
            severity: Severity::Error,
        })
    }

    fn warn(&self, warning: WarningKind, line: usize, column: usize, message: &str) {
        if !self.warnings[warning as usize] {
            return;
        }

        let diag = Diagnostic {
            file: self.inputname.clone(),
            line,
            column,
            snippet: self.snippet(line),
            message: message.to_string(),
            severity: Severity::Warning,
        };

        eprintln!("{}\n", diag);
    }

    /// Integer literals anywhere in the source must stay inside the
    /// addressable range.
    fn check_int_range(
        &self,
        value: i64,
        line: &AssemblyLine,
        column: usize,
    ) -> Result<(), AssemblyError> {
        if value > crate::arch::MAX_ADDR as i64 {
            return Err(self.error(
                line.line_number,
                column,
                "value is above the addressable range",
            ));
        }

        if value < -0x8000 {
            return Err(self.error(line.line_number, column, "value is below the allowed range"));
        }

        Ok(())
    }
}
