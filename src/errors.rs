use std::fmt;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A source-anchored diagnostic, rendered as a caret-underlined snippet:
///
/// ```text
/// irid-as: error in loop.s
///      |
///    4 |     jmp @done
///      |         ^ local label needs a regular label before it
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub snippet: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };

        let snippet = self.snippet.replace('\t', " ");

        writeln!(f, "irid-as: {} in {}", kind, self.file)?;
        writeln!(f, "     |")?;
        writeln!(f, "{:>4} | {}", self.line, snippet)?;
        write!(f, "     | ")?;
        for _ in 0..self.column {
            write!(f, " ")?;
        }
        write!(f, "^ {}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("Syntax Error: {0}")]
    Parse(#[from] Box<pest::error::Error<crate::parser::Rule>>),

    #[error("{0}")]
    Source(#[from] Diagnostic),
}

/// Togglable assembler warnings. `OriginOverlap` is the one exposed on the
/// command line as `-W origin-overlap`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WarningKind {
    OriginOverlap,
    Truncation,
}

pub const WARNING_KIND_COUNT: usize = 2;

#[derive(Error, Debug, PartialEq)]
pub enum LinkError {
    #[error("invalid magic bytes in {path}")]
    BadMagic { path: String },

    #[error("unsupported object format {found}, linker implements {expected}")]
    UnsupportedFormat { found: u8, expected: u8 },

    #[error("object file is truncated: {reason}")]
    Truncated { reason: String },

    #[error("no string with id {strid} in section string table")]
    MissingString { strid: u16 },

    #[error("symbol `{symbol}` is exported by more than one object")]
    DuplicateExport { symbol: String },

    #[error("cannot resolve symbol `{symbol}`")]
    UnresolvedSymbol { symbol: String },

    #[error("section `{name}` does not fit in the address space")]
    NoSpace { name: String },

    #[error("section `{name}` overlaps an already placed section")]
    Overlap { name: String },
}

/// CPU fault IDs. Each fault has a corresponding 8-bit number which doubles
/// as the emulator exit code.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("segmentation fault")]
    Seg,
    #[error("IO fault")]
    Io,
    #[error("stack corruption")]
    Stack,
    #[error("invalid register")]
    Reg,
    #[error("illegal instruction")]
    Ins,
    #[error("forced fault")]
    User,
    #[error("invalid CPU call")]
    Cpucall,
}

impl Fault {
    pub fn code(self) -> u8 {
        match self {
            Fault::Seg => 1,
            Fault::Io => 2,
            Fault::Stack => 3,
            Fault::Reg => 4,
            Fault::Ins => 5,
            Fault::User => 6,
            Fault::Cpucall => 7,
        }
    }
}

/// A poweroff or restart request is not a fault; it unwinds to the driver
/// loop through its own control path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Request {
    Poweroff,
    Restart,
}

/// Non-local exit from the instruction decoder, unwound to `Cpu::start`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exit {
    Fault(Fault),
    Request(Request),
}

impl From<Fault> for Exit {
    fn from(fault: Fault) -> Self {
        Exit::Fault(fault)
    }
}
