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

use anyhow::{Context, Result, bail};
use clap::Parser as clap_parser;
use iridtools::assembler::Assembler;
use iridtools::errors::WarningKind;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

/// Assembler for the Irid architecture.
#[derive(clap_parser)]
#[clap(version = "0.2.0", author = "bellrise", name = "irid-as")]
struct Opts {
    /// Input source file, or `-` for stdin.
    input: String,

    /// Output file path.
    #[clap(short, long, default_value = "out.iof")]
    output: PathBuf,

    /// Emit a raw flat binary instead of an IOF object.
    #[clap(short, long)]
    raw: bool,

    /// Toggle a warning, e.g. `-W origin-overlap` or `-W no-origin-overlap`.
    #[clap(short = 'W', value_name = "WARNING")]
    warnings: Vec<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let opts = Opts::parse();
    let source = read_input(&opts.input)?;

    let mut assembler = Assembler::new(&opts.input, &source);
    for warning in &opts.warnings {
        let (kind, enabled) = parse_warning(warning)?;
        assembler.set_warning(kind, enabled);
    }

    assembler.assemble().map_err(anyhow::Error::new)?;

    let result = if opts.raw {
        assembler.as_raw_binary()
    } else {
        assembler.as_object()
    }
    .map_err(anyhow::Error::new)?;

    fs::write(&opts.output, result)
        .with_context(|| format!("failed to write output file {}", opts.output.display()))?;

    Ok(())
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read from stdin")?;
        return Ok(content);
    }

    fs::read_to_string(path).with_context(|| format!("source file `{}` could not be opened", path))
}

fn parse_warning(name: &str) -> Result<(WarningKind, bool)> {
    let (enabled, name) = match name.strip_prefix("no-") {
        Some(rest) => (false, rest),
        None => (true, name),
    };

    match name {
        "origin-overlap" => Ok((WarningKind::OriginOverlap, enabled)),
        _ => bail!("unknown warning `{}`", name),
    }
}
