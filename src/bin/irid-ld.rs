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

use anyhow::{Context, Result};
use clap::Parser as clap_parser;
use iridtools::iof::reader::Object;
use iridtools::linker::{dump, link_objects};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Linker for Irid IOF objects.
#[derive(clap_parser)]
#[clap(version = "0.2.0", author = "bellrise", name = "irid-ld")]
struct Opts {
    /// Input object files.
    #[clap(required = true)]
    inputs: Vec<PathBuf>,

    /// Output image path.
    #[clap(short, long, default_value = "out.bin")]
    output: PathBuf,

    /// Dump the symbol table of each object instead of linking.
    #[clap(short = 't', long = "symbols")]
    dump_symbols: bool,

    /// Dump the IOF header of each object instead of linking.
    #[clap(long = "header")]
    dump_header: bool,

    /// Use the portable line-per-field dump format.
    #[clap(long)]
    portable: bool,

    /// Only show exported symbols in the symbol dump.
    #[clap(long)]
    only_exported: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("irid-ld: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let opts = Opts::parse();

    let mut buffers = Vec::new();
    for input in &opts.inputs {
        let data = fs::read(input)
            .with_context(|| format!("failed to open file: '{}'", input.display()))?;
        buffers.push((input.display().to_string(), data));
    }

    let mut objects = Vec::new();
    for (path, data) in &buffers {
        objects.push(Object::parse(data, path)?);
    }

    if opts.dump_symbols {
        for object in &objects {
            if opts.portable {
                dump::dump_symbols_portable(object, opts.only_exported)?;
            } else {
                dump::dump_symbols(object, opts.only_exported)?;
            }
        }
        return Ok(());
    }

    if opts.dump_header {
        for object in &objects {
            if opts.portable {
                dump::dump_header_portable(object)?;
            } else {
                dump::dump_header(object)?;
            }
        }
        return Ok(());
    }

    let image = link_objects(&objects)?;
    fs::write(&opts.output, image)
        .with_context(|| format!("failed to open output file {}", opts.output.display()))?;

    Ok(())
}
