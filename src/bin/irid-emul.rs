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
use iridtools::emul::console::console_create;
use iridtools::emul::cpu::Cpu;
use iridtools::emul::memory::Memory;
use iridtools::emul::serial::serial_create;
use iridtools::emul::{ImageArgument, SerialArgument, Settings, load_image};
use std::fs;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

/// Emulator for the Irid architecture. Loads the given images into memory
/// and starts execution from 0x0000.
#[derive(clap_parser)]
#[clap(version = "0.2.0", author = "bellrise", name = "irid-emul")]
struct Opts {
    /// Images to load, each as `path[:hex-offset]`.
    #[clap(required = true)]
    images: Vec<String>,

    /// Target instructions per second (e.g. 1k, 2m).
    #[clap(short, long, default_value = "10000")]
    ips: String,

    /// Show performance results on exit.
    #[clap(short, long)]
    perf: bool,

    /// Create a serial device: `-s name=NAME,file=FILE`.
    #[clap(short, long)]
    serial: Vec<String>,
}

/// Keeps the terminal out of canonical mode for the duration of the run and
/// restores the original state on every exit path.
struct RawTerminal {
    original: libc::termios,
}

impl RawTerminal {
    fn enable() -> Option<Self> {
        unsafe {
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut term) != 0 {
                return None;
            }

            let original = term;
            term.c_lflag &= !(libc::ICANON | libc::ECHO);
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &term);
            Some(Self { original })
        }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    let settings = match build_settings(&opts) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("irid-emul: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("irid-emul: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn build_settings(opts: &Opts) -> Result<Settings> {
    let mut settings = Settings {
        target_ips: parse_ips(&opts.ips)?,
        show_perf_results: opts.perf,
        ..Default::default()
    };

    for image in &opts.images {
        settings.images.push(parse_image_argument(image)?);
    }

    for serial in &opts.serial {
        settings.serials.push(parse_serial_argument(serial)?);
    }

    Ok(settings)
}

fn run(settings: &Settings) -> Result<()> {
    let mut ram = Memory::new();

    for image in &settings.images {
        let data = fs::read(&image.path)
            .with_context(|| format!("cannot access {}", image.path))?;
        load_image(&mut ram, &data, image.offset)
            .map_err(|_| anyhow::anyhow!("image {} does not fit in memory", image.path))?;
    }

    let mut cpu = Cpu::new(ram);
    cpu.set_target_ips(settings.target_ips);

    cpu.add_device(console_create(libc::STDIN_FILENO, libc::STDOUT_FILENO))
        .map_err(|_| anyhow::anyhow!("duplicate device id"))?;

    let mut serial_id = 0x100;
    for serial in &settings.serials {
        cpu.add_device(serial_create(serial_id, &serial.name, &serial.file)?)
            .map_err(|_| anyhow::anyhow!("duplicate device id"))?;
        serial_id += 1;
    }

    let raw_terminal = RawTerminal::enable();

    // The first interrupt asks the CPU to power off at the next iteration
    // boundary; the second forces an exit.
    let stop = cpu.stop_flag();
    let saved_term = raw_terminal.as_ref().map(|t| t.original);
    ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::SeqCst) {
            eprintln!("\nForced exit.");
            std::process::exit(1);
        }

        if let Some(term) = saved_term {
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &term);
            }
        }
    })
    .context("failed to install the interrupt handler")?;

    let result = cpu.start();

    if settings.show_perf_results {
        cpu.print_perf();
    }

    cpu.remove_devices();
    drop(raw_terminal);

    match result {
        Ok(()) => Ok(()),
        Err(fault) => bail!("CPU fault: {:x}", fault.code()),
    }
}

fn parse_ips(text: &str) -> Result<i64> {
    let (digits, base) = match text.chars().last() {
        Some('k') => (&text[..text.len() - 1], 1000),
        Some('m') => (&text[..text.len() - 1], 1_000_000),
        _ => (text, 1),
    };

    let value: i64 = digits
        .parse()
        .with_context(|| format!("invalid ips value `{}`", text))?;
    Ok(value * base)
}

fn parse_image_argument(text: &str) -> Result<ImageArgument> {
    let (path, offset) = match text.rsplit_once(':') {
        Some((path, offset)) => {
            let offset = u16::from_str_radix(offset, 16)
                .with_context(|| format!("invalid image offset in `{}`", text))?;
            (path, offset)
        }
        None => (text, 0),
    };

    Ok(ImageArgument {
        path: path.to_string(),
        offset,
    })
}

fn parse_serial_argument(text: &str) -> Result<SerialArgument> {
    let mut name = None;
    let mut file = None;

    for parameter in text.split(',') {
        match parameter.split_once('=') {
            Some(("name", value)) => name = Some(value.to_string()),
            Some(("file", value)) => file = Some(value.to_string()),
            _ => bail!("malformed parameter string: {}", text),
        }
    }

    match (name, file) {
        (Some(name), Some(file)) => Ok(SerialArgument { name, file }),
        _ => bail!("serial device needs both name= and file=: {}", text),
    }
}
