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

pub mod console;
pub mod cpu;
pub mod device;
pub mod memory;
pub mod serial;

use crate::errors::Fault;
use memory::Memory;

/// An image file to load into the bank before the CPU starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArgument {
    pub path: String,
    pub offset: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerialArgument {
    pub name: String,
    pub file: String,
}

/// Emulator settings record, filled in by the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub target_ips: i64,
    pub show_perf_results: bool,
    pub images: Vec<ImageArgument>,
    pub serials: Vec<SerialArgument>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_ips: 10000,
            show_perf_results: false,
            images: Vec::new(),
            serials: Vec::new(),
        }
    }
}

pub fn load_image(mem: &mut Memory, data: &[u8], offset: u16) -> Result<(), Fault> {
    mem.write_range(offset as usize, data)
}
