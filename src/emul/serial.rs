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

use super::console::{fd_poll, fd_read_byte};
use super::device::{Device, DeviceSlot};
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;

/// A file-backed serial device; usually pointed at a FIFO or a pty.
pub struct Serial {
    file: File,
}

pub fn serial_create(id: u16, name: &str, path: &str) -> Result<DeviceSlot> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open serial device {} @ {}", name, path))?;

    Ok(DeviceSlot::new(id, name, Box::new(Serial { file })))
}

impl Device for Serial {
    fn read(&mut self) -> u8 {
        // Non-blocking: a NUL means no data is waiting.
        if !fd_poll(self.file.as_raw_fd()) {
            return 0;
        }

        fd_read_byte(self.file.as_raw_fd())
    }

    fn write(&mut self, byte: u8) {
        let _ = self.file.write_all(&[byte]);
    }

    fn poll(&mut self) -> bool {
        fd_poll(self.file.as_raw_fd())
    }
}
