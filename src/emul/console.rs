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

use super::device::{Device, DeviceSlot};
use std::collections::VecDeque;
use std::os::fd::RawFd;

pub const CONSOLE_ID: u16 = 0x1000;

/// Writing this byte drops the console into control mode: the next byte is
/// interpreted as a control code.
pub const CONSOLE_CTRL: u8 = 0x11;

/// Control code: enqueue the terminal size (width-lo, width-hi, height-lo,
/// height-hi) into the console's own read buffer.
pub const CCTL_SIZE: u8 = 0x01;

pub struct Console {
    in_fd: RawFd,
    out_fd: RawFd,
    control_mode: bool,
    readbuffer: VecDeque<u8>,
}

pub fn console_create(in_fd: RawFd, out_fd: RawFd) -> DeviceSlot {
    DeviceSlot::new(
        CONSOLE_ID,
        "console",
        Box::new(Console {
            in_fd,
            out_fd,
            control_mode: false,
            readbuffer: VecDeque::new(),
        }),
    )
}

pub(super) fn fd_poll(fd: RawFd) -> bool {
    let mut poll_rq = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let res = unsafe { libc::poll(&mut poll_rq, 1, 0) };
    res > 0 && (poll_rq.revents & libc::POLLIN) != 0
}

pub(super) fn fd_read_byte(fd: RawFd) -> u8 {
    let mut byte = [0u8; 1];
    let read = unsafe { libc::read(fd, byte.as_mut_ptr() as *mut libc::c_void, 1) };
    if read <= 0 { 0 } else { byte[0] }
}

fn fd_write(fd: RawFd, bytes: &[u8]) {
    let _ = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
}

impl Console {
    fn queue_word(&mut self, word: u16) {
        self.readbuffer.push_back((word & 0xff) as u8);
        self.readbuffer.push_back((word >> 8) as u8);
    }

    fn cctl_size(&mut self) {
        let mut width: u16 = 0;
        let mut height: u16 = 0;

        if unsafe { libc::isatty(self.out_fd) } == 1 {
            let mut size: libc::winsize = unsafe { std::mem::zeroed() };
            let request = libc::TIOCGWINSZ;
            if unsafe { libc::ioctl(self.out_fd, request, &mut size as *mut libc::winsize) } == 0 {
                width = size.ws_col;
                height = size.ws_row;
            }
        }

        self.queue_word(width);
        self.queue_word(height);
    }

    fn control(&mut self, code: u8) {
        if code == CCTL_SIZE {
            self.cctl_size();
        }
    }
}

impl Device for Console {
    fn read(&mut self) -> u8 {
        // First empty our own readbuffer.
        if let Some(byte) = self.readbuffer.pop_front() {
            return byte;
        }

        // Non-blocking: a NUL means stdin is empty.
        if !fd_poll(self.in_fd) {
            return 0;
        }

        fd_read_byte(self.in_fd)
    }

    fn write(&mut self, byte: u8) {
        // If we are in control mode, this byte is the control code.
        if self.control_mode {
            self.control(byte);
            self.control_mode = false;
            return;
        }

        // Only printable characters pass through, "firewalling" escape and
        // control codes.
        if byte.is_ascii_graphic() || byte == b' ' || byte == b'\n' || byte == b'\r' || byte == 0x7f
        {
            fd_write(self.out_fd, &[byte]);
            return;
        }

        // Clear screen command.
        if byte == 0x0c {
            fd_write(self.out_fd, b"\x1b[2J\x1b[1;1H");
            return;
        }

        if byte == CONSOLE_CTRL {
            self.control_mode = true;
        }
    }

    fn poll(&mut self) -> bool {
        if !self.readbuffer.is_empty() {
            return true;
        }

        fd_poll(self.in_fd)
    }
}
