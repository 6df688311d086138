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

use super::device::DeviceSlot;
use super::memory::Memory;
use crate::arch::*;
use crate::errors::{Exit, Fault, Request};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// The Irid register file: eight full-width registers (r0..r3 also
/// addressable as high/low halves), instruction, stack and base pointers,
/// and the four one-bit flags.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Registers {
    pub r0: u16,
    pub r1: u16,
    pub r2: u16,
    pub r3: u16,
    pub r4: u16,
    pub r5: u16,
    pub r6: u16,
    pub r7: u16,
    pub ip: u16,
    pub sp: u16,
    pub bp: u16,
    pub cf: bool,
    pub zf: bool,
    pub of: bool,
    pub sf: bool,
}

impl Registers {
    /// Reads a register through its ID byte; half registers zero-extend.
    pub fn load(&self, id: u8) -> Result<u16, Fault> {
        match id {
            R_R0 => Ok(self.r0),
            R_R1 => Ok(self.r1),
            R_R2 => Ok(self.r2),
            R_R3 => Ok(self.r3),
            R_R4 => Ok(self.r4),
            R_R5 => Ok(self.r5),
            R_R6 => Ok(self.r6),
            R_R7 => Ok(self.r7),
            R_IP => Ok(self.ip),
            R_SP => Ok(self.sp),
            R_BP => Ok(self.bp),
            R_H0..=R_H3 => Ok(self.half_pair(id)? >> 8),
            R_L0..=R_L3 => Ok(self.half_pair(id)? & 0xff),
            _ => Err(Fault::Reg),
        }
    }

    /// Writes a register through its ID byte; a half register keeps only
    /// the low 8 bits of the value.
    pub fn store(&mut self, id: u8, value: u16) -> Result<(), Fault> {
        match id {
            R_R0 => self.r0 = value,
            R_R1 => self.r1 = value,
            R_R2 => self.r2 = value,
            R_R3 => self.r3 = value,
            R_R4 => self.r4 = value,
            R_R5 => self.r5 = value,
            R_R6 => self.r6 = value,
            R_R7 => self.r7 = value,
            R_IP => self.ip = value,
            R_SP => self.sp = value,
            R_BP => self.bp = value,
            R_H0..=R_H3 => {
                let pair = self.half_pair(id)?;
                *self.full_mut(id - R_H0)? = (pair & 0x00ff) | (value << 8);
            }
            R_L0..=R_L3 => {
                let pair = self.half_pair(id)?;
                *self.full_mut(id - R_L0)? = (pair & 0xff00) | (value & 0x00ff);
            }
            _ => return Err(Fault::Reg),
        }

        Ok(())
    }

    /// Reads a full-width register only; a half register ID faults `REG`.
    pub fn load_full(&self, id: u8) -> Result<u16, Fault> {
        if is_half_register(id) {
            return Err(Fault::Reg);
        }
        self.load(id)
    }

    fn half_pair(&self, id: u8) -> Result<u16, Fault> {
        let index = if (R_H0..=R_H3).contains(&id) {
            id - R_H0
        } else {
            id - R_L0
        };
        match index {
            0 => Ok(self.r0),
            1 => Ok(self.r1),
            2 => Ok(self.r2),
            3 => Ok(self.r3),
            _ => Err(Fault::Reg),
        }
    }

    fn full_mut(&mut self, index: u8) -> Result<&mut u16, Fault> {
        match index {
            0 => Ok(&mut self.r0),
            1 => Ok(&mut self.r1),
            2 => Ok(&mut self.r2),
            3 => Ok(&mut self.r3),
            _ => Err(Fault::Reg),
        }
    }
}

type Step = Result<(), Exit>;

/// The Irid CPU: a fetch-decode-execute loop over the flat memory bank,
/// with a device bus, polled interrupts and best-effort cycle pacing.
pub struct Cpu {
    mem: Memory,
    reg: Registers,
    reg_cache: Registers,
    interrupts: bool,
    in_interrupt: bool,
    devices: Vec<DeviceSlot>,
    cycle_ns: u64,
    target_ips: i64,
    total_instructions: u64,
    start_time: Instant,
    stop: Arc<AtomicBool>,
}

impl Cpu {
    pub fn new(mem: Memory) -> Self {
        Self {
            mem,
            reg: Registers::default(),
            reg_cache: Registers::default(),
            interrupts: false,
            in_interrupt: false,
            devices: Vec::new(),
            cycle_ns: 0,
            target_ips: 0,
            total_instructions: 0,
            start_time: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn registers(&self) -> &Registers {
        &self.reg
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.reg
    }

    /// The process-wide stop word; setting it makes the CPU raise a
    /// poweroff request at the next iteration boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn set_target_ips(&mut self, target_ips: i64) {
        if target_ips <= 0 {
            return;
        }

        self.cycle_ns = 1_000_000_000 / target_ips as u64;
        self.target_ips = target_ips;
    }

    pub fn add_device(&mut self, slot: DeviceSlot) -> Result<(), Fault> {
        if self.devices.iter().any(|d| d.id == slot.id) {
            return Err(Fault::Io);
        }

        self.devices.push(slot);
        Ok(())
    }

    pub fn remove_devices(&mut self) {
        for slot in &mut self.devices {
            slot.dev.close();
        }

        self.devices.clear();
    }

    /// Runs until a poweroff request or a fault. A restart request zeroes
    /// the register file and re-enters the fetch loop.
    pub fn start(&mut self) -> Result<(), Fault> {
        self.start_time = Instant::now();

        loop {
            match self.mainloop() {
                Err(Exit::Request(Request::Restart)) => self.initialize(),
                Err(Exit::Request(Request::Poweroff)) => return Ok(()),
                Err(Exit::Fault(fault)) => {
                    self.dump_registers();
                    return Err(fault);
                }
                Ok(()) => unreachable!(),
            }
        }
    }

    pub fn print_perf(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64().max(1.0);
        let mut avg_ips = self.total_instructions as f64 / elapsed;
        let mut prefix = "";

        if avg_ips > 1000.0 {
            prefix = "k";
            avg_ips /= 1000.0;
        }

        let avg_cycle_us = if self.total_instructions == 0 {
            0.0
        } else {
            elapsed / self.total_instructions as f64 * 1_000_000.0
        };

        println!("\nCPU performance results:\n");
        println!("  total instructions    {}", self.total_instructions);
        println!("  average IPS           {:.2} {}Hz", avg_ips, prefix);
        println!("  average cycle time    {:.2} us", avg_cycle_us);
        println!("  target IPS            {} Hz", self.target_ips);
        println!();
    }

    fn initialize(&mut self) {
        self.reg = Registers::default();
    }

    fn mainloop(&mut self) -> Result<(), Exit> {
        loop {
            // Quick check if the user requested a shutdown.
            if self.stop.load(Ordering::Relaxed) {
                return Err(Exit::Request(Request::Poweroff));
            }

            // Start the instruction cycle.
            let cycle_start = Instant::now();

            // Before we load & run another instruction, poll all devices
            // for any incoming data. The gate on in_interrupt keeps
            // interrupts from nesting.
            if self.interrupts && !self.in_interrupt {
                self.poll_devices();
            }

            let instr = self.mem.read8(self.reg.ip);
            self.step(instr)?;

            // Before we run the next instruction, check if we are not
            // speeding and slow down to the target IPS appropriately.
            if self.cycle_ns > 0 {
                let cycle = Duration::from_nanos(self.cycle_ns);
                let elapsed = cycle_start.elapsed();
                if elapsed < cycle {
                    std::thread::sleep(cycle - elapsed);
                }
            }

            self.total_instructions += 1;
        }
    }

    /// Decodes and runs one instruction. Control transfers return early
    /// because they already set `ip`; everything else advances by the
    /// 4-byte slot width.
    fn step(&mut self, instr: u8) -> Step {
        let op1 = self.mem.read8(self.reg.ip.wrapping_add(1));
        let op2 = self.mem.read8(self.reg.ip.wrapping_add(2));

        match instr {
            I_NOP => {}
            I_CPUCALL => self.cpucall()?,
            I_RTI => {
                self.rti();
                return Ok(());
            }
            I_STI => self.interrupts = true,
            I_DSI => self.interrupts = false,
            I_PUSH => self.push(op1)?,
            I_PUSH8 => self.push8(op1)?,
            I_PUSH16 => {
                let imm16 = self.imm16_at(1)?;
                self.push16(imm16)?;
            }
            I_POP => self.pop(op1)?,
            I_MOV => {
                let value = self.reg.load(op2)?;
                self.reg.store(op1, value)?;
            }
            I_MOV8 => self.reg.store(op1, op2 as u16)?,
            I_MOV16 => {
                let imm16 = self.imm16_at(2)?;
                self.reg.store(op1, imm16)?;
            }
            I_LOAD => self.load(op1, op2)?,
            I_STORE => self.store(op1, op2)?,
            I_LOAD16 => {
                let pointer = self.imm16_at(2)?;
                self.load16(op1, pointer)?;
            }
            I_STORE16 => {
                let pointer = self.imm16_at(2)?;
                self.store16(op1, pointer)?;
            }
            I_NULL => self.reg.store(op1, 0)?,
            I_CMP => self.reg.cf = self.reg.load(op1)? == self.reg.load(op2)?,
            I_CMP8 => self.reg.cf = self.reg.load(op1)? == op2 as u16,
            I_CMP16 => {
                let imm16 = self.imm16_at(2)?;
                self.reg.cf = self.reg.load(op1)? == imm16;
            }
            I_CMG => self.reg.cf = self.reg.load(op1)? > self.reg.load(op2)?,
            I_CMG8 => self.reg.cf = (self.reg.load(op1)? as u8) > op2,
            I_CMG16 => {
                let imm16 = self.imm16_at(2)?;
                self.reg.cf = self.reg.load(op1)? > imm16;
            }
            I_CML => self.reg.cf = self.reg.load(op1)? < self.reg.load(op2)?,
            I_CML8 => self.reg.cf = (self.reg.load(op1)? as u8) < op2,
            I_CML16 => {
                let imm16 = self.imm16_at(2)?;
                self.reg.cf = self.reg.load(op1)? < imm16;
            }
            I_JMP => {
                self.reg.ip = self.imm16_at(1)?;
                return Ok(());
            }
            I_JNZ => {
                let addr = self.imm16_at(2)?;
                if self.reg.load(op1)? != 0 {
                    self.reg.ip = addr;
                } else {
                    self.reg.ip = self.reg.ip.wrapping_add(4);
                }
                return Ok(());
            }
            I_JEQ => {
                let addr = self.imm16_at(1)?;
                if self.reg.cf {
                    self.reg.ip = addr;
                } else {
                    self.reg.ip = self.reg.ip.wrapping_add(4);
                }
                return Ok(());
            }
            I_CALL => {
                let addr = self.imm16_at(1)?;
                self.push16(self.reg.ip.wrapping_add(4))?;
                self.reg.ip = addr;
                return Ok(());
            }
            I_CALLR => {
                let addr = self.reg.load_full(op1)?;
                self.push16(self.reg.ip.wrapping_add(4))?;
                self.reg.ip = addr;
                return Ok(());
            }
            I_RET => {
                self.reg.ip = self.mem.read16(self.reg.sp)?;
                self.reg.sp = self.reg.sp.wrapping_add(2);
                return Ok(());
            }
            I_ADD => self.arith(op1, |a, b| a.wrapping_add(b), self.reg.load(op2)?)?,
            I_ADD8 => self.arith(op1, |a, b| a.wrapping_add(b), op2 as u16)?,
            I_ADD16 => {
                let imm16 = self.imm16_at(2)?;
                self.arith(op1, |a, b| a.wrapping_add(b), imm16)?;
            }
            I_SUB => self.arith(op1, |a, b| a.wrapping_sub(b), self.reg.load(op2)?)?,
            I_SUB8 => self.arith(op1, |a, b| a.wrapping_sub(b), op2 as u16)?,
            I_SUB16 => {
                let imm16 = self.imm16_at(2)?;
                self.arith(op1, |a, b| a.wrapping_sub(b), imm16)?;
            }
            I_AND => self.arith(op1, |a, b| a & b, self.reg.load(op2)?)?,
            I_AND8 => self.arith(op1, |a, b| a & b, op2 as u16)?,
            I_AND16 => {
                let imm16 = self.imm16_at(2)?;
                self.arith(op1, |a, b| a & b, imm16)?;
            }
            I_OR => self.arith(op1, |a, b| a | b, self.reg.load(op2)?)?,
            I_OR8 => self.arith(op1, |a, b| a | b, op2 as u16)?,
            I_OR16 => {
                let imm16 = self.imm16_at(2)?;
                self.arith(op1, |a, b| a | b, imm16)?;
            }
            I_MUL => self.arith(op1, |a, b| a.wrapping_mul(b), self.reg.load(op2)?)?,
            I_MUL8 => self.arith(op1, |a, b| a.wrapping_mul(b), op2 as u16)?,
            I_MUL16 => {
                let imm16 = self.imm16_at(2)?;
                self.arith(op1, |a, b| a.wrapping_mul(b), imm16)?;
            }
            I_NOT => {
                let value = self.reg.load(op1)?;
                self.reg.store(op1, !value)?;
            }
            I_SHR => {
                let amount = self.reg.load(op2)?;
                self.shift(op1, amount as u32, false)?;
            }
            I_SHR8 => self.shift(op1, op2 as u32, false)?,
            I_SHL => {
                let amount = self.reg.load(op2)?;
                self.shift(op1, amount as u32, true)?;
            }
            I_SHL8 => self.shift(op1, op2 as u32, true)?,
            _ => return Err(Fault::Ins.into()),
        }

        self.reg.ip = self.reg.ip.wrapping_add(4);
        Ok(())
    }

    fn imm16_at(&self, operand_offset: u16) -> Result<u16, Fault> {
        self.mem.read16(self.reg.ip.wrapping_add(operand_offset))
    }

    /// Modular arithmetic in the destination register's width.
    fn arith(&mut self, dest: u8, op: fn(u16, u16) -> u16, value: u16) -> Result<(), Fault> {
        let current = self.reg.load(dest)?;
        self.reg.store(dest, op(current, value))?;
        Ok(())
    }

    /// Shifts are width-aware: shifting past the register width clears it.
    fn shift(&mut self, dest: u8, amount: u32, left: bool) -> Result<(), Fault> {
        let width = match register_width(dest) {
            RegisterWidth::Byte => 8,
            RegisterWidth::Word => 16,
        };

        let current = self.reg.load(dest)?;
        let shifted = if amount >= width {
            0
        } else if left {
            current << amount
        } else {
            current >> amount
        };

        self.reg.store(dest, shifted)?;
        Ok(())
    }

    // --- stack ---

    fn push(&mut self, src: u8) -> Result<(), Fault> {
        if self.reg.sp == 0 {
            return Err(Fault::Seg);
        }

        let value = self.reg.load(src)?;
        if is_half_register(src) {
            self.reg.sp = self.reg.sp.wrapping_sub(1);
            self.mem.write8(self.reg.sp, value as u8);
        } else {
            self.reg.sp = self.reg.sp.wrapping_sub(2);
            self.mem.write16(self.reg.sp, value)?;
        }

        Ok(())
    }

    fn push8(&mut self, imm8: u8) -> Result<(), Fault> {
        if self.reg.sp == 0 {
            return Err(Fault::Seg);
        }

        self.reg.sp = self.reg.sp.wrapping_sub(1);
        self.mem.write8(self.reg.sp, imm8);
        Ok(())
    }

    fn push16(&mut self, imm16: u16) -> Result<(), Fault> {
        if self.reg.sp == 0 {
            return Err(Fault::Seg);
        }

        self.reg.sp = self.reg.sp.wrapping_sub(2);
        self.mem.write16(self.reg.sp, imm16)?;
        Ok(())
    }

    fn pop(&mut self, dest: u8) -> Result<(), Fault> {
        if is_half_register(dest) {
            let value = self.mem.read8(self.reg.sp);
            self.reg.sp = self.reg.sp.wrapping_add(1);
            self.reg.store(dest, value as u16)?;
        } else {
            let value = self.mem.read16(self.reg.sp)?;
            self.reg.sp = self.reg.sp.wrapping_add(2);
            self.reg.store(dest, value)?;
        }

        // Popping past the frame base corrupts the stack.
        if self.reg.sp > self.reg.bp {
            return Err(Fault::Stack);
        }

        Ok(())
    }

    // --- loads & stores ---

    fn load(&mut self, dest: u8, srcptr: u8) -> Result<(), Fault> {
        if is_half_register(srcptr) {
            return Err(Fault::Reg);
        }

        let pointer = self.reg.load(srcptr)?;
        if is_half_register(dest) {
            let value = self.mem.read8(pointer);
            self.reg.store(dest, value as u16)?;
        } else {
            let value = self.mem.read16(pointer)?;
            self.reg.store(dest, value)?;
        }

        Ok(())
    }

    fn store(&mut self, src: u8, destptr: u8) -> Result<(), Fault> {
        if is_half_register(destptr) {
            return Err(Fault::Reg);
        }

        let pointer = self.reg.load(destptr)?;
        let value = self.reg.load(src)?;
        if is_half_register(src) {
            self.mem.write8(pointer, value as u8);
        } else {
            self.mem.write16(pointer, value)?;
        }

        Ok(())
    }

    fn load16(&mut self, dest: u8, pointer: u16) -> Result<(), Fault> {
        if is_half_register(dest) {
            let value = self.mem.read8(pointer);
            self.reg.store(dest, value as u16)?;
        } else {
            let value = self.mem.read16(pointer)?;
            self.reg.store(dest, value)?;
        }

        Ok(())
    }

    fn store16(&mut self, src: u8, pointer: u16) -> Result<(), Fault> {
        let value = self.reg.load(src)?;
        if is_half_register(src) {
            self.mem.write8(pointer, value as u8);
        } else {
            self.mem.write16(pointer, value)?;
        }

        Ok(())
    }

    // --- interrupts ---

    fn poll_devices(&mut self) {
        for i in 0..self.devices.len() {
            if self.devices[i].handler_ptr == 0 {
                continue;
            }

            if self.devices[i].dev.poll() {
                let handler = self.devices[i].handler_ptr;
                self.issue_interrupt(handler);
                break;
            }
        }
    }

    /// Before executing the interrupt routine, the CPU caches all registers
    /// to be restored when rti is called.
    fn issue_interrupt(&mut self, addr: u16) {
        self.in_interrupt = true;
        self.reg_cache = self.reg;
        self.reg.ip = addr;
    }

    fn rti(&mut self) {
        self.in_interrupt = false;
        self.reg = self.reg_cache;
    }

    // --- cpucalls ---

    fn cpucall(&mut self) -> Step {
        match self.reg.r0 {
            CPUCALL_POWEROFF => Err(Exit::Request(Request::Poweroff)),
            CPUCALL_RESTART => Err(Exit::Request(Request::Restart)),
            CPUCALL_FAULT => Err(Fault::User.into()),
            CPUCALL_DEVICELIST => self.cpucall_devicelist(),
            CPUCALL_DEVICEINFO => self.cpucall_deviceinfo(),
            CPUCALL_DEVICEINTR => {
                self.cpucall_deviceintr();
                Ok(())
            }
            CPUCALL_DEVICEWRITE => self.cpucall_devicewrite(),
            CPUCALL_DEVICEREAD => self.cpucall_deviceread(),
            CPUCALL_DEVICEPOLL => self.cpucall_devicepoll(),
            _ => Err(Fault::Cpucall.into()),
        }
    }

    fn find_device(&mut self, id: u16) -> Option<&mut DeviceSlot> {
        self.devices.iter_mut().find(|slot| slot.id == id)
    }

    fn cpucall_devicelist(&mut self) -> Step {
        let pointer = self.reg.r1 as usize;
        let maxlen = self.reg.r2 as usize;
        let to_write = usize::min(self.devices.len(), maxlen);

        let mut ids = Vec::with_capacity(to_write * 2);
        for slot in &self.devices[..to_write] {
            ids.extend_from_slice(&slot.id.to_le_bytes());
        }

        // Fill the array with IDs, then tell the user how many.
        self.mem.write_range(pointer, &ids)?;
        self.reg.r2 = to_write as u16;
        Ok(())
    }

    fn cpucall_deviceinfo(&mut self) -> Step {
        let target = self.reg.r1;
        let dest = self.reg.r2 as usize;

        let mut record = None;
        for slot in &self.devices {
            if slot.id != target {
                continue;
            }

            let mut info = [0u8; 2 + DEVICE_NAME_LEN];
            info[0..2].copy_from_slice(&slot.id.to_le_bytes());

            let name = slot.name.as_bytes();
            let len = usize::min(DEVICE_NAME_LEN - 1, name.len());
            info[2..2 + len].copy_from_slice(&name[..len]);

            record = Some(info);
            break;
        }

        if let Some(info) = record {
            self.mem.write_range(dest, &info)?;
        }

        Ok(())
    }

    fn cpucall_deviceintr(&mut self) {
        let target = self.reg.r1;
        let handler = self.reg.r2;

        if let Some(slot) = self.find_device(target) {
            slot.handler_ptr = handler;
        }
    }

    fn cpucall_devicewrite(&mut self) -> Step {
        let target = self.reg.r1;
        let byte = self.reg.load(R_H2)? as u8;

        if let Some(slot) = self.find_device(target) {
            slot.dev.write(byte);
        }

        Ok(())
    }

    fn cpucall_deviceread(&mut self) -> Step {
        let target = self.reg.r1;

        let value = match self.find_device(target) {
            Some(slot) => slot.dev.read(),
            None => return Ok(()),
        };

        self.reg.store(R_H2, value as u16)?;
        Ok(())
    }

    fn cpucall_devicepoll(&mut self) -> Step {
        let target = self.reg.r1;

        let value = match self.find_device(target) {
            Some(slot) => slot.dev.poll() as u8,
            None => return Ok(()),
        };

        self.reg.store(R_H2, value as u16)?;
        Ok(())
    }

    fn dump_registers(&self) {
        println!("\nCPU fault\n");
        println!("Registers:");
        println!(
            "  r0=0x{:04x} r1=0x{:04x} r2=0x{:04x} r3=0x{:04x}",
            self.reg.r0, self.reg.r1, self.reg.r2, self.reg.r3
        );
        println!(
            "  r4=0x{:04x} r5=0x{:04x} r6=0x{:04x} r7=0x{:04x}",
            self.reg.r4, self.reg.r5, self.reg.r6, self.reg.r7
        );
        println!(
            "  ip=0x{:04x} sp=0x{:04x} bp=0x{:04x}",
            self.reg.ip, self.reg.sp, self.reg.bp
        );
        println!(
            "  cf={}      zf={}      of={}      sf={}\n",
            self.reg.cf as u8, self.reg.zf as u8, self.reg.of as u8, self.reg.sf as u8
        );
    }
}
