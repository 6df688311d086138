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

/// Behavior of a memory-less peripheral on the device bus. Reads and polls
/// must not block: `read` returns 0 when no data is available and `poll`
/// answers immediately.
pub trait Device {
    fn read(&mut self) -> u8;
    fn write(&mut self, byte: u8);
    fn poll(&mut self) -> bool;

    fn close(&mut self) {}
}

/// A device registered with the CPU: bus id, name (13 bytes reach guest
/// programs through the deviceinfo cpucall) and the address of its
/// interrupt handler, 0 meaning none.
pub struct DeviceSlot {
    pub id: u16,
    pub name: String,
    pub handler_ptr: u16,
    pub dev: Box<dyn Device>,
}

impl DeviceSlot {
    pub fn new(id: u16, name: &str, dev: Box<dyn Device>) -> Self {
        Self {
            id,
            name: name.to_string(),
            handler_ptr: 0,
            dev,
        }
    }
}
