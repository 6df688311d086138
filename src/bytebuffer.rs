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

/// Growable byte buffer with overwrite-anywhere insert semantics.
///
/// Unlike `Vec::insert`, the `insert*` methods here never shift existing
/// bytes: they overwrite in place and extend the buffer with zeros when the
/// target range lies past the current end. The assembler relies on this to
/// move its emission cursor freely (`.org`) and to patch link points, and
/// the IOF writer uses it to fill in table headers after the fact.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn append(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn append_range(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn insert(&mut self, byte: u8, index: usize) {
        self.ensure_size(index + 1);
        self.bytes[index] = byte;
    }

    pub fn insert_range(&mut self, bytes: &[u8], starting_index: usize) {
        self.ensure_size(starting_index + bytes.len());
        self.bytes[starting_index..starting_index + bytes.len()].copy_from_slice(bytes);
    }

    pub fn insert_fill(&mut self, with_byte: u8, starting_index: usize, len: usize) {
        self.ensure_size(starting_index + len);
        self.bytes[starting_index..starting_index + len].fill(with_byte);
    }

    pub fn at(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    pub fn get_range(&self, starting_index: usize, len: usize) -> &[u8] {
        let end = usize::min(starting_index + len, self.bytes.len());
        &self.bytes[starting_index..end]
    }

    fn ensure_size(&mut self, required_size: usize) {
        if self.bytes.len() < required_size {
            self.bytes.resize(required_size, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_len() {
        let mut buf = ByteBuffer::new();
        buf.append(0x12);
        buf.append_range(&[0x34, 0x56]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_slice(), &[0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut buf = ByteBuffer::new();
        buf.append_range(&[1, 2, 3, 4]);
        buf.insert(0xff, 1);
        assert_eq!(buf.as_slice(), &[1, 0xff, 3, 4]);
    }

    #[test]
    fn test_insert_past_end_zero_extends() {
        let mut buf = ByteBuffer::new();
        buf.insert(0xaa, 4);
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0xaa]);
    }

    #[test]
    fn test_insert_range_straddling_end() {
        let mut buf = ByteBuffer::new();
        buf.append_range(&[1, 2, 3]);
        buf.insert_range(&[9, 9, 9], 2);
        assert_eq!(buf.as_slice(), &[1, 2, 9, 9, 9]);
    }

    #[test]
    fn test_insert_fill() {
        let mut buf = ByteBuffer::new();
        buf.insert_fill(0, 2, 3);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_get_range_clamps_to_len() {
        let mut buf = ByteBuffer::new();
        buf.append_range(&[1, 2, 3]);
        assert_eq!(buf.get_range(1, 10), &[2, 3]);
    }
}
