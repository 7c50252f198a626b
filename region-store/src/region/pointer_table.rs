/*!
The 4096-byte location header at the start of every region file.

Each of the 1024 chunk slots owns one 4-byte big-endian entry; a zero entry
means the chunk has no data. Only zeroing is ever performed here, chunk data
itself is never moved or allocated.
*/

use std::io::{self, Read, Write};

use crate::region::coords::CHUNKS_PER_REGION;

/// Size of the pointer table in bytes
pub const POINTER_TABLE_SIZE: usize = 4 * CHUNKS_PER_REGION;

#[derive(Clone, PartialEq, Eq)]
pub struct PointerTable {
    bytes: [u8; POINTER_TABLE_SIZE],
}

impl PointerTable {
    /// Read the complete table; a file shorter than the table is an error.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0; POINTER_TABLE_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(Self { bytes })
    }

    /// Write the complete table in a single call
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.bytes)
    }

    pub fn from_bytes(bytes: [u8; POINTER_TABLE_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; POINTER_TABLE_SIZE] {
        &self.bytes
    }

    /// Decoded entry at a byte offset (a multiple of 4)
    pub fn entry(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    pub fn is_empty(&self, offset: usize) -> bool {
        self.bytes[offset..offset + 4].iter().all(|&b| b == 0)
    }

    /// Zero the entry at `offset`. Returns `false` if it was already zero,
    /// i.e. the chunk was already orphaned.
    pub fn clear(&mut self, offset: usize) -> bool {
        let entry = &mut self.bytes[offset..offset + 4];
        let had_data = entry.iter().any(|&b| b != 0);
        entry.fill(0);
        had_data
    }

    /// Number of chunk slots holding data
    pub fn present_count(&self) -> usize {
        self.bytes
            .chunks_exact(4)
            .filter(|entry| entry.iter().any(|&b| b != 0))
            .count()
    }
}

impl std::fmt::Debug for PointerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointerTable")
            .field("present", &self.present_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn filled_table() -> PointerTable {
        let mut bytes = [0; POINTER_TABLE_SIZE];
        for (slot, entry) in bytes.chunks_exact_mut(4).enumerate() {
            // sector offset in the top three bytes, sector count in the last
            let sector = ((slot as u32 + 2) << 8) | 1;
            entry.copy_from_slice(&sector.to_be_bytes());
        }
        PointerTable::from_bytes(bytes)
    }

    #[test]
    fn test_entry_is_big_endian() {
        let table = filled_table();
        assert_eq!(table.entry(0), 0x0000_0201);
        assert_eq!(table.entry(4), 0x0000_0301);
    }

    #[test]
    fn test_clear_reports_orphans() {
        let mut table = filled_table();
        assert!(table.clear(8));
        assert!(table.is_empty(8));
        assert!(!table.clear(8));
        assert_eq!(table.present_count(), CHUNKS_PER_REGION - 1);
        assert!(!table.is_empty(4));
        assert!(!table.is_empty(12));
    }

    #[test]
    fn test_partial_entry_counts_as_present() {
        let mut bytes = [0; POINTER_TABLE_SIZE];
        bytes[7] = 1;
        let mut table = PointerTable::from_bytes(bytes);
        assert!(!table.is_empty(4));
        assert!(table.clear(4));
        assert_eq!(table.present_count(), 0);
    }

    #[test]
    fn test_short_header_is_rejected() {
        let mut reader = Cursor::new(vec![1u8; POINTER_TABLE_SIZE - 1]);
        let err = PointerTable::read_from(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_emits_whole_table() {
        let table = filled_table();
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(out.len(), POINTER_TABLE_SIZE);
        assert_eq!(PointerTable::read_from(&mut Cursor::new(out)).unwrap(), table);
    }
}
