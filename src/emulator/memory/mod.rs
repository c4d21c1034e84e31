//! A interface entre a CPU e o barramento.
//!
//! The core only ever issues naturally aligned physical accesses; the
//! bus is big-endian. `None` from `peek` means nothing answered (open
//! bus), `false` from `poke` means the write was dropped.

pub mod ram;

pub use ram::Ram;

/// Access size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
    Double,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Half => 2,
            Width::Word => 4,
            Width::Double => 8,
        }
    }

    pub fn from_bytes(bytes: u32) -> Option<Width> {
        match bytes {
            1 => Some(Width::Byte),
            2 => Some(Width::Half),
            4 => Some(Width::Word),
            8 => Some(Width::Double),
            _ => None,
        }
    }
}

pub trait Memory {
    /// Reads `width` bytes at the physical address `addr`, zero extended.
    fn peek(&mut self, addr: u32, width: Width) -> Option<u64>;

    /// Writes the low `width` bytes of `val` at `addr`.
    fn poke(&mut self, addr: u32, width: Width, val: u64) -> bool;

    /// Reads a single byte anywhere. Goes through an aligned word read.
    fn peek_unaligned(&mut self, addr: u32) -> Option<u8> {
        let base = addr & !3;
        let offset = addr - base;

        let word = self.peek(base, Width::Word)? as u32;
        Some(word.to_be_bytes()[offset as usize])
    }

    /// Writes a single byte anywhere, read-modify-write on the word.
    fn poke_unaligned(&mut self, addr: u32, val: u8) -> bool {
        let base = addr & !3;
        let offset = addr - base;

        let mut bytes = (self.peek(base, Width::Word).unwrap_or(0) as u32).to_be_bytes();
        bytes[offset as usize] = val;
        self.poke(base, Width::Word, u32::from_be_bytes(bytes) as u64)
    }
}
