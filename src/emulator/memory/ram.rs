//! Esse módulo implementa uma RAM simples para o host e para os testes.
//! Big-endian, like everything on the console's bus.

use super::{Memory, Width};

use color_eyre::eyre::{eyre, Result};
use log::trace;

use std::collections::HashMap;

/// Checa o alinhamento de um endereço. Causa erro caso não seja alinhado a
/// palavras.
macro_rules! check_alignment {
    ($addr:ident) => {
        if $addr % 4 != 0 {
            return Err(eyre!("Acesso a endereço não alinhado! {:#x}", $addr));
        }
    };
}

/// Como sugerido, a memória é só um HashMap onde as chaves são os endereços
/// das words.
///
/// Addresses at or above `size` are open bus.
pub struct Ram {
    memory: HashMap<u32, u32>,
    size: u32,
}

impl Ram {
    /// A RAM covering the whole physical address space.
    pub fn new() -> Ram {
        Ram::with_size(0x2000_0000)
    }

    /// A RAM answering only below `size` bytes.
    pub fn with_size(size: u32) -> Ram {
        Ram {
            memory: HashMap::with_capacity(1024),
            size,
        }
    }

    fn read_word(&self, addr: u32) -> u32 {
        *self.memory.get(&addr).unwrap_or(&0)
    }

    fn write_word(&mut self, addr: u32, val: u32) {
        self.memory.insert(addr, val);
    }

    /// Misaligned accesses never reach the bus; treat them as open bus.
    fn contains(&self, addr: u32, width: Width) -> bool {
        addr % width.bytes() == 0
            && addr
                .checked_add(width.bytes())
                .map_or(false, |end| end <= self.size)
    }

    /// Carrega um bloco de words na memória a partir do endereço especificado.
    pub fn load_slice_into_addr(&mut self, addr: u32, data: &[u32]) -> Result<()> {
        check_alignment!(addr);

        let mut addr = addr;
        for word in data {
            if !self.poke(addr, Width::Word, *word as u64) {
                return Err(eyre!("Endereço fora da RAM: {:#x}", addr));
            }
            addr += 4;
        }

        Ok(())
    }

    /// Loads a big-endian byte image at `addr`. The tail is zero padded to
    /// a whole word.
    pub fn load_bytes(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let words: Vec<u32> = data
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_be_bytes(word)
            })
            .collect();

        self.load_slice_into_addr(addr, &words)
    }
}

impl Default for Ram {
    fn default() -> Self {
        Ram::new()
    }
}

impl Memory for Ram {
    /// Retorna o valor no endereço especificado, sendo 0 caso não tenha sido
    /// inicializado.
    fn peek(&mut self, addr: u32, width: Width) -> Option<u64> {
        if !self.contains(addr, width) {
            trace!("ram: open bus read at {:#010x}", addr);
            return None;
        }

        let base = addr & !3;
        let shift = 8 * (4 - width.bytes().min(4) - (addr & 3));

        let val = match width {
            Width::Byte => ((self.read_word(base) >> shift) & 0xff) as u64,
            Width::Half => ((self.read_word(base) >> shift) & 0xffff) as u64,
            Width::Word => self.read_word(base) as u64,
            Width::Double => {
                (self.read_word(base) as u64) << 32 | self.read_word(base + 4) as u64
            }
        };

        Some(val)
    }

    /// Modifica um valor no endereço especificado.
    fn poke(&mut self, addr: u32, width: Width, val: u64) -> bool {
        if !self.contains(addr, width) {
            trace!("ram: write to {:#010x} dropped", addr);
            return false;
        }

        let base = addr & !3;
        let shift = 8 * (4 - width.bytes().min(4) - (addr & 3));

        match width {
            Width::Byte | Width::Half => {
                let mask: u32 = (if width == Width::Byte { 0xff } else { 0xffff }) << shift;
                let old = self.read_word(base);
                self.write_word(base, (old & !mask) | ((val as u32) << shift & mask));
            }
            Width::Word => self.write_word(base, val as u32),
            Width::Double => {
                self.write_word(base, (val >> 32) as u32);
                self.write_word(base + 4, val as u32);
            }
        }

        true
    }
}
