//! General purpose and floating point register files.

use serde::{Deserialize, Serialize};

use super::{FloatRegister, Register};

/// The 32 general purpose registers, 64 bits each.
///
/// `$zero` is stored like any other register, but every read of it
/// returns 0 and `set` discards writes to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers([u64; 32]);

impl Registers {
    pub fn new() -> Registers {
        Registers([0; 32])
    }

    /// Writes `val` into `reg`. Writes to `$zero` are dropped.
    pub fn set(&mut self, reg: Register, val: u64) {
        if reg.0 != 0 {
            self.0[reg.0 as usize] = val;
        }
    }
}

impl std::ops::Index<Register> for Registers {
    type Output = u64;

    fn index(&self, index: Register) -> &Self::Output {
        if index.0 == 0 {
            &0
        } else {
            &self.0[index.0 as usize]
        }
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..32 {
            writeln!(f, "{}: {:#018x}", Register(i as u32), self[Register(i as u32)])?;
        }

        Ok(())
    }
}

/// Implementation/revision register (FCR0) of the VR4300 FPU.
pub const FCR0: u32 = 0x0000_0a00;

/// Condition bit set by `C.cond` and tested by `BC1T`/`BC1F`.
pub const FCR31_CONDITION: u32 = 1 << 23;

/// Bits of FCR31 that software can write.
const FCR31_MASK: u32 = 0x0183_ffff;

/// FPU rounding modes, FCR31 bits 1:0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rounding {
    Nearest,
    Zero,
    Up,
    Down,
}

/// Coprocessor 1: the floating point register file and its control
/// registers.
///
/// With `Status.FR` clear the 32-bit view pairs registers: an odd register
/// is the upper half of the even register below it. With `FR` set every
/// register is an independent 64-bit value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fpu {
    fpr: [u64; 32],
    fcr31: u32,
}

impl Fpu {
    pub fn new() -> Fpu {
        Fpu::default()
    }

    pub fn read_u32(&self, reg: FloatRegister, fr: bool) -> u32 {
        if fr {
            self.fpr[reg.0 as usize] as u32
        } else if reg.0 & 1 == 1 {
            (self.fpr[(reg.0 & !1) as usize] >> 32) as u32
        } else {
            self.fpr[reg.0 as usize] as u32
        }
    }

    pub fn write_u32(&mut self, reg: FloatRegister, fr: bool, val: u32) {
        if fr {
            let slot = &mut self.fpr[reg.0 as usize];
            *slot = (*slot & 0xffff_ffff_0000_0000) | val as u64;
        } else if reg.0 & 1 == 1 {
            let slot = &mut self.fpr[(reg.0 & !1) as usize];
            *slot = (*slot & 0x0000_0000_ffff_ffff) | ((val as u64) << 32);
        } else {
            let slot = &mut self.fpr[reg.0 as usize];
            *slot = (*slot & 0xffff_ffff_0000_0000) | val as u64;
        }
    }

    pub fn read_u64(&self, reg: FloatRegister, fr: bool) -> u64 {
        if fr {
            self.fpr[reg.0 as usize]
        } else {
            self.fpr[(reg.0 & !1) as usize]
        }
    }

    pub fn write_u64(&mut self, reg: FloatRegister, fr: bool, val: u64) {
        if fr {
            self.fpr[reg.0 as usize] = val;
        } else {
            self.fpr[(reg.0 & !1) as usize] = val;
        }
    }

    pub fn read_s(&self, reg: FloatRegister, fr: bool) -> f32 {
        f32::from_bits(self.read_u32(reg, fr))
    }

    pub fn write_s(&mut self, reg: FloatRegister, fr: bool, val: f32) {
        self.write_u32(reg, fr, val.to_bits());
    }

    pub fn read_d(&self, reg: FloatRegister, fr: bool) -> f64 {
        f64::from_bits(self.read_u64(reg, fr))
    }

    pub fn write_d(&mut self, reg: FloatRegister, fr: bool, val: f64) {
        self.write_u64(reg, fr, val.to_bits());
    }

    /// CFC1. Only FCR0 and FCR31 exist, everything else reads 0.
    pub fn read_control(&self, n: u32) -> u32 {
        match n {
            0 => FCR0,
            31 => self.fcr31,
            _ => 0,
        }
    }

    /// CTC1. FCR0 is read-only.
    pub fn write_control(&mut self, n: u32, val: u32) {
        match n {
            31 => self.fcr31 = val & FCR31_MASK,
            _ => log::warn!("CTC1 to read-only control register {}", n),
        }
    }

    pub fn condition(&self) -> bool {
        self.fcr31 & FCR31_CONDITION != 0
    }

    pub fn set_condition(&mut self, cond: bool) {
        if cond {
            self.fcr31 |= FCR31_CONDITION;
        } else {
            self.fcr31 &= !FCR31_CONDITION;
        }
    }

    pub fn rounding(&self) -> Rounding {
        match self.fcr31 & 3 {
            0 => Rounding::Nearest,
            1 => Rounding::Zero,
            2 => Rounding::Up,
            _ => Rounding::Down,
        }
    }
}

/// Rounds `x` to an integral value according to `mode`.
pub fn round(x: f64, mode: Rounding) -> f64 {
    match mode {
        Rounding::Nearest => {
            let r = x.round();
            // ties go to even
            if (x - x.trunc()).abs() == 0.5 {
                2.0 * (x / 2.0).round()
            } else {
                r
            }
        }
        Rounding::Zero => x.trunc(),
        Rounding::Up => x.ceil(),
        Rounding::Down => x.floor(),
    }
}
