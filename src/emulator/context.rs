//! Operating mode and the segment table derived from it.

use serde::{Deserialize, Serialize};

use super::cop0::{STATUS_ERL, STATUS_EXL, STATUS_KSU_MASK, STATUS_KSU_SHIFT};

/// Privilege level, from `Status.KSU`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Kernel,
    Supervisor,
    User,
    /// `KSU = 3`. Treated as user mode for addressing.
    Undefined,
}

impl Mode {
    /// Effective mode for a Status value. `EXL` and `ERL` force kernel
    /// mode regardless of `KSU`.
    pub fn from_status(status: u32) -> Mode {
        if status & (STATUS_EXL | STATUS_ERL) != 0 {
            return Mode::Kernel;
        }

        match (status >> STATUS_KSU_SHIFT) & STATUS_KSU_MASK {
            0 => Mode::Kernel,
            1 => Mode::Supervisor,
            2 => Mode::User,
            _ => Mode::Undefined,
        }
    }
}

/// Addressing policy of one 512 MiB window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Not accessible in the current mode.
    Invalid,
    /// Translated through the TLB.
    Mapped,
    /// Direct mapped, cached.
    Cached,
    /// Direct mapped, uncached.
    Uncached,
}

/// The mode plus the 8 segments covering the 32-bit virtual space.
///
/// Never mutated in place: a mode change builds a new `Context`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    mode: Mode,
    segments: [Segment; 8],
}

impl Context {
    pub fn new(mode: Mode) -> Context {
        use Segment::*;

        let segments = match mode {
            Mode::Kernel => [Mapped, Mapped, Mapped, Mapped, Cached, Uncached, Mapped, Mapped],
            Mode::Supervisor => [Mapped, Mapped, Mapped, Mapped, Invalid, Invalid, Mapped, Invalid],
            Mode::User | Mode::Undefined => {
                [Mapped, Mapped, Mapped, Mapped, Invalid, Invalid, Invalid, Invalid]
            }
        };

        Context { mode, segments }
    }

    pub fn from_status(status: u32) -> Context {
        Context::new(Mode::from_status(status))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The segment covering `vaddr`.
    pub fn segment(&self, vaddr: u32) -> Segment {
        self.segments[(vaddr >> 29) as usize]
    }

    pub fn segments(&self) -> &[Segment; 8] {
        &self.segments
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Mode::Kernel)
    }
}
