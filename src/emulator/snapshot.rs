//! Save-state: the complete architectural state of the core as one
//! versioned value, encoded with bincode.
//!
//! Memory contents are not part of it; the bus owns them.

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

use super::context::Mode;
use super::cop0::Cop0;
use super::exception::Controller;
use super::pipeline::{Branch, LoadShadow};
use super::regs::{Fpu, Registers};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version for compatibility checking
    pub version: u32,
    pub regs: Registers,
    pub hi: u64,
    pub lo: u64,
    pub pc: u32,
    /// Delay slot state of the instruction at `pc`.
    pub branch: Branch,
    /// Load waiting for write back.
    pub load: Option<LoadShadow>,
    pub fpu: Fpu,
    /// Includes the TLB, Random, Wired and the Count phase.
    pub cop0: Cop0,
    /// Mode the operating context was built for.
    pub mode: Mode,
    pub ll_bit: bool,
    /// Fault raised by the last step, not serviced yet.
    pub exceptions: Controller,
    pub cycles: u64,
}

impl Snapshot {
    /// Current snapshot version
    pub const VERSION: u32 = 2;

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).wrap_err("snapshot: serialization failed")
    }

    /// Decodes and validates a snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Snapshot> {
        let snapshot: Snapshot =
            bincode::deserialize(data).wrap_err("snapshot: deserialization failed")?;

        if snapshot.version != Snapshot::VERSION {
            return Err(eyre!(
                "snapshot: version {} not supported (expected {})",
                snapshot.version,
                Snapshot::VERSION
            ));
        }
        if snapshot.mode != snapshot.cop0.mode() {
            return Err(eyre!(
                "snapshot: context mode {:?} disagrees with Status ({:?})",
                snapshot.mode,
                snapshot.cop0.mode()
            ));
        }
        Ok(snapshot)
    }
}
