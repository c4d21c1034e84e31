//! Virtual to physical address translation.
//!
//! The segment comes from the operating context; only mapped segments go
//! through the TLB. Translation never changes any state: TLB faults are
//! returned and the exception controller fills in the COP0 registers when
//! it takes them.

use super::context::{Context, Segment};
use super::exception::Exception;
use super::tlb::Tlb;

/// Direct mapped segments drop the top 3 bits.
const DIRECT_MASK: u32 = 0x1fff_ffff;

/// What the address is being translated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Fetch,
    Load,
    Store,
}

impl Access {
    pub fn is_store(self) -> bool {
        self == Access::Store
    }
}

/// Translates `vaddr` for `access` in address space `asid`.
pub fn translate(
    context: &Context,
    tlb: &Tlb,
    asid: u8,
    vaddr: u32,
    access: Access,
) -> Result<u32, Exception> {
    let store = access.is_store();

    match context.segment(vaddr) {
        Segment::Invalid => Err(Exception::AddressError { vaddr, store }),
        Segment::Cached | Segment::Uncached => Ok(vaddr & DIRECT_MASK),
        Segment::Mapped => {
            let hit = tlb
                .lookup(vaddr, asid)
                .ok_or(Exception::TlbMiss { vaddr, store })?;

            if !hit.page.valid {
                return Err(Exception::TlbInvalid { vaddr, store });
            }
            if store && !hit.page.dirty {
                return Err(Exception::TlbModified(vaddr));
            }

            Ok(hit.paddr)
        }
    }
}

/// Checks that `vaddr` is aligned to `width` bytes.
pub fn check_alignment(vaddr: u32, width: u32, access: Access) -> Result<(), Exception> {
    if vaddr & (width - 1) != 0 {
        Err(Exception::AddressError {
            vaddr,
            store: access.is_store(),
        })
    } else {
        Ok(())
    }
}
