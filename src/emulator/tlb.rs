//! The translation lookaside buffer.
//!
//! 32 fully associative entries, each mapping a *pair* of pages (even and
//! odd) of a size chosen by the entry's page mask, 4 KiB up to 16 MiB.
//!
//! Entry layout as seen through COP0:
//!   PageMask[24:13] mask bits
//!   EntryHi[31:13]  VPN2 (virtual page number / 2)
//!   EntryHi[7:0]    ASID
//!   EntryLo0/1:
//!     [29:6] PFN (in 4 KiB units)
//!     [5:3]  C (cache algorithm)
//!     [2]    D (dirty, i.e. writable)
//!     [1]    V (valid)
//!     [0]    G (global; the entry is global only if both halves have G=1)

use log::debug;
use serde::{Deserialize, Serialize};

use super::instr::sign_extend;

pub const TLB_ENTRIES: usize = 32;

pub const PAGE_MASK_BITS: u32 = 0x01ff_e000;
const VPN2_BITS: u32 = 0xffff_e000;
const ENTRY_LO_PFN_MASK: u64 = 0x00ff_ffff;

/// One half (even or odd page) of a TLB entry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHalf {
    pub pfn: u32,
    pub cache: u8,
    pub dirty: bool,
    pub valid: bool,
}

impl PageHalf {
    pub fn from_entry_lo(lo: u64) -> PageHalf {
        PageHalf {
            pfn: ((lo >> 6) & ENTRY_LO_PFN_MASK) as u32,
            cache: ((lo >> 3) & 7) as u8,
            dirty: lo & 4 != 0,
            valid: lo & 2 != 0,
        }
    }

    pub fn to_entry_lo(&self, global: bool) -> u64 {
        (self.pfn as u64) << 6
            | (self.cache as u64) << 3
            | (self.dirty as u64) << 2
            | (self.valid as u64) << 1
            | global as u64
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbEntry {
    pub page_mask: u32,
    /// Stored already masked by `!page_mask`.
    pub vpn2: u32,
    pub asid: u8,
    pub global: bool,
    /// Even page at index 0, odd page at index 1.
    pub pages: [PageHalf; 2],
    /// Power-on placeholder, never written by TLBWI/TLBWR. Matches nothing.
    pub blank: bool,
}

impl TlbEntry {
    /// Builds an entry from the COP0 staging registers, as TLBWI/TLBWR do.
    pub fn from_cop0(page_mask: u32, entry_hi: u64, entry_lo0: u64, entry_lo1: u64) -> TlbEntry {
        let page_mask = page_mask & PAGE_MASK_BITS;

        TlbEntry {
            page_mask,
            vpn2: entry_hi as u32 & VPN2_BITS & !page_mask,
            asid: entry_hi as u8,
            global: entry_lo0 & entry_lo1 & 1 != 0,
            pages: [PageHalf::from_entry_lo(entry_lo0), PageHalf::from_entry_lo(entry_lo1)],
            blank: false,
        }
    }

    pub fn entry_hi(&self) -> u64 {
        sign_extend(self.vpn2 as u64, 32) | self.asid as u64
    }

    pub fn entry_lo0(&self) -> u64 {
        self.pages[0].to_entry_lo(self.global)
    }

    pub fn entry_lo1(&self) -> u64 {
        self.pages[1].to_entry_lo(self.global)
    }

    /// Offset mask of the page *pair* covered by this entry.
    fn mask(&self) -> u32 {
        self.page_mask | 0x1fff
    }

    pub fn matches(&self, vaddr: u32, asid: u8) -> bool {
        let mask = self.mask();
        !self.blank
            && (vaddr & !mask) == (self.vpn2 & !mask)
            && (self.global || self.asid == asid)
    }
}

/// Result of a TLB match. The page may still be invalid or clean: the
/// caller decides which fault, if any, that means.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    pub index: usize,
    pub page: PageHalf,
    pub paddr: u32,
}

/// The TLB, plus the Wired and Random registers that drive its
/// replacement policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlb {
    entries: [TlbEntry; TLB_ENTRIES],
    /// Entries below this index are never picked by TLBWR.
    wired: u32,
    /// Victim for TLBWR, always in `wired..=31`.
    random: u32,
}

impl Tlb {
    /// Power-on contents are undefined on hardware. Every entry here is a
    /// blank placeholder with a distinct VPN2 inside kseg0, so neither a
    /// lookup nor TLBP matches it until the guest writes it.
    pub fn new() -> Tlb {
        let mut entries = [TlbEntry::default(); TLB_ENTRIES];
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.vpn2 = 0x8000_0000 + ((i as u32) << 13);
            entry.blank = true;
        }

        Tlb {
            entries,
            wired: 0,
            random: (TLB_ENTRIES - 1) as u32,
        }
    }

    pub fn entry(&self, index: usize) -> &TlbEntry {
        &self.entries[index % TLB_ENTRIES]
    }

    pub fn entries(&self) -> &[TlbEntry; TLB_ENTRIES] {
        &self.entries
    }

    /// TLBWI.
    pub fn write(&mut self, index: usize, entry: TlbEntry) {
        let index = index % TLB_ENTRIES;
        debug!("tlb: write entry {} = {:x?}", index, entry);
        self.entries[index] = entry;
    }

    /// TLBWR. Returns the index that was replaced.
    pub fn write_random(&mut self, entry: TlbEntry) -> usize {
        let index = self.random as usize;
        self.write(index, entry);
        index
    }

    /// TLBP: the first entry matching `entry_hi`'s VPN2 and ASID.
    pub fn probe(&self, entry_hi: u64) -> Option<usize> {
        let vaddr = entry_hi as u32 & VPN2_BITS;
        let asid = entry_hi as u8;
        self.entries.iter().position(|e| e.matches(vaddr, asid))
    }

    /// Looks up `vaddr` for address space `asid`.
    ///
    /// Panics if two entries match: the guest programmed overlapping
    /// entries, which the hardware does not define and this core does
    /// not emulate.
    pub fn lookup(&self, vaddr: u32, asid: u8) -> Option<Hit> {
        let mut matching = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(vaddr, asid));

        let (index, entry) = matching.next()?;
        if let Some((other, _)) = matching.next() {
            panic!(
                "tlb: entries {} and {} both match vaddr {:#010x} asid {}",
                index, other, vaddr, asid
            );
        }

        let mask = entry.mask();
        let odd = vaddr & ((mask + 1) >> 1) != 0;
        let page = entry.pages[odd as usize];
        let offset = vaddr & (mask >> 1);
        let paddr = (((page.pfn as u64) << 12) | offset as u64) as u32;

        Some(Hit { index, page, paddr })
    }

    pub fn wired(&self) -> u32 {
        self.wired
    }

    /// Writing Wired also resets Random to the top of the TLB.
    pub fn set_wired(&mut self, wired: u32) {
        self.wired = wired & 0x1f;
        self.random = (TLB_ENTRIES - 1) as u32;
    }

    pub fn random(&self) -> u32 {
        self.random
    }

    /// Advances Random by one retired instruction: it counts down and wraps
    /// back to 31 after reaching Wired.
    pub fn tick(&mut self) {
        self.random = if self.random <= self.wired {
            (TLB_ENTRIES - 1) as u32
        } else {
            self.random - 1
        };
    }

    pub fn reset(&mut self) {
        *self = Tlb::new();
    }
}

impl Default for Tlb {
    fn default() -> Self {
        Tlb::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vaddr: u32, asid: u8, global: bool, pfn0: u32, pfn1: u32) -> TlbEntry {
        let g = global as u64;
        TlbEntry::from_cop0(
            0,
            vaddr as u64 | asid as u64,
            (pfn0 as u64) << 6 | 0b110 | g,
            (pfn1 as u64) << 6 | 0b010 | g,
        )
    }

    #[test]
    fn even_and_odd_pages() {
        let mut tlb = Tlb::new();
        tlb.write(0, entry(0x0040_0000, 1, false, 0x100, 0x200));

        let even = tlb.lookup(0x0040_0123, 1).unwrap();
        assert_eq!(even.paddr, 0x0010_0123);
        assert!(even.page.dirty);

        let odd = tlb.lookup(0x0040_1ffc, 1).unwrap();
        assert_eq!(odd.paddr, 0x0020_0ffc);
        assert!(!odd.page.dirty);
    }

    #[test]
    fn large_pages_use_the_mask() {
        let mut tlb = Tlb::new();
        // 16 KiB pages: a pair covers 32 KiB.
        let e = TlbEntry::from_cop0(0x6000, 0x1000_0000, 0x40 << 6 | 2, 0x80 << 6 | 2);
        tlb.write(3, e);

        assert_eq!(tlb.lookup(0x1000_3abc, 0).unwrap().paddr, 0x0004_3abc);
        assert_eq!(tlb.lookup(0x1000_4010, 0).unwrap().paddr, 0x0008_0010);
        assert!(tlb.lookup(0x1000_8000, 0).is_none());
    }

    #[test]
    fn asid_and_global_matching() {
        let mut tlb = Tlb::new();
        tlb.write(0, entry(0x0000_2000, 5, false, 1, 2));
        tlb.write(1, entry(0x0000_8000, 5, true, 3, 4));

        assert!(tlb.lookup(0x0000_2000, 5).is_some());
        assert!(tlb.lookup(0x0000_2000, 6).is_none());
        for asid in 0..=255u8 {
            assert!(tlb.lookup(0x0000_8000, asid).is_some());
        }
    }

    #[test]
    #[should_panic(expected = "both match")]
    fn double_match_is_a_host_bug() {
        let mut tlb = Tlb::new();
        tlb.write(0, entry(0x0000_2000, 1, true, 1, 2));
        tlb.write(1, entry(0x0000_2000, 1, true, 3, 4));
        tlb.lookup(0x0000_2000, 1);
    }

    #[test]
    fn entry_round_trips_through_cop0_registers() {
        let e = entry(0x7fff_e000, 0x42, false, 0xabc, 0xdef);
        let back = TlbEntry::from_cop0(e.page_mask, e.entry_hi(), e.entry_lo0(), e.entry_lo1());
        assert_eq!(e, back);
        assert_eq!(e.entry_hi(), 0x7fff_e042);
    }

    #[test]
    fn random_stays_above_wired() {
        let mut tlb = Tlb::new();
        tlb.set_wired(28);
        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push(tlb.random());
            tlb.tick();
        }
        assert_eq!(seen, vec![31, 30, 29, 28, 31, 30, 29, 28, 31, 30]);
    }

    #[test]
    fn write_random_never_touches_wired_entries() {
        let mut tlb = Tlb::new();
        let wired = entry(0x0000_2000, 1, true, 1, 2);
        for i in 0..4 {
            tlb.write(i, TlbEntry { vpn2: (i as u32 + 1) << 13, ..wired });
        }
        tlb.set_wired(4);

        for n in 0..200u32 {
            let idx = tlb.write_random(entry(0x1000_0000 + (n << 13), 0, false, n, n));
            assert!(idx >= 4);
            tlb.tick();
        }
        for i in 0..4 {
            assert_eq!(tlb.entry(i).vpn2, (i as u32 + 1) << 13);
        }
    }

    #[test]
    fn fresh_tlb_matches_nothing_translatable() {
        let tlb = Tlb::new();
        for seg in 0..4u32 {
            assert!(tlb.lookup(seg << 29, 0).is_none());
        }
        assert!(tlb.lookup(0xc000_0000, 0).is_none());
    }

    #[test]
    fn fresh_tlb_has_no_tlbp_hits() {
        let tlb = Tlb::new();
        for i in 0..TLB_ENTRIES as u64 {
            assert_eq!(tlb.probe(0xffff_ffff_8000_0000 + (i << 13)), None);
        }
        assert_eq!(tlb.probe(0), None);
    }

    #[test]
    fn probe_finds_matching_entry() {
        let mut tlb = Tlb::new();
        tlb.write(7, entry(0x0040_0000, 9, false, 1, 2));

        assert_eq!(tlb.probe(0x0040_0009), Some(7));
        assert_eq!(tlb.probe(0x0040_0008), None);
    }
}
