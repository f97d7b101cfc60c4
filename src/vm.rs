//! Demand-paged virtual memory (C9, spec.md §4.9).
//!
//! Page tables reference physical pages which, on eviction, reference page
//! tables again — the classic cyclic shape spec.md §9 calls out. The cycle
//! is broken the way the spec prescribes: an arena of every PTE ever
//! allocated, addressed by a stable integer id everywhere else, rather than
//! PTEs holding pointers to one another.

use std::collections::HashMap;

use crate::alloc::FreeBlockList;
use crate::disk::{Disk, PAGE_SIZE as DISK_PAGE_SIZE};
use crate::error::{Error, Result};

pub const PAGE_PSIZE: u32 = 12;
pub const PAGE_SIZE: u32 = 1 << PAGE_PSIZE;

pub type Pid = u32;
pub type VPage = u32;
pub type PteId = usize;

#[derive(Debug, Clone, Copy)]
struct Pte {
    #[allow(dead_code)]
    vpage: VPage,
    ppage: Option<u32>,
    dirty: bool,
    resident_on_disk: bool,
    disk_page: Option<u32>,
}

/// Owns the per-process page tables, the physical-frame free list, and the
/// swap disk. Only the system bus is meant to call [`Mmu::map_address`]
/// (spec.md §5: "only the bus may invoke `map_address`").
#[derive(Debug)]
pub struct Mmu {
    ptes: Vec<Pte>,
    page_tables: HashMap<(Pid, VPage), PteId>,
    free_frames: FreeBlockList,
    /// FIFO of resident PTE ids, used to pick an eviction victim.
    resident: Vec<PteId>,
    disk: Disk,
    current: Option<Pid>,
}

impl Mmu {
    pub fn new(n_physical_pages: u32, n_disk_pages: u32) -> Self {
        Mmu {
            ptes: Vec::new(),
            page_tables: HashMap::new(),
            free_frames: FreeBlockList::new(0, n_physical_pages),
            resident: Vec::new(),
            disk: Disk::new(n_disk_pages),
            current: None,
        }
    }

    fn add_page(&mut self, pid: Pid, vpage: VPage) -> Result<PteId> {
        let disk_page = self.disk.get_free_page()?;
        let id = self.ptes.len();
        self.ptes.push(Pte {
            vpage,
            ppage: None,
            dirty: false,
            resident_on_disk: true,
            disk_page: Some(disk_page),
        });
        self.page_tables.insert((pid, vpage), id);
        Ok(id)
    }

    /// Creates a fresh table covering `[lo, hi)`; every page starts
    /// resident-on-disk (demand-zero).
    pub fn begin_process(&mut self, pid: Pid, lo: u32, hi: u32) -> Result<()> {
        if hi <= lo {
            return Ok(());
        }
        let page_begin = lo >> PAGE_PSIZE;
        let page_end = (hi - 1) >> PAGE_PSIZE;
        for vpage in page_begin..=page_end {
            self.add_page(pid, vpage)?;
        }
        Ok(())
    }

    /// Evicts every resident page to the free lists, returns every disk
    /// page, and drops the table.
    pub fn end_process(&mut self, pid: Pid) -> Result<()> {
        let keys: Vec<VPage> = self
            .page_tables
            .keys()
            .filter(|(p, _)| *p == pid)
            .map(|(_, v)| *v)
            .collect();
        for vpage in keys {
            let id = self.page_tables.remove(&(pid, vpage)).expect("just listed");
            let pte = self.ptes[id];
            if pte.resident_on_disk {
                self.disk.return_page(pte.disk_page.expect("resident on disk has a disk page"))?;
            } else {
                let ppage = pte.ppage.expect("resident in RAM has a physical page");
                self.free_frames.release(ppage, 1)?;
                self.resident.retain(|&r| r != id);
            }
        }
        if self.current == Some(pid) {
            self.current = None;
        }
        Ok(())
    }

    pub fn set_process(&mut self, pid: Pid) {
        self.current = Some(pid);
    }

    /// Picks a victim PTE, writes its frame back to a fresh disk page
    /// (unconditionally, not only when dirty — simpler than a dirty-gated
    /// write-back and still satisfies "a dirty page is written back before
    /// its frame is reused"), and returns the frame it held.
    fn evict_one(&mut self, ram: &mut [u8]) -> Result<u32> {
        let victim_id = self.resident.remove(0);
        let victim = &mut self.ptes[victim_id];
        let ppage = victim.ppage.take().expect("resident PTE has a frame");
        let fresh_disk_page = self.disk.get_free_page()?;
        let mut buf = [0u8; DISK_PAGE_SIZE];
        let start = (ppage * PAGE_SIZE) as usize;
        buf.copy_from_slice(&ram[start..start + PAGE_SIZE as usize]);
        self.disk.write_page(fresh_disk_page, &buf)?;

        let victim = &mut self.ptes[victim_id];
        victim.resident_on_disk = true;
        victim.disk_page = Some(fresh_disk_page);
        victim.dirty = false;
        Ok(ppage)
    }

    fn acquire_frame(&mut self, ram: &mut [u8]) -> Result<u32> {
        if self.free_frames.can_fit(1) {
            self.free_frames.allocate(1)
        } else {
            self.evict_one(ram)
        }
    }

    fn fault_in(&mut self, id: PteId, ram: &mut [u8]) -> Result<()> {
        let disk_page = self.ptes[id].disk_page.expect("resident-on-disk PTE has a disk page");
        let bytes = self.disk.read_page(disk_page)?;
        let ppage = self.acquire_frame(ram)?;
        let start = (ppage * PAGE_SIZE) as usize;
        ram[start..start + PAGE_SIZE as usize].copy_from_slice(&bytes);
        self.disk.return_page(disk_page)?;

        let pte = &mut self.ptes[id];
        pte.ppage = Some(ppage);
        pte.resident_on_disk = false;
        pte.disk_page = None;
        pte.dirty = false;
        self.resident.push(id);
        Ok(())
    }

    /// The translation primitive (spec.md §4.9's four numbered steps).
    /// `ram` is the raw bytes of the physical RAM device, addressed
    /// directly by `physical_page * PAGE_SIZE + offset`; the bus is the
    /// only caller with access to those bytes.
    pub fn map_address(&mut self, va: u32, write: bool, ram: &mut [u8]) -> Result<u32> {
        let Some(pid) = self.current else {
            return Ok(va);
        };
        let vpage = va >> PAGE_PSIZE;
        let offset = va & (PAGE_SIZE - 1);

        let id = match self.page_tables.get(&(pid, vpage)) {
            Some(&id) => id,
            None => self.add_page(pid, vpage)?,
        };

        if self.ptes[id].resident_on_disk {
            self.fault_in(id, ram)?;
        }
        if write {
            self.ptes[id].dirty = true;
        }

        let ppage = self.ptes[id].ppage.expect("resident page has a physical frame");
        Ok(ppage * PAGE_SIZE + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_metal_passthrough_without_bound_process() {
        let mut mmu = Mmu::new(4, 4);
        let mut ram = vec![0u8; (4 * PAGE_SIZE) as usize];
        assert_eq!(mmu.map_address(0x1234, false, &mut ram).unwrap(), 0x1234);
    }

    #[test]
    fn demand_zero_first_touch_then_stable_on_second() {
        // spec.md S5.
        let mut mmu = Mmu::new(4, 4);
        let mut ram = vec![0u8; (4 * PAGE_SIZE) as usize];
        mmu.begin_process(1, 0, 0x3000).unwrap();
        mmu.set_process(1);

        let pa1 = mmu.map_address(0x1234, false, &mut ram).unwrap();
        assert_eq!(ram[pa1 as usize], 0);

        let pa2 = mmu.map_address(0x1234, false, &mut ram).unwrap();
        assert_eq!(pa1, pa2);
    }

    #[test]
    fn end_process_returns_every_page() {
        let mut mmu = Mmu::new(2, 2);
        let mut ram = vec![0u8; (2 * PAGE_SIZE) as usize];
        mmu.begin_process(1, 0, 0x2000).unwrap();
        mmu.set_process(1);
        mmu.map_address(0x0000, true, &mut ram).unwrap();
        mmu.map_address(0x1000, false, &mut ram).unwrap();
        mmu.end_process(1).unwrap();

        // Page conservation (spec.md §8.5): everything this process held is
        // back in the free lists, so a fresh process can acquire it all.
        mmu.begin_process(2, 0, 0x2000).unwrap();
        mmu.set_process(2);
        mmu.map_address(0x0000, false, &mut ram).unwrap();
        mmu.map_address(0x1000, false, &mut ram).unwrap();
    }

    #[test]
    fn eviction_preserves_written_content() {
        let mut mmu = Mmu::new(1, 4);
        let mut ram = vec![0u8; PAGE_SIZE as usize];
        mmu.begin_process(1, 0, 0x3000).unwrap();
        mmu.set_process(1);

        let pa0 = mmu.map_address(0x0000, true, &mut ram).unwrap();
        ram[pa0 as usize] = 0xAB;
        // Faulting in vpage 1 evicts vpage 0 (only one physical frame); the
        // single frame gets reused, so the address is the same, but its
        // backing vpage has changed and its content is now vpage 1's zero page.
        let pa1 = mmu.map_address(0x1000, false, &mut ram).unwrap();
        assert_eq!(ram[pa1 as usize], 0);

        // Touching vpage 0 again evicts vpage 1 and restores vpage 0's
        // previously written content from its swapped-out disk page.
        let pa0_again = mmu.map_address(0x0000, false, &mut ram).unwrap();
        assert_eq!(ram[pa0_again as usize], 0xAB);
    }
}
