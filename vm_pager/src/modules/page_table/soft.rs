/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::BTreeMap;

use super::PageTableModule;
use crate::{PhysAddr, VirtAddr};

const PRESENT: u8 = 1 << 0;
const WRITABLE: u8 = 1 << 1;
const ACCESSED: u8 = 1 << 2;
const DIRTY: u8 = 1 << 3;

/*
The bit usage is as follows:
|Bit|Usage|
0    Present
1    Writable
2    Accessed (set by the mmu on every access)
3    Dirty (set by the mmu on every write)
4-7  [Unused]
*/

#[derive(Clone, Copy, PartialEq)]
struct PageTableEntry {
    frame: PhysAddr,
    bit_list: u8,
}

macro_rules! generate_functions {
    ($bit: ident, $get_name: ident, $set_name: ident) => {
        #[inline]
        fn $get_name(&self) -> bool {
            self.is_set($bit)
        }

        #[allow(unused)]
        #[inline]
        fn $set_name(&mut self, val: bool) {
            self.set($bit, val);
        }
    };
}

impl PageTableEntry {
    fn new(frame: PhysAddr, writable: bool) -> Self {
        let mut instance = PageTableEntry {
            frame,
            bit_list: PRESENT,
        };
        instance.set_writable(writable);
        instance
    }

    #[inline]
    fn is_set(&self, bitmask: u8) -> bool {
        (self.bit_list & bitmask) != 0
    }

    #[inline]
    fn set(&mut self, bitmask: u8, state: bool) {
        if state {
            // set
            self.bit_list |= bitmask;
        } else {
            // unset
            self.bit_list &= !bitmask;
        }
    }

    generate_functions!(PRESENT, is_present, set_present);
    generate_functions!(WRITABLE, is_writable, set_writable);
    generate_functions!(ACCESSED, is_accessed, set_accessed);
    generate_functions!(DIRTY, is_dirty, set_dirty);
}

/// Page table kept in software, one entry per mapped page
pub struct SoftPageTableModule {
    entries: BTreeMap<VirtAddr, PageTableEntry>,
}

impl SoftPageTableModule {
    fn entry(&self, va: VirtAddr) -> Option<&PageTableEntry> {
        self.entries
            .get(&va.page_round_down())
            .filter(|entry| entry.is_present())
    }

    fn entry_mut(&mut self, va: VirtAddr) -> Option<&mut PageTableEntry> {
        self.entries
            .get_mut(&va.page_round_down())
            .filter(|entry| entry.is_present())
    }

    /// Number of installed translations
    pub fn mapped_count(&self) -> usize {
        self.entries.len()
    }
}

impl PageTableModule for SoftPageTableModule {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn install(&mut self, va: VirtAddr, pa: PhysAddr, writable: bool) -> Result<(), ()> {
        let upage = va.page_round_down();
        if self.entries.contains_key(&upage) {
            return Err(());
        }

        self.entries.insert(upage, PageTableEntry::new(pa, writable));
        Ok(())
    }

    fn clear(&mut self, va: VirtAddr) {
        self.entries.remove(&va.page_round_down());
    }

    fn resolve(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.entry(va).map(|entry| entry.frame.add(va.page_offset()))
    }

    fn is_writable(&self, va: VirtAddr) -> bool {
        self.entry(va).map_or(false, |entry| entry.is_writable())
    }

    fn is_dirty(&self, va: VirtAddr) -> bool {
        self.entry(va).map_or(false, |entry| entry.is_dirty())
    }

    fn set_dirty(&mut self, va: VirtAddr, dirty: bool) {
        if let Some(entry) = self.entry_mut(va) {
            entry.set_dirty(dirty);
        }
    }

    fn is_accessed(&self, va: VirtAddr) -> bool {
        self.entry(va).map_or(false, |entry| entry.is_accessed())
    }

    fn set_accessed(&mut self, va: VirtAddr, accessed: bool) {
        if let Some(entry) = self.entry_mut(va) {
            entry.set_accessed(accessed);
        }
    }
}
