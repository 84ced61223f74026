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

use crate::{
    modules::{block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule, page_table::PageTableModule},
    page::{Page, PagerContext},
    VirtAddr,
};

/// All pages of one process, keyed by their page aligned address.
///
/// Unlike the hardware page table this also knows about pages that are not resident.
pub(crate) struct SupplementalPageTable<F: BackingFileModule> {
    pages: BTreeMap<VirtAddr, Page<F>>,
}

impl<F: BackingFileModule> SupplementalPageTable<F> {
    pub(crate) fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }

    /// Finds the page that contains `va`
    pub(crate) fn find(&self, va: VirtAddr) -> Option<&Page<F>> {
        self.pages.get(&va.page_round_down())
    }

    pub(crate) fn find_mut(&mut self, va: VirtAddr) -> Option<&mut Page<F>> {
        self.pages.get_mut(&va.page_round_down())
    }

    /// Inserts `page`. If its address is already taken the page is handed back.
    pub(crate) fn insert(&mut self, page: Page<F>) -> Result<(), Page<F>> {
        if self.pages.contains_key(&page.va) {
            return Err(page);
        }

        self.pages.insert(page.va, page);
        Ok(())
    }

    pub(crate) fn remove(&mut self, va: VirtAddr) -> Option<Page<F>> {
        self.pages.remove(&va.page_round_down())
    }

    /// Is any page inside `[start, end)`?
    pub(crate) fn overlaps(&self, start: VirtAddr, end: VirtAddr) -> bool {
        if start >= end {
            return false;
        }
        self.pages
            .range(start.page_round_down()..end)
            .next()
            .is_some()
    }

    /// Addresses of all pages in ascending order
    pub(crate) fn addresses(&self) -> Vec<VirtAddr> {
        self.pages.keys().copied().collect()
    }

    /// Destroys every page, leaving the table empty
    pub(crate) fn destroy_all<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) {
        while let Some((_, page)) = self.pages.pop_first() {
            page.destroy(ctx);
        }
    }
}

#[cfg(test)]
mod test {
    use super::SupplementalPageTable;
    use crate::{
        modules::file::MemFileModule,
        page::{LazyLoad, Page},
        VirtAddr, PAGE_SIZE,
    };

    fn page(va: usize) -> Page<MemFileModule> {
        Page::new_uninit(VirtAddr::new(va), true, LazyLoad::Zero)
    }

    #[test]
    fn test_spt_unique_insert() {
        let mut spt = SupplementalPageTable::new();
        assert!(spt.insert(page(0x1000)).is_ok());
        assert!(spt.insert(page(0x2000)).is_ok());

        let rejected = spt.insert(page(0x1000)).err().unwrap();
        assert_eq!(rejected.va, VirtAddr::new(0x1000));
        assert_eq!(spt.len(), 2);
    }

    #[test]
    fn test_spt_find() {
        let mut spt = SupplementalPageTable::new();
        spt.insert(page(0x4000)).ok().unwrap();

        assert_eq!(spt.find(VirtAddr::new(0x4000)).unwrap().va, VirtAddr::new(0x4000));
        assert_eq!(spt.find(VirtAddr::new(0x4FFF)).unwrap().va, VirtAddr::new(0x4000));
        assert!(spt.find(VirtAddr::new(0x5000)).is_none());
        assert!(spt.find(VirtAddr::new(0x3FFF)).is_none());

        spt.find_mut(VirtAddr::new(0x4123)).unwrap().writable = false;
        assert!(!spt.remove(VirtAddr::new(0x4FFF)).unwrap().writable);
        assert_eq!(spt.len(), 0);
    }

    #[test]
    fn test_spt_overlaps() {
        let mut spt = SupplementalPageTable::new();
        spt.insert(page(3 * PAGE_SIZE)).ok().unwrap();

        let at = |p: usize| VirtAddr::new(p * PAGE_SIZE);
        assert!(spt.overlaps(at(0), at(4)));
        assert!(spt.overlaps(at(3), at(3).add(1)));
        assert!(!spt.overlaps(at(0), at(3)));
        assert!(!spt.overlaps(at(4), at(10)));
        assert!(!spt.overlaps(at(3), at(3)));

        assert_eq!(spt.addresses(), vec![at(3)]);
    }
}
