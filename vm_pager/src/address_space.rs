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
    mmap::MappingRegion, modules::{file::BackingFileModule, page_table::PageTableModule},
    supplemental_page_table::SupplementalPageTable, VirtAddr,
};

/// Virtual memory state of one process
pub(crate) struct AddressSpace<F: BackingFileModule, P: PageTableModule> {
    pub(crate) spt: SupplementalPageTable<F>,
    pub(crate) page_table: P,

    /// mmap regions by base address
    pub(crate) regions: BTreeMap<VirtAddr, MappingRegion<F>>,

    /// user stack pointer as it was at the last trap into the kernel
    pub(crate) stack_pointer: VirtAddr,
}

impl<F: BackingFileModule, P: PageTableModule> AddressSpace<F, P> {
    /// Empty address space whose stack pointer starts at `stack_top`
    pub(crate) fn new(stack_top: VirtAddr) -> Self {
        Self {
            spt: SupplementalPageTable::new(),
            page_table: P::new(),
            regions: BTreeMap::new(),
            stack_pointer: stack_top,
        }
    }
}
