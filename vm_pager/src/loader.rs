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

use log::debug;

use crate::{
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    page::{LazyLoad, Page},
    vm::{Pid, VirtualMemoryInner},
    VirtAddr, VmError, PAGE_SIZE,
};

/// Placement of one loadable executable segment.
///
/// `read_bytes` bytes of the file starting at `offset` are mapped to `upage`,
/// followed by `zero_bytes` zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub offset: usize,
    pub upage: VirtAddr,
    pub read_bytes: usize,
    pub zero_bytes: usize,
    pub writable: bool,
}

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemoryInner<D, F, P, E>
{
    /// Reserves one anonymous page per page of `segment`.
    ///
    /// Nothing is read here, every page reads its part with its own handle of
    /// `file` on its first fault. Pages reserved before a failure stay
    /// reserved until the process exits.
    pub(crate) fn load_segment(
        &mut self,
        pid: Pid,
        file: &F,
        segment: LoadSegment,
    ) -> Result<(), VmError> {
        let size = segment
            .read_bytes
            .checked_add(segment.zero_bytes)
            .ok_or(VmError::InvalidArgument("segment size overflows"))?;
        if size % PAGE_SIZE != 0 {
            return Err(VmError::InvalidArgument("segment size is not a multiple of the page size"));
        }
        if !segment.upage.is_page_aligned() {
            return Err(VmError::InvalidArgument("segment address is not page aligned"));
        }
        if segment.offset % PAGE_SIZE != 0 {
            return Err(VmError::InvalidArgument("segment offset is not page aligned"));
        }

        debug!(
            "process {} loads segment at {:?}: {} bytes from offset {:#x}, {} zero bytes",
            pid, segment.upage, segment.read_bytes, segment.offset, segment.zero_bytes
        );

        let mut read_bytes = segment.read_bytes;
        let mut offset = segment.offset;
        let mut upage = segment.upage;
        let page_count = size / PAGE_SIZE;
        for _ in 0..page_count {
            let page_read_bytes = read_bytes.min(PAGE_SIZE);

            let load = if page_read_bytes == 0 {
                LazyLoad::Zero
            } else {
                LazyLoad::Segment {
                    file: file
                        .reopen()
                        .map_err(|_| VmError::Io { addr: upage })?,
                    offset,
                    read_bytes: page_read_bytes,
                }
            };
            self.alloc_page(pid, Page::new_uninit(upage, segment.writable, load))?;

            read_bytes -= page_read_bytes;
            offset += page_read_bytes;
            upage = upage
                .checked_add(PAGE_SIZE)
                .ok_or(VmError::InvalidArgument("segment exceeds the address space"))?;
        }

        Ok(())
    }

    /// Creates the topmost stack page, makes it resident and sets the stack
    /// pointer to the top of the stack
    pub(crate) fn setup_stack(&mut self, pid: Pid) -> Result<(), VmError> {
        let stack_bottom = VirtAddr::new(self.config.stack_top - PAGE_SIZE);

        let mut page = Page::new_uninit(stack_bottom, true, LazyLoad::Zero);
        page.is_stack = true;
        self.alloc_page(pid, page)?;
        self.claim_page(pid, stack_bottom)?;

        self.space_mut(pid)?.stack_pointer = VirtAddr::new(self.config.stack_top);
        debug!("process {} has its stack at {:?}", pid, stack_bottom);
        Ok(())
    }
}
