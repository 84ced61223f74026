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

use log::{debug, info};

use crate::{
    error::AccessViolation,
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    page::{LazyLoad, Page, PagerContext},
    vm::{Pid, VirtualMemoryInner},
    VirtAddr, VmError, PAGE_SIZE,
};

/// Bookkeeping of one `mmap` call
pub(crate) struct MappingRegion<F: BackingFileModule> {
    pub(crate) base: VirtAddr,

    /// mapped bytes, rounded up to whole pages
    pub(crate) length: usize,

    /// handle owned by the mapping, closed on unmap
    pub(crate) file: F,
    pub(crate) offset: usize,
}

impl<F: BackingFileModule> MappingRegion<F> {
    pub(crate) fn page_count(&self) -> usize {
        self.length / PAGE_SIZE
    }

    /// Copy of this region with its own file handle
    pub(crate) fn reopen(&self) -> Result<Self, ()> {
        Ok(Self {
            base: self.base,
            length: self.length,
            file: self.file.reopen()?,
            offset: self.offset,
        })
    }
}

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemoryInner<D, F, P, E>
{
    pub(crate) fn mmap(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        length: usize,
        writable: bool,
        file: &F,
        offset: usize,
    ) -> Result<VirtAddr, VmError> {
        self.check_user_addr(addr)?;
        if !addr.is_page_aligned() {
            return Err(VmError::InvalidArgument("mapping address is not page aligned"));
        }
        if length == 0 {
            return Err(VmError::InvalidArgument("mapping length is zero"));
        }
        if offset % PAGE_SIZE != 0 {
            return Err(VmError::InvalidArgument("file offset is not page aligned"));
        }
        if file.len() == 0 {
            return Err(VmError::InvalidArgument("file is empty"));
        }

        // a length this large always reaches into the kernel
        let mapped_len = length
            .checked_next_multiple_of(PAGE_SIZE)
            .ok_or(VmError::invalid_access(addr, AccessViolation::KernelAddress))?;
        let end = addr
            .checked_add(mapped_len)
            .filter(|end| end.as_usize() <= self.config.kernel_base)
            .ok_or(VmError::invalid_access(addr, AccessViolation::KernelAddress))?;

        if offset.checked_add(mapped_len).is_none() {
            return Err(VmError::InvalidArgument("file range exceeds the file size limit"));
        }

        let space = self.space_mut(pid)?;
        if space.spt.overlaps(addr, end) {
            return Err(VmError::AlreadyMapped { addr });
        }

        let region_file = file.reopen().map_err(|_| VmError::Io { addr })?;
        let file_len = region_file.len();
        space.regions.insert(
            addr,
            MappingRegion {
                base: addr,
                length: mapped_len,
                file: region_file,
                offset,
            },
        );

        if let Err(err) = self.map_pages(pid, addr, length, writable, file_len, offset) {
            // pages mapped so far are removed together with the region
            self.munmap(pid, addr)?;
            return Err(err);
        }

        info!(
            "process {} mapped {} bytes at {:?}..{:?}",
            pid, length, addr, end
        );
        Ok(addr)
    }

    fn map_pages(
        &mut self,
        pid: Pid,
        base: VirtAddr,
        length: usize,
        writable: bool,
        file_len: usize,
        offset: usize,
    ) -> Result<(), VmError> {
        let space = self.space_mut(pid)?;
        let Some(region) = space.regions.get(&base) else {
            return Err(VmError::InvalidArgument("mapping region vanished"));
        };

        let mut pages = Vec::with_capacity(region.page_count());
        for i in 0..region.page_count() {
            let va = base.add(i * PAGE_SIZE);
            let file_offset = offset + i * PAGE_SIZE;

            // bytes past the requested length or past the end of the file are zero filled
            let backed = (length - i * PAGE_SIZE)
                .min(file_len.saturating_sub(file_offset))
                .min(PAGE_SIZE);
            let page_file = region.file.reopen().map_err(|_| VmError::Io { addr: va })?;

            let mut page = Page::new_uninit(
                va,
                writable,
                LazyLoad::Mapped {
                    file: page_file,
                    offset: file_offset,
                    length: backed,
                },
            );
            page.region = Some(base);
            pages.push(page);
        }

        for page in pages {
            self.alloc_page(pid, page)?;
        }

        Ok(())
    }

    /// Removes the mapping at `addr`, writing dirty pages back to the file.
    ///
    /// Does nothing if there is no mapping at `addr`.
    pub(crate) fn munmap(&mut self, pid: Pid, addr: VirtAddr) -> Result<(), VmError> {
        let space = self
            .spaces
            .get_mut(&pid)
            .ok_or(VmError::NoSuchProcess(pid))?;
        let Some(region) = space.regions.remove(&addr) else {
            debug!("process {} unmaps unknown region {:?}", pid, addr);
            return Ok(());
        };

        let mut ctx = PagerContext {
            frames: &mut self.frames,
            swap: &mut self.swap,
            page_table: &mut space.page_table,
            counters: &mut self.counters,
        };
        for i in 0..region.page_count() {
            let va = region.base.add(i * PAGE_SIZE);
            let ours = space
                .spt
                .find(va)
                .is_some_and(|page| page.region == Some(region.base));
            if !ours {
                continue;
            }

            if let Some(page) = space.spt.remove(va) {
                page.destroy(&mut ctx);
            }
        }

        info!("process {} unmapped {:?}", pid, addr);

        // closes the file
        drop(region);
        Ok(())
    }
}
