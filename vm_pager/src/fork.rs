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

use log::{debug, info, warn};

use crate::{
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    vm::{Pid, VirtualMemoryInner},
    VirtAddr, VmError,
};

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemoryInner<D, F, P, E>
{
    /// Creates `child` as a full copy of `parent`.
    ///
    /// Every page of the child is resident afterwards and holds the same bytes
    /// as the parent page. Nothing is shared between both address spaces.
    pub(crate) fn fork(&mut self, parent: Pid, child: Pid) -> Result<(), VmError> {
        // the parent frame stays pinned while the child page gets its frame
        if self.space(parent)?.spt.len() > 0 && self.frames.frame_count() < 2 {
            return Err(VmError::InvalidArgument("copying pages needs at least two frames"));
        }
        self.create_process(child)?;

        if let Err(err) = self.copy_address_space(parent, child) {
            warn!("fork of process {} failed: {}", parent, err);
            self.exit_process(child)?;
            return Err(err);
        }

        info!("process {} forked into {}", parent, child);
        Ok(())
    }

    fn copy_address_space(&mut self, parent: Pid, child: Pid) -> Result<(), VmError> {
        let src = self.space(parent)?;
        let stack_pointer = src.stack_pointer;
        let addresses = src.spt.addresses();

        let mut regions = Vec::with_capacity(src.regions.len());
        for region in src.regions.values() {
            regions.push(
                region
                    .reopen()
                    .map_err(|_| VmError::Io { addr: region.base })?,
            );
        }

        let dst = self.space_mut(child)?;
        dst.stack_pointer = stack_pointer;
        for region in regions {
            dst.regions.insert(region.base, region);
        }

        for va in addresses {
            self.copy_page(parent, child, va)?;
        }

        debug!(
            "copied {} pages from process {} to {}",
            self.space(child)?.spt.len(),
            parent,
            child
        );
        Ok(())
    }

    fn copy_page(&mut self, parent: Pid, child: Pid, va: VirtAddr) -> Result<(), VmError> {
        // duplicated before the claim, so lazy pages keep their initializer
        let duplicate = self
            .space(parent)?
            .spt
            .find(va)
            .ok_or(VmError::InvalidArgument("parent page vanished"))?
            .duplicate()
            .map_err(|_| VmError::Io { addr: va })?;

        self.claim_page(parent, va)?;

        let src = self.space(parent)?;
        let dirty = src.page_table.is_dirty(va);
        let parent_frame = src
            .spt
            .find(va)
            .and_then(|page| page.frame.as_ref())
            .map(|frame| frame.number())
            .ok_or(VmError::InvalidArgument("parent page is not resident"))?;

        // the child claim may evict, but never the page we copy from
        self.frames.pin(parent_frame);
        let res = self
            .alloc_page(child, duplicate)
            .and_then(|_| self.claim_page(child, va));
        if let Err(err) = res {
            self.frames.unpin(parent_frame);
            return Err(err);
        }

        let (Some(src), Some(dst)) = (self.spaces.get(&parent), self.spaces.get(&child)) else {
            self.frames.unpin(parent_frame);
            return Err(VmError::NoSuchProcess(child));
        };
        let (Some(src_frame), Some(dst_frame)) = (
            src.spt.find(va).and_then(|page| page.frame.as_ref()),
            dst.spt.find(va).and_then(|page| page.frame.as_ref()),
        ) else {
            self.frames.unpin(parent_frame);
            return Err(VmError::InvalidArgument("page is not resident after claim"));
        };
        self.frames.copy_frame(src_frame, dst_frame);
        self.frames.unpin(parent_frame);

        if dirty {
            // content differs from the file just like in the parent
            self.space_mut(child)?.page_table.set_dirty(va, true);
        }

        Ok(())
    }
}
