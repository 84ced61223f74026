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

use log::{trace, warn};

use super::PagerContext;
use crate::{
    frame::Frame,
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    VirtAddr, VmError,
};

/// One page of a memory mapped file
pub(crate) struct FilePage<F: BackingFileModule> {
    file: F,
    offset: usize,

    /// bytes of this page that are backed by the file
    length: usize,
}

impl<F: BackingFileModule> FilePage<F> {
    pub(crate) fn new(file: F, offset: usize, length: usize) -> Self {
        Self {
            file,
            offset,
            length,
        }
    }

    pub(crate) fn file(&self) -> &F {
        &self.file
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }

    /// Reads the page from its file again, the tail past `length` is zero filled
    pub(crate) fn swap_in<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        addr: VirtAddr,
        frame: &Frame,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) -> Result<(), VmError> {
        let dest = ctx.frames.bytes_mut(frame);
        let read = self
            .file
            .read_at(self.offset, &mut dest[..self.length])
            .map_err(|_| VmError::Io { addr })?;
        dest[read..].fill(0);

        trace!("{:?} read {} bytes from its file", addr, read);
        Ok(())
    }

    /// Writes the page to its file if it is dirty.
    ///
    /// Only the file backed part is written and the file never grows.
    pub(crate) fn write_back<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        addr: VirtAddr,
        frame: &Frame,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) {
        if !ctx.page_table.is_dirty(addr) {
            return;
        }

        let src = &ctx.frames.bytes(frame)[..self.length];
        match self.file.write_at(self.offset, src) {
            Ok(written) => {
                trace!("{:?} wrote {} bytes back", addr, written);
                ctx.counters.write_backs += 1;
            }
            Err(()) => warn!("write back of {:?} failed, changes are lost", addr),
        }

        ctx.page_table.set_dirty(addr, false);
    }
}
