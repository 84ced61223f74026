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

use log::trace;

use super::PagerContext;
use crate::{
    frame::Frame,
    modules::{block_device::BlockDeviceModule, eviction::EvictionModule, page_table::PageTableModule},
    swap::SwapSlot,
    VirtAddr, VmError,
};

/// Anonymous memory. Lives in a swap slot while not resident.
pub(crate) struct AnonPage {
    slot: Option<SwapSlot>,
}

impl AnonPage {
    pub(crate) fn new() -> Self {
        Self { slot: None }
    }

    pub(crate) fn swap_in<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        addr: VirtAddr,
        frame: &Frame,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) -> Result<(), VmError> {
        let Some(slot) = self.slot.as_ref() else {
            // never swapped out
            ctx.frames.bytes_mut(frame).fill(0);
            return Ok(());
        };

        ctx.swap
            .read_slot(slot, ctx.frames.bytes_mut(frame))
            .map_err(|_| VmError::Io { addr })?;

        if let Some(slot) = self.slot.take() {
            trace!("{:?} swapped in from slot {}", addr, slot.index());
            ctx.swap.release_slot(slot);
        }
        ctx.counters.swap_ins += 1;
        Ok(())
    }

    pub(crate) fn swap_out<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        addr: VirtAddr,
        frame: &Frame,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) -> Result<(), VmError> {
        debug_assert!(self.slot.is_none());
        let slot = ctx.swap.reserve_slot()?;

        if ctx.swap.write_slot(&slot, ctx.frames.bytes(frame)).is_err() {
            ctx.swap.release_slot(slot);
            return Err(VmError::Io { addr });
        }

        trace!("{:?} swapped out to slot {}", addr, slot.index());
        self.slot = Some(slot);
        ctx.counters.swap_outs += 1;
        Ok(())
    }

    /// Gives the swap slot back, if the page currently occupies one
    pub(crate) fn release_slot<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) {
        if let Some(slot) = self.slot.take() {
            ctx.swap.release_slot(slot);
        }
    }
}
