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

use log::{info, trace};
use static_assertions::const_assert;

use crate::{
    modules::block_device::{BlockDeviceModule, SECTOR_SIZE},
    util::bit_array::BitArray,
    VmError, PAGE_SIZE,
};

/// How many device sectors one swap slot spans
pub(crate) const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

const_assert!(PAGE_SIZE % SECTOR_SIZE == 0);
const_assert!(SECTORS_PER_PAGE > 0);

/// Reservation of one page sized slot on the swap device.
///
/// Only the anonymous page that swapped out into it holds this value.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SwapSlot(usize);

impl SwapSlot {
    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0
    }

    #[inline]
    fn first_sector(&self) -> usize {
        self.0 * SECTORS_PER_PAGE
    }
}

/// Partitions the swap device into page sized slots
pub(crate) struct SwapManager<D: BlockDeviceModule> {
    device: D,
    used: BitArray,
}

impl<D: BlockDeviceModule> SwapManager<D> {
    pub(crate) fn new(device: D) -> Self {
        let slot_count = device.sector_count() / SECTORS_PER_PAGE;
        info!(
            "swap device: {} sectors, {} slots of {} sectors",
            device.sector_count(),
            slot_count,
            SECTORS_PER_PAGE
        );

        Self {
            device,
            used: BitArray::new(slot_count),
        }
    }

    /// Total number of slots
    pub(crate) fn slot_count(&self) -> usize {
        self.used.len()
    }

    /// Number of slots that are not reserved
    pub(crate) fn free_slots(&self) -> usize {
        self.used.len() - self.used.count_set()
    }

    pub(crate) fn reserve_slot(&mut self) -> Result<SwapSlot, VmError> {
        match self.used.scan_and_set() {
            Some(index) => {
                trace!("reserved swap slot {}", index);
                Ok(SwapSlot(index))
            }
            None => Err(VmError::SwapExhausted),
        }
    }

    pub(crate) fn release_slot(&mut self, slot: SwapSlot) {
        debug_assert!(self.used.is_set(slot.index()), "slot {} not reserved", slot.index());
        trace!("released swap slot {}", slot.index());
        self.used.set(false, slot.index());
    }

    /// Writes one page (`src` is `PAGE_SIZE` bytes) into `slot`
    pub(crate) fn write_slot(&mut self, slot: &SwapSlot, src: &[u8]) -> Result<(), ()> {
        debug_assert_eq!(src.len(), PAGE_SIZE);
        let first = slot.first_sector();
        for (i, chunk) in src.chunks_exact(SECTOR_SIZE).enumerate() {
            self.device.write_sector(first + i, chunk)?;
        }

        Ok(())
    }

    /// Reads one page out of `slot` into `dest` (`PAGE_SIZE` bytes)
    pub(crate) fn read_slot(&mut self, slot: &SwapSlot, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);
        let first = slot.first_sector();
        for (i, chunk) in dest.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            self.device.read_sector(first + i, chunk)?;
        }

        Ok(())
    }
}
