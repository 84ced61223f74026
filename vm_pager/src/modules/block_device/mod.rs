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

mod file_device;
mod memory;

pub use file_device::FileBlockDeviceModule;
pub use memory::MemBlockDeviceModule;

/// Size of one device sector in bytes
pub const SECTOR_SIZE: usize = 512;

/// A sector addressed block device, e.g. the swap disk
pub trait BlockDeviceModule {
    /// Returns how many sectors this device holds
    fn sector_count(&self) -> usize;

    /// Reads sector `sector` into `dest`, which is exactly `SECTOR_SIZE` bytes long.
    ///
    /// If this call fails, it could be that already some data was written to `dest`.
    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), ()>;

    /// Writes `src`, which is exactly `SECTOR_SIZE` bytes long, to sector `sector`
    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), ()>;
}
