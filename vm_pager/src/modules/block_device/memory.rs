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

use super::{BlockDeviceModule, SECTOR_SIZE};

/// Block device that lives in RAM.
///
/// Can be switched into a failing state to simulate a broken disk.
pub struct MemBlockDeviceModule {
    data: Vec<u8>,
    failing: bool,
}

impl MemBlockDeviceModule {
    pub fn new(sector_count: usize) -> Self {
        Self {
            data: vec![0; sector_count * SECTOR_SIZE],
            failing: false,
        }
    }

    /// Makes every following read and write fail (or succeed again)
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }
}

impl BlockDeviceModule for MemBlockDeviceModule {
    fn sector_count(&self) -> usize {
        self.data.len() / SECTOR_SIZE
    }

    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(dest.len(), SECTOR_SIZE);
        if self.failing || sector >= self.sector_count() {
            return Err(());
        }

        let start = sector * SECTOR_SIZE;
        dest.copy_from_slice(&self.data[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), ()> {
        debug_assert_eq!(src.len(), SECTOR_SIZE);
        if self.failing || sector >= self.sector_count() {
            return Err(());
        }

        let start = sector * SECTOR_SIZE;
        self.data[start..start + SECTOR_SIZE].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::super::test::{test_block_device_normal, BLOCK_DEVICE_TEST_SECTORS};
    use super::super::{BlockDeviceModule, SECTOR_SIZE};
    use super::MemBlockDeviceModule;

    #[test]
    fn test_mem_block_device_normal() {
        test_block_device_normal(MemBlockDeviceModule::new(BLOCK_DEVICE_TEST_SECTORS));
    }

    #[test]
    fn test_mem_block_device_failing() {
        let mut device = MemBlockDeviceModule::new(4);
        let mut sector = [0u8; SECTOR_SIZE];

        device.set_failing(true);
        assert!(device.write_sector(0, &sector).is_err());
        assert!(device.read_sector(0, &mut sector).is_err());

        device.set_failing(false);
        assert!(device.write_sector(0, &sector).is_ok());

        // out of range sectors are rejected
        assert!(device.read_sector(4, &mut sector).is_err());
    }
}
