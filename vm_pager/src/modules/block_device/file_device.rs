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

use std::{
    fs::{remove_file, File},
    io::{Read, Seek, Write},
    mem::ManuallyDrop,
    path::Path,
};

use super::{BlockDeviceModule, SECTOR_SIZE};

/// Block device backed by a file on the host. The file is removed again on drop.
pub struct FileBlockDeviceModule {
    file: ManuallyDrop<File>,
    file_path: String,
    sector_count: usize,
}

impl FileBlockDeviceModule {
    /// Creates a new device file with `sector_count` zeroed sectors
    pub fn new(filepath: String, sector_count: usize) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(filepath.clone())?;

        file.set_len((sector_count * SECTOR_SIZE) as u64)?;

        Ok(Self {
            file: ManuallyDrop::new(file),
            file_path: filepath,
            sector_count,
        })
    }
}

impl BlockDeviceModule for FileBlockDeviceModule {
    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn read_sector(&mut self, sector: usize, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert!(
            sector < self.sector_count && dest.len() == SECTOR_SIZE,
            "illegal access, sector: {}, len: {}, sector_count: {}",
            sector,
            dest.len(),
            self.sector_count
        );

        self.file
            .seek(std::io::SeekFrom::Start((sector * SECTOR_SIZE) as u64))
            .map_err(|_| ())?;
        self.file.read_exact(dest).map_err(|_| ())?;

        Ok(())
    }

    fn write_sector(&mut self, sector: usize, src: &[u8]) -> Result<(), ()> {
        debug_assert!(
            sector < self.sector_count && src.len() == SECTOR_SIZE,
            "illegal access, sector: {}, len: {}, sector_count: {}",
            sector,
            src.len(),
            self.sector_count
        );

        self.file
            .seek(std::io::SeekFrom::Start((sector * SECTOR_SIZE) as u64))
            .map_err(|_| ())?;
        self.file.write_all(src).map_err(|_| ())?;

        Ok(())
    }
}

impl Drop for FileBlockDeviceModule {
    fn drop(&mut self) {
        // drop and close file before removing
        // note that after this call, file should never be accessed again...
        unsafe {
            ManuallyDrop::drop(&mut self.file);
        }

        if Path::new(self.file_path.as_str()).exists() {
            let _ = remove_file(self.file_path.as_str());
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::super::test::{test_block_device_normal, BLOCK_DEVICE_TEST_SECTORS};
    use super::FileBlockDeviceModule;

    #[test]
    fn test_file_block_device_normal() {
        let device = FileBlockDeviceModule::new(
            "/tmp/test_file_block_device_normal.tmp".into(),
            BLOCK_DEVICE_TEST_SECTORS,
        )
        .unwrap();
        test_block_device_normal(device);
    }

    #[test]
    fn test_file_block_device_removed_on_drop() {
        let path = "/tmp/test_file_block_device_removed_on_drop.tmp";
        let device = FileBlockDeviceModule::new(path.into(), 2).unwrap();
        assert!(Path::new(path).exists());

        drop(device);
        assert!(!Path::new(path).exists());
    }
}
