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
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use super::BackingFileModule;

/// File on the host filesystem
pub struct HostFileModule {
    file: File,
    path: PathBuf,
}

impl HostFileModule {
    /// Opens an existing file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::options().read(true).write(true).open(&path)?;

        Ok(Self { file, path })
    }
}

impl BackingFileModule for HostFileModule {
    fn reopen(&self) -> Result<Self, ()> {
        Self::open(&self.path).map_err(|_| ())
    }

    fn read_at(&mut self, offset: usize, dest: &mut [u8]) -> Result<usize, ()> {
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|_| ())?;

        let mut total = 0;
        while total < dest.len() {
            match self.file.read(&mut dest[total..]) {
                Ok(0) => break,
                Ok(cnt) => total += cnt,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(()),
            }
        }

        Ok(total)
    }

    fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<usize, ()> {
        let len = self.len();
        if offset >= len {
            return Ok(0);
        }

        let cnt = src.len().min(len - offset);
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|_| ())?;
        self.file.write_all(&src[..cnt]).map_err(|_| ())?;

        Ok(cnt)
    }

    fn len(&self) -> usize {
        self.file
            .metadata()
            .map(|meta| meta.len() as usize)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use std::fs::{remove_file, write};

    use super::super::test::test_backing_file_normal;
    use super::HostFileModule;

    #[test]
    fn test_host_file_normal() {
        let path = "/tmp/test_host_file_normal.tmp";
        write(path, b"hello world").unwrap();

        test_backing_file_normal(HostFileModule::open(path).unwrap());

        let _ = remove_file(path);
    }
}
