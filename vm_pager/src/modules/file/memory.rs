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

use std::sync::Arc;

use spin::Mutex;

use super::BackingFileModule;

/// File whose content lives in RAM.
///
/// Handles created with `reopen` share the same content, just like multiple
/// open files share one inode.
pub struct MemFileModule {
    inode: Arc<Mutex<Vec<u8>>>,

    /// reopens that may still succeed, shared by all handles. `None` means unlimited.
    reopens_left: Arc<Mutex<Option<usize>>>,
}

impl MemFileModule {
    pub fn new(content: &[u8]) -> Self {
        Self {
            inode: Arc::new(Mutex::new(content.to_vec())),
            reopens_left: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a copy of the current file content
    pub fn content(&self) -> Vec<u8> {
        self.inode.lock().clone()
    }

    /// Shrinks or grows (zero filled) the file
    pub fn set_len(&self, len: usize) {
        self.inode.lock().resize(len, 0);
    }

    /// Lets the next `succeeding` reopens of any handle succeed and every
    /// following one fail. `None` makes reopening always succeed again.
    pub fn set_reopen_failing(&self, succeeding: Option<usize>) {
        *self.reopens_left.lock() = succeeding;
    }

    /// Number of handles that are currently open for this file
    pub fn open_handles(&self) -> usize {
        Arc::strong_count(&self.inode)
    }
}

impl BackingFileModule for MemFileModule {
    fn reopen(&self) -> Result<Self, ()> {
        if let Some(left) = self.reopens_left.lock().as_mut() {
            if *left == 0 {
                return Err(());
            }
            *left -= 1;
        }

        Ok(Self {
            inode: self.inode.clone(),
            reopens_left: self.reopens_left.clone(),
        })
    }

    fn read_at(&mut self, offset: usize, dest: &mut [u8]) -> Result<usize, ()> {
        let data = self.inode.lock();
        if offset >= data.len() {
            return Ok(0);
        }

        let cnt = dest.len().min(data.len() - offset);
        dest[..cnt].copy_from_slice(&data[offset..offset + cnt]);
        Ok(cnt)
    }

    fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<usize, ()> {
        let mut data = self.inode.lock();
        if offset >= data.len() {
            return Ok(0);
        }

        let cnt = src.len().min(data.len() - offset);
        data[offset..offset + cnt].copy_from_slice(&src[..cnt]);
        Ok(cnt)
    }

    fn len(&self) -> usize {
        self.inode.lock().len()
    }
}
