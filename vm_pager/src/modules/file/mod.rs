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

mod host;
mod memory;

pub use host::HostFileModule;
pub use memory::MemFileModule;

/// An open file of the kernel's filesystem.
///
/// Dropping a handle closes it.
pub trait BackingFileModule: Sized {
    /// Opens a new, independent handle to the same file.
    ///
    /// Closing either handle leaves the other one usable.
    fn reopen(&self) -> Result<Self, ()>;

    /// Reads up to `dest.len()` bytes starting at `offset`.
    ///
    /// Returns the amount of bytes read, which is less than requested at the end of the file.
    fn read_at(&mut self, offset: usize, dest: &mut [u8]) -> Result<usize, ()>;

    /// Writes `src` starting at `offset` without growing the file.
    ///
    /// Returns the amount of bytes written.
    fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<usize, ()>;

    /// Returns the size of the file in bytes
    fn len(&self) -> usize;
}
