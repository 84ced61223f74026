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

mod soft;

pub use soft::SoftPageTableModule;

use crate::{PhysAddr, VirtAddr};

/// The hardware page table of one process.
///
/// Holds only resident translations. All functions accept any address inside
/// a page and act on the whole page.
pub trait PageTableModule {
    /// Creates an empty page table
    fn new() -> Self;

    /// Maps the page of `va` to the frame at `pa`.
    ///
    /// Fails if the page is already mapped.
    fn install(&mut self, va: VirtAddr, pa: PhysAddr, writable: bool) -> Result<(), ()>;

    /// Removes the mapping of the page of `va`, if there is one
    fn clear(&mut self, va: VirtAddr);

    /// Translates `va` to a physical address including the page offset
    fn resolve(&self, va: VirtAddr) -> Option<PhysAddr>;

    fn is_writable(&self, va: VirtAddr) -> bool;

    /// Was the page written since its dirty bit was last cleared?
    fn is_dirty(&self, va: VirtAddr) -> bool;

    fn set_dirty(&mut self, va: VirtAddr, dirty: bool);

    /// Was the page accessed since its accessed bit was last cleared?
    fn is_accessed(&self, va: VirtAddr) -> bool;

    fn set_accessed(&mut self, va: VirtAddr, accessed: bool);
}
