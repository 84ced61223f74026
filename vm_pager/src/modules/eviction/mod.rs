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

mod clock;
mod fifo;

pub use clock::ClockEvictionModule;
pub use fifo::FifoEvictionModule;

use crate::FrameNumber;

/// View of the frame table that an eviction policy may inspect
pub trait VictimCandidates {
    /// Number of frames in the pool
    fn frame_count(&self) -> usize;

    /// Is `frame` owned by a page and not pinned?
    fn is_evictable(&self, frame: FrameNumber) -> bool;

    /// Returns the accessed bit of the page that owns `frame` and clears it
    fn take_accessed(&mut self, frame: FrameNumber) -> bool;
}

/// Decides which resident page has to give up its frame if the pool is empty
pub trait EvictionModule {
    fn new(frame_count: usize) -> Self;

    /// `frame` was handed to a new page
    fn frame_acquired(&mut self, _frame: FrameNumber) {}

    /// `frame` went back to the free list
    fn frame_released(&mut self, _frame: FrameNumber) {}

    /// Picks a frame to evict.
    ///
    /// Returns `None` if no frame is evictable at all.
    fn select_victim<C: VictimCandidates>(&mut self, candidates: &mut C) -> Option<FrameNumber>;
}
