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

use std::collections::VecDeque;

use super::{EvictionModule, VictimCandidates};
use crate::FrameNumber;

/// Evicts the frame that was handed out the longest time ago
pub struct FifoEvictionModule {
    queue: VecDeque<FrameNumber>,
}

impl EvictionModule for FifoEvictionModule {
    fn new(frame_count: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(frame_count),
        }
    }

    fn frame_acquired(&mut self, frame: FrameNumber) {
        self.queue.push_back(frame);
    }

    fn frame_released(&mut self, frame: FrameNumber) {
        self.queue.retain(|f| *f != frame);
    }

    fn select_victim<C: VictimCandidates>(&mut self, candidates: &mut C) -> Option<FrameNumber> {
        let pos = self
            .queue
            .iter()
            .position(|frame| candidates.is_evictable(*frame))?;

        // the frame gets acquired again by its next owner
        self.queue.remove(pos)
    }
}
