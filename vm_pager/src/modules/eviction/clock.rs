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

use super::{EvictionModule, VictimCandidates};
use crate::FrameNumber;

/// Second chance replacement.
///
/// A hand sweeps over the frame table. Accessed frames lose their accessed bit
/// and are skipped, the first evictable frame without it is the victim.
pub struct ClockEvictionModule {
    hand: usize,
}

impl EvictionModule for ClockEvictionModule {
    fn new(_frame_count: usize) -> Self {
        Self { hand: 0 }
    }

    fn select_victim<C: VictimCandidates>(&mut self, candidates: &mut C) -> Option<FrameNumber> {
        let frame_count = candidates.frame_count();
        if frame_count == 0 {
            return None;
        }

        // after one sweep every accessed bit is cleared, so a second sweep
        // without a victim means that nothing is evictable
        for _ in 0..(2 * frame_count) {
            let frame = FrameNumber::new(self.hand % frame_count);
            self.hand = (self.hand + 1) % frame_count;

            if !candidates.is_evictable(frame) {
                continue;
            }

            if !candidates.take_accessed(frame) {
                return Some(frame);
            }
        }

        None
    }
}
