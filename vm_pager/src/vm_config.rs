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

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Layout and sizing of the virtual memory subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VMConfig {
    /// How many physical frames the user pool holds
    pub frame_count: usize,

    /// Highest user stack address (exclusive); the stack grows down from here
    pub stack_top: usize,

    /// How far below `stack_top` the stack may grow
    pub max_stack_size: usize,

    /// First address of kernel space; user faults at or above it are invalid
    pub kernel_base: usize,

    /// How far below the stack pointer an access may fault and still count as a push
    pub stack_slack: usize,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            frame_count: 64,
            stack_top: 0x4748_0000,
            max_stack_size: 1 << 20,
            kernel_base: 0x80_0400_0000,
            stack_slack: 8,
        }
    }
}

impl VMConfig {
    /// Lowest address the stack may reach
    pub(crate) fn stack_limit(&self) -> usize {
        self.stack_top.saturating_sub(self.max_stack_size)
    }
}
