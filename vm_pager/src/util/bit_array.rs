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

use super::div_ceil;

/// Fixed size bitmap. A set bit means "in use".
pub(crate) struct BitArray {
    arr: Vec<u8>,
    bit_cnt: usize,
}

impl BitArray {
    pub(crate) fn new(bit_cnt: usize) -> Self {
        BitArray {
            arr: vec![0; div_ceil(bit_cnt, 8)],
            bit_cnt,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bit_cnt
    }

    pub(crate) fn set(&mut self, value: bool, index: usize) {
        debug_assert!(index < self.bit_cnt, "index {} out of bounds", index);
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = &mut self.arr[arr_index];
        if value {
            // set bit
            *item |= 1u8 << internal_index;
        } else {
            // unset bit
            *item &= !(1u8 << internal_index);
        }
    }

    pub(crate) fn is_set(&self, index: usize) -> bool {
        debug_assert!(index < self.bit_cnt, "index {} out of bounds", index);
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = self.arr[arr_index];
        (item & (1u8 << internal_index)) != 0
    }

    /// Finds the first unset bit, sets it and returns its index
    pub(crate) fn scan_and_set(&mut self) -> Option<usize> {
        for (arr_index, item) in self.arr.iter_mut().enumerate() {
            if *item == u8::MAX {
                continue;
            }

            let internal_index = item.trailing_ones() as usize;
            let index = arr_index * 8 + internal_index;
            if index >= self.bit_cnt {
                // only padding bits left
                return None;
            }

            *item |= 1u8 << internal_index;
            return Some(index);
        }

        None
    }

    /// Number of set bits
    pub(crate) fn count_set(&self) -> usize {
        self.arr.iter().map(|item| item.count_ones() as usize).sum()
    }
}
