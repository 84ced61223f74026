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

use rand::{rngs::SmallRng, Rng, RngCore, SeedableRng};

use super::{assert_all_released, get_test_vm_with, user_page};
use crate::{
    modules::eviction::{ClockEvictionModule, EvictionModule, FifoEvictionModule},
    VmType, PAGE_SIZE,
};

const PAGES: usize = 24;
const ITERATIONS: usize = 1500;

/// Random reads and writes across page boundaries, checked against a plain copy of the memory
fn random_access_against_shadow<E: EvictionModule>(seed: u64) {
    let vm = get_test_vm_with::<E>(6, 2 * PAGES);
    let mut rand = SmallRng::seed_from_u64(seed);
    vm.create_process(1).unwrap();

    for i in 0..PAGES {
        vm.alloc_page(1, VmType::Anon, user_page(i), true).unwrap();
    }
    let mut shadow = vec![0u8; PAGES * PAGE_SIZE];

    for _ in 0..ITERATIONS {
        let offset = rand.gen_range(0..shadow.len());
        let len = rand.gen_range(1..=(2 * PAGE_SIZE).min(shadow.len() - offset));
        let addr = user_page(0).add(offset);

        if rand.gen_bool(0.5) {
            let mut data = vec![0u8; len];
            rand.fill_bytes(&mut data);
            vm.write_user(1, addr, &data).unwrap();
            shadow[offset..offset + len].copy_from_slice(&data);
        } else {
            let mut buf = vec![0u8; len];
            vm.read_user(1, addr, &mut buf).unwrap();
            assert_eq!(buf, &shadow[offset..offset + len], "mismatch at offset {}", offset);
        }
    }

    let stats = vm.stats().unwrap();
    assert!(stats.evictions > 0);
    assert_eq!(stats.frames_free, 0);

    // a forked copy sees exactly the same memory
    vm.fork(1, 2).unwrap();
    vm.exit_process(1).unwrap();

    let mut buf = vec![0u8; shadow.len()];
    vm.read_user(2, user_page(0), &mut buf).unwrap();
    assert_eq!(buf, shadow);

    vm.exit_process(2).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_stress_clock() {
    random_access_against_shadow::<ClockEvictionModule>(1234567890123456789);
}

#[test]
fn test_stress_fifo() {
    random_access_against_shadow::<FifoEvictionModule>(9876543210987654321);
}
