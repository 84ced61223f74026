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

use rand::{rngs::SmallRng, RngCore};

use crate::{
    modules::{
        block_device::MemBlockDeviceModule,
        eviction::{ClockEvictionModule, EvictionModule},
        file::MemFileModule,
        page_table::SoftPageTableModule,
    },
    swap::SECTORS_PER_PAGE,
    VMConfig, VirtAddr, VirtualMemory, PAGE_SIZE,
};

mod fork;
mod lazy_load;
mod stress;

pub(crate) type TestVm<E = ClockEvictionModule> =
    VirtualMemory<MemBlockDeviceModule, MemFileModule, SoftPageTableModule, E>;

/// Where tests place their heap like pages
pub(crate) const USER_BASE: usize = 0x1000_0000;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn get_test_vm(frame_count: usize, swap_slots: usize) -> TestVm {
    get_test_vm_with(frame_count, swap_slots)
}

pub(crate) fn get_test_vm_with<E: EvictionModule>(frame_count: usize, swap_slots: usize) -> TestVm<E> {
    init_logger();

    let config = VMConfig {
        frame_count,
        ..Default::default()
    };
    VirtualMemory::new(
        config,
        MemBlockDeviceModule::new(swap_slots * SECTORS_PER_PAGE),
    )
}

/// Address of the `index`th test page
pub(crate) fn user_page(index: usize) -> VirtAddr {
    VirtAddr::new(USER_BASE + index * PAGE_SIZE)
}

pub(crate) fn rand_page(rand: &mut SmallRng) -> Vec<u8> {
    let mut data = vec![0u8; PAGE_SIZE];
    rand.fill_bytes(&mut data);
    data
}

/// Checks that everything was given back
pub(crate) fn assert_all_released<E: EvictionModule>(vm: &TestVm<E>) {
    let stats = vm.stats().unwrap();
    assert_eq!(stats.frames_free, stats.frames_total);
    assert_eq!(stats.swap_slots_free, stats.swap_slots_total);
    assert_eq!(stats.processes, 0);
}
