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

use rand::{rngs::SmallRng, SeedableRng};

use super::{assert_all_released, get_test_vm, rand_page, user_page};
use crate::{
    modules::file::{BackingFileModule, MemFileModule},
    LazyLoad, LoadSegment, VirtAddr, VmError, VmType, PAGE_SIZE,
};

#[test]
fn test_fork_independence() {
    const SEED: u64 = 3141592653589793238;

    let vm = get_test_vm(16, 16);
    let mut rand = SmallRng::seed_from_u64(SEED);
    vm.create_process(1).unwrap();
    vm.setup_stack(1).unwrap();

    let stack_top = vm.config().unwrap().stack_top;
    let stack_slot = VirtAddr::new(stack_top - 64);
    vm.write_user(1, stack_slot, b"stack data").unwrap();
    vm.set_stack_pointer(1, stack_slot).unwrap();

    let mut check_state = Vec::new();
    for i in 0..3 {
        vm.alloc_page(1, VmType::Anon, user_page(i), true).unwrap();
        let data = rand_page(&mut rand);
        vm.write_user(1, user_page(i), &data).unwrap();
        check_state.push(data);
    }
    // never touched, still uninitialized
    vm.alloc_page(1, VmType::Anon, user_page(3), true).unwrap();

    vm.fork(1, 2).unwrap();
    assert_eq!(vm.stack_pointer(2).unwrap(), stack_slot);
    assert!(vm.is_resident(2, user_page(3)).unwrap());

    for (i, expected) in check_state.iter().enumerate() {
        let mut buf = vec![0u8; PAGE_SIZE];
        vm.read_user(2, user_page(i), &mut buf).unwrap();
        assert_eq!(&buf, expected);
    }
    let mut buf = [0u8; 10];
    vm.read_user(2, stack_slot, &mut buf).unwrap();
    assert_eq!(&buf, b"stack data");

    // writes of one process are invisible to the other
    vm.write_user(2, user_page(0), b"child").unwrap();
    vm.write_user(1, user_page(1), b"parent").unwrap();

    let mut buf = [0u8; 6];
    vm.read_user(1, user_page(0), &mut buf[..5]).unwrap();
    assert_eq!(&buf[..5], &check_state[0][..5]);
    vm.read_user(2, user_page(1), &mut buf).unwrap();
    assert_eq!(&buf, &check_state[1][..6]);

    // the child keeps running after the parent is gone
    vm.exit_process(1).unwrap();
    let mut buf = [0u8; 5];
    vm.read_user(2, user_page(0), &mut buf).unwrap();
    assert_eq!(&buf, b"child");

    vm.exit_process(2).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_fork_with_swapped_pages() {
    const SEED: u64 = 2718281828459045235;
    const PAGES: usize = 6;

    let vm = get_test_vm(4, 32);
    let mut rand = SmallRng::seed_from_u64(SEED);
    vm.create_process(1).unwrap();

    let mut check_state = Vec::new();
    for i in 0..PAGES {
        vm.alloc_page(1, VmType::Anon, user_page(i), true).unwrap();
        let data = rand_page(&mut rand);
        vm.write_user(1, user_page(i), &data).unwrap();
        check_state.push(data);
    }
    assert!(vm.stats().unwrap().swap_outs > 0);

    vm.fork(1, 2).unwrap();

    for pid in [2, 1] {
        for (i, expected) in check_state.iter().enumerate() {
            let mut buf = vec![0u8; PAGE_SIZE];
            vm.read_user(pid, user_page(i), &mut buf).unwrap();
            assert_eq!(&buf, expected, "page {} of process {}", i, pid);
        }
    }

    vm.exit_process(2).unwrap();
    vm.exit_process(1).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_fork_mappings() {
    let vm = get_test_vm(8, 8);
    vm.create_process(1).unwrap();

    let file = MemFileModule::new(&[b'x'; 2 * PAGE_SIZE]);
    let addr = vm.mmap(1, user_page(0), 2 * PAGE_SIZE, true, &file, 0).unwrap();
    vm.write_user(1, addr, b"parent").unwrap();

    vm.fork(1, 2).unwrap();
    assert_eq!(vm.page_type(2, addr).unwrap(), Some(VmType::File));

    let mut buf = [0u8; 6];
    vm.read_user(2, addr, &mut buf).unwrap();
    assert_eq!(&buf, b"parent");
    vm.read_user(2, addr.add(PAGE_SIZE), &mut buf).unwrap();
    assert_eq!(&buf, b"xxxxxx");

    // the child owns its own handles and can unmap on its own
    vm.munmap(2, addr).unwrap();
    assert_eq!(vm.page_type(2, addr).unwrap(), None);
    assert_eq!(vm.page_type(1, addr).unwrap(), Some(VmType::File));

    vm.munmap(1, addr).unwrap();
    assert_eq!(&file.content()[..6], b"parent");

    vm.exit_process(1).unwrap();
    vm.exit_process(2).unwrap();
    assert_eq!(file.open_handles(), 1);
    assert_all_released(&vm);
}

#[test]
fn test_fork_lazy_segment() {
    let vm = get_test_vm(8, 8);
    vm.create_process(1).unwrap();

    let content: Vec<u8> = (0..PAGE_SIZE + 100).map(|i| (i % 7) as u8).collect();
    let file = MemFileModule::new(&content);
    vm.load_segment(
        1,
        &file,
        LoadSegment {
            offset: 0,
            upage: user_page(0),
            read_bytes: content.len(),
            zero_bytes: 2 * PAGE_SIZE - content.len(),
            writable: false,
        },
    )
    .unwrap();

    vm.fork(1, 2).unwrap();
    assert!(vm.is_resident(1, user_page(1)).unwrap());

    let mut buf = vec![0xFFu8; 2 * PAGE_SIZE];
    vm.read_user(2, user_page(0), &mut buf).unwrap();
    assert_eq!(&buf[..content.len()], &content[..]);
    assert!(buf[content.len()..].iter().all(|x| *x == 0));

    // the segment handles are closed once every page was loaded
    assert_eq!(file.open_handles(), 1);

    vm.exit_process(1).unwrap();
    vm.exit_process(2).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_fork_failure_tears_down_child() {
    let vm = get_test_vm(8, 8);
    vm.create_process(1).unwrap();
    vm.create_process(3).unwrap();

    let file = MemFileModule::new(&[1u8; PAGE_SIZE]);
    vm.alloc_page_with_initializer(
        1,
        user_page(0),
        true,
        LazyLoad::Segment {
            file: file.reopen().unwrap(),
            offset: 0,
            read_bytes: PAGE_SIZE,
        },
    )
    .unwrap();
    vm.alloc_page(1, VmType::Anon, user_page(1), true).unwrap();
    vm.write_user(1, user_page(1), &[9]).unwrap();

    // the segment can not be read anymore
    file.set_len(10);

    assert_eq!(vm.fork(1, 2), Err(VmError::Io { addr: user_page(0) }));
    assert_eq!(vm.fork(1, 3), Err(VmError::ProcessExists(3)));
    assert_eq!(vm.fork(4, 5), Err(VmError::NoSuchProcess(4)));

    // only the parent and the other process are left, the parent is unharmed
    assert_eq!(vm.stats().unwrap().processes, 2);
    assert_eq!(vm.stack_pointer(2), Err(VmError::NoSuchProcess(2)));
    let mut buf = [0u8];
    vm.read_user(1, user_page(1), &mut buf).unwrap();
    assert_eq!(buf[0], 9);

    vm.exit_process(1).unwrap();
    vm.exit_process(3).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_fork_with_single_frame() {
    let vm = get_test_vm(1, 4);
    vm.create_process(1).unwrap();

    // an empty address space needs no frame to copy
    vm.fork(1, 2).unwrap();
    vm.exit_process(2).unwrap();

    vm.alloc_page(1, VmType::Anon, user_page(0), true).unwrap();
    vm.write_user(1, user_page(0), &[3; 16]).unwrap();

    assert!(matches!(vm.fork(1, 2), Err(VmError::InvalidArgument(_))));
    assert_eq!(vm.stack_pointer(2), Err(VmError::NoSuchProcess(2)));
    assert_eq!(vm.stats().unwrap().processes, 1);

    let mut buf = [0u8; 16];
    vm.read_user(1, user_page(0), &mut buf).unwrap();
    assert_eq!(buf, [3; 16]);

    vm.exit_process(1).unwrap();
    assert_all_released(&vm);
}
