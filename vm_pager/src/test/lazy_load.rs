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

use super::{assert_all_released, get_test_vm, user_page};
use crate::{
    modules::file::{BackingFileModule, MemFileModule},
    AccessViolation, LazyLoad, LoadSegment, VirtAddr, VmError, VmType, PAGE_SIZE,
};

fn segment_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

#[test]
fn test_load_segment_is_lazy() {
    const READ_BYTES: usize = 2 * PAGE_SIZE + 500;

    let vm = get_test_vm(8, 8);
    vm.create_process(1).unwrap();

    let content = segment_content(READ_BYTES);
    let file = MemFileModule::new(&content);
    vm.load_segment(
        1,
        &file,
        LoadSegment {
            offset: 0,
            upage: user_page(0),
            read_bytes: READ_BYTES,
            zero_bytes: 4 * PAGE_SIZE - READ_BYTES,
            writable: true,
        },
    )
    .unwrap();

    // one handle per page that reads from the file
    assert_eq!(file.open_handles(), 4);
    assert_eq!(vm.stats().unwrap().frames_free, 8);
    for i in 0..4 {
        assert!(!vm.is_resident(1, user_page(i)).unwrap());
        assert_eq!(vm.page_type(1, user_page(i)).unwrap(), Some(VmType::Anon));
    }
    assert_eq!(vm.page_type(1, user_page(4)).unwrap(), None);

    // touching the second page only loads the second page
    let mut buf = [0u8; 4];
    vm.read_user(1, user_page(1).add(8), &mut buf).unwrap();
    assert_eq!(&buf, &content[PAGE_SIZE + 8..PAGE_SIZE + 12]);
    assert!(vm.is_resident(1, user_page(1)).unwrap());
    assert!(!vm.is_resident(1, user_page(0)).unwrap());
    assert_eq!(file.open_handles(), 3);

    let mut buf = vec![0xFFu8; 4 * PAGE_SIZE];
    vm.read_user(1, user_page(0), &mut buf).unwrap();
    assert_eq!(&buf[..READ_BYTES], &content[..]);
    assert!(buf[READ_BYTES..].iter().all(|x| *x == 0));
    assert_eq!(file.open_handles(), 1);

    // segment pages are anonymous, changes never reach the file
    vm.write_user(1, user_page(0), b"changed").unwrap();
    vm.exit_process(1).unwrap();
    assert_eq!(file.content(), content);
    assert_all_released(&vm);
}

#[test]
fn test_load_segment_with_offset() {
    let vm = get_test_vm(8, 8);
    vm.create_process(1).unwrap();

    let content = segment_content(3 * PAGE_SIZE);
    let file = MemFileModule::new(&content);
    vm.load_segment(
        1,
        &file,
        LoadSegment {
            offset: PAGE_SIZE,
            upage: user_page(10),
            read_bytes: PAGE_SIZE + 1,
            zero_bytes: PAGE_SIZE - 1,
            writable: false,
        },
    )
    .unwrap();

    let mut buf = vec![0u8; 2 * PAGE_SIZE];
    vm.read_user(1, user_page(10), &mut buf).unwrap();
    assert_eq!(&buf[..PAGE_SIZE + 1], &content[PAGE_SIZE..2 * PAGE_SIZE + 1]);
    assert!(buf[PAGE_SIZE + 1..].iter().all(|x| *x == 0));

    // code segments are read only
    assert_eq!(
        vm.write_user(1, user_page(10), &[0]),
        Err(VmError::InvalidAccess {
            addr: user_page(10),
            reason: AccessViolation::ReadOnly
        })
    );
    assert_all_released(&vm);
}

#[test]
fn test_load_segment_rejects_misaligned() {
    let vm = get_test_vm(4, 4);
    vm.create_process(1).unwrap();
    let file = MemFileModule::new(&segment_content(PAGE_SIZE));

    let segment = LoadSegment {
        offset: 0,
        upage: user_page(0),
        read_bytes: 100,
        zero_bytes: PAGE_SIZE - 100,
        writable: true,
    };

    for invalid in [
        LoadSegment {
            zero_bytes: 0,
            ..segment
        },
        LoadSegment {
            upage: user_page(0).add(8),
            ..segment
        },
        LoadSegment {
            offset: 8,
            ..segment
        },
        // the size wraps around to zero
        LoadSegment {
            read_bytes: usize::MAX,
            zero_bytes: 1,
            ..segment
        },
    ] {
        assert!(matches!(
            vm.load_segment(1, &file, invalid),
            Err(VmError::InvalidArgument(_))
        ));
    }

    assert!(vm.load_segment(1, &file, segment).is_ok());
    assert_eq!(
        vm.load_segment(1, &file, segment),
        Err(VmError::AlreadyMapped { addr: user_page(0) })
    );

    vm.exit_process(1).unwrap();
    assert_eq!(file.open_handles(), 1);
}

#[test]
fn test_lazy_load_io_failure_kills_process() {
    let vm = get_test_vm(4, 4);
    vm.create_process(1).unwrap();
    vm.create_process(2).unwrap();

    let file = MemFileModule::new(&segment_content(2 * PAGE_SIZE));
    for pid in [1, 2] {
        vm.load_segment(
            pid,
            &file,
            LoadSegment {
                offset: 0,
                upage: user_page(0),
                read_bytes: 2 * PAGE_SIZE,
                zero_bytes: 0,
                writable: true,
            },
        )
        .unwrap();
    }
    vm.read_user(2, user_page(0), &mut [0u8; 1]).unwrap();

    // the file shrinks behind the back of the loader
    file.set_len(PAGE_SIZE);

    assert_eq!(
        vm.read_user(1, user_page(1), &mut [0u8; 1]),
        Err(VmError::Io { addr: user_page(1) })
    );
    assert_eq!(vm.stats().unwrap().processes, 1);

    // the other process is not affected as long as it stays in the file
    let mut buf = [0u8; 1];
    vm.read_user(2, user_page(0), &mut buf).unwrap();
    vm.exit_process(2).unwrap();

    assert_eq!(file.open_handles(), 1);
    assert_all_released(&vm);
}

#[test]
fn test_alloc_page() {
    let vm = get_test_vm(4, 4);
    vm.create_process(1).unwrap();

    vm.alloc_page(1, VmType::Anon, user_page(0), true).unwrap();
    assert_eq!(
        vm.alloc_page(1, VmType::Anon, user_page(0).add(100), true),
        Err(VmError::AlreadyMapped { addr: user_page(0) })
    );
    assert!(matches!(
        vm.alloc_page(1, VmType::File, user_page(1), true),
        Err(VmError::InvalidArgument(_))
    ));
    assert!(matches!(
        vm.alloc_page(1, VmType::Anon, VirtAddr::new(0), true),
        Err(VmError::InvalidAccess {
            reason: AccessViolation::NullAddress,
            ..
        })
    ));
    assert_eq!(
        vm.alloc_page(7, VmType::Anon, user_page(0), true),
        Err(VmError::NoSuchProcess(7))
    );

    // anonymous pages start zeroed
    let mut buf = vec![0xFFu8; PAGE_SIZE];
    vm.read_user(1, user_page(0), &mut buf).unwrap();
    assert!(buf.iter().all(|x| *x == 0));

    // a mapped page created by hand reports its target type before the first fault
    let file = MemFileModule::new(b"by hand");
    vm.alloc_page_with_initializer(
        1,
        user_page(5),
        false,
        LazyLoad::Mapped {
            file: file.reopen().unwrap(),
            offset: 0,
            length: 7,
        },
    )
    .unwrap();
    assert_eq!(vm.page_type(1, user_page(5)).unwrap(), Some(VmType::File));

    let mut buf = [0u8; 7];
    vm.read_user(1, user_page(5), &mut buf).unwrap();
    assert_eq!(&buf, b"by hand");

    vm.exit_process(1).unwrap();
    assert_all_released(&vm);
}

#[test]
fn test_claim_page() {
    let vm = get_test_vm(4, 4);
    vm.create_process(1).unwrap();
    assert!(vm.create_process(1).is_err());

    vm.alloc_page(1, VmType::Anon, user_page(0), true).unwrap();
    vm.claim_page(1, user_page(0).add(12)).unwrap();
    assert!(vm.is_resident(1, user_page(0)).unwrap());
    assert_eq!(vm.stats().unwrap().frames_free, 3);

    // claiming a resident page changes nothing
    vm.claim_page(1, user_page(0)).unwrap();
    assert_eq!(vm.stats().unwrap().frames_free, 3);

    // claiming does not count as a fault and does not kill the process
    assert_eq!(
        vm.claim_page(1, user_page(1)),
        Err(VmError::InvalidAccess {
            addr: user_page(1),
            reason: AccessViolation::Unmapped
        })
    );
    assert_eq!(vm.stats().unwrap().page_faults, 0);
    assert_eq!(vm.stats().unwrap().processes, 1);

    vm.exit_process(1).unwrap();
    assert_eq!(vm.exit_process(1), Err(VmError::NoSuchProcess(1)));
    assert_all_released(&vm);
}
