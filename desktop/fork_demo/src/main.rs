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

use std::fs;

use env_logger::{Builder, Env};
use vm_pager::{
    modules::{block_device::FileBlockDeviceModule, file::HostFileModule},
    LoadSegment, PageFault, VMConfig, VirtAddr, VirtualMemory, PAGE_SIZE,
};

const EXECUTABLE_PATH: &str = "/tmp/vm_fork_demo.bin";
const DATA_PATH: &str = "/tmp/vm_fork_demo.data";
const SWAP_PATH: &str = "/tmp/vm_fork_demo.swap";

const CODE_BASE: usize = 0x40_0000;
const MAP_BASE: usize = 0x1000_0000;

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Info)
        .format_module_path(false)
        .init();

    let executable: Vec<u8> = (0..2 * PAGE_SIZE + 300).map(|i| (i % 251) as u8).collect();
    fs::write(EXECUTABLE_PATH, &executable).unwrap();
    fs::write(DATA_PATH, b"hello from the data file").unwrap();

    let swap = FileBlockDeviceModule::new(SWAP_PATH.to_string(), 256).unwrap();
    let config = VMConfig {
        frame_count: 8,
        ..Default::default()
    };
    let vm: VirtualMemory<FileBlockDeviceModule, HostFileModule> = VirtualMemory::new(config, swap);

    // "exec" the parent
    let executable = HostFileModule::open(EXECUTABLE_PATH).unwrap();
    vm.create_process(1).unwrap();
    vm.load_segment(
        1,
        &executable,
        LoadSegment {
            offset: 0,
            upage: VirtAddr::new(CODE_BASE),
            read_bytes: 2 * PAGE_SIZE + 300,
            zero_bytes: PAGE_SIZE - 300,
            writable: false,
        },
    )
    .unwrap();
    drop(executable);
    vm.setup_stack(1).unwrap();

    let data = HostFileModule::open(DATA_PATH).unwrap();
    let map = vm
        .mmap(1, VirtAddr::new(MAP_BASE), PAGE_SIZE, true, &data, 0)
        .unwrap();
    drop(data);

    // push a few frames worth of stack, more than fits into memory
    let stack_top = vm.stack_pointer(1).unwrap().as_usize();
    let rsp = VirtAddr::new(stack_top - 12 * PAGE_SIZE);
    vm.set_stack_pointer(1, rsp).unwrap();
    vm.write_user(1, rsp, &vec![0x5A; 12 * PAGE_SIZE]).unwrap();

    let mut code = [0u8; 8];
    vm.read_user(1, VirtAddr::new(CODE_BASE + PAGE_SIZE), &mut code)
        .unwrap();
    println!("parent code bytes: {:?}", code);

    vm.write_user(1, map, b"HELLO").unwrap();

    vm.fork(1, 2).unwrap();
    vm.write_user(2, map.add(6), b"FROM").unwrap();

    let mut text = [0u8; 24];
    vm.read_user(1, map, &mut text).unwrap();
    println!("parent sees: {}", String::from_utf8_lossy(&text));
    vm.read_user(2, map, &mut text).unwrap();
    println!("child sees:  {}", String::from_utf8_lossy(&text));

    // the child writes to its code segment and gets killed
    let res = vm.handle_page_fault(
        2,
        PageFault {
            addr: VirtAddr::new(CODE_BASE),
            is_write: true,
            is_present: true,
            rsp,
        },
    );
    println!("child write to code: {:?}", res);

    vm.munmap(1, map).unwrap();
    println!(
        "data file after munmap: {}",
        String::from_utf8_lossy(&fs::read(DATA_PATH).unwrap())
    );

    println!("{}", serde_json::to_string_pretty(&vm.stats().unwrap()).unwrap());
    vm.exit_process(1).unwrap();
    println!("{}", serde_json::to_string_pretty(&vm.stats().unwrap()).unwrap());

    let _ = fs::remove_file(EXECUTABLE_PATH);
    let _ = fs::remove_file(DATA_PATH);
}
