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

//! Virtual memory manager for a single-address-space-per-process kernel.
//!
//! Pages are reserved lazily and materialize on their first fault. Anonymous
//! memory is swapped to a block device when frames run out, file mappings
//! write dirty pages back to their file, stacks grow on demand and a whole
//! address space can be duplicated for `fork`.
//!
//! Every collaborator the kernel provides (block device, page table, files,
//! eviction policy) is a module trait under [`modules`], so the manager runs
//! on the host just as well as inside a kernel.

mod address;
mod address_space;
mod error;
mod fork;
mod frame;
mod loader;
mod mmap;
mod page;
mod page_fault;
mod supplemental_page_table;
mod swap;
mod util;
mod vm;
mod vm_config;

#[cfg(test)]
mod test;

pub mod modules;

pub use address::{PhysAddr, VirtAddr, PAGE_SIZE};
pub use error::{AccessViolation, VmError};
pub use frame::FrameNumber;
pub use loader::LoadSegment;
pub use page::{LazyLoad, VmType};
pub use page_fault::PageFault;
pub use vm::{Pid, VirtualMemory, VmStats};
pub use vm_config::VMConfig;
