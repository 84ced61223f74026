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

use log::debug;

use crate::{
    error::AccessViolation,
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    page::{LazyLoad, Page},
    vm::{Pid, VirtualMemoryInner},
    VirtAddr, VmError,
};

/// A page fault as reported by the trap handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    /// faulting address
    pub addr: VirtAddr,

    /// the access was a write
    pub is_write: bool,

    /// the page was mapped but the access was not allowed
    pub is_present: bool,

    /// user stack pointer at the time of the fault
    pub rsp: VirtAddr,
}

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemoryInner<D, F, P, E>
{
    pub(crate) fn handle_page_fault(&mut self, pid: Pid, fault: PageFault) -> Result<(), VmError> {
        self.counters.page_faults += 1;
        let addr = fault.addr;

        if let Err(err) = self.check_user_addr(addr) {
            debug!("process {} faults at {:?}: invalid address", pid, addr);
            return Err(err);
        }

        match self.space(pid)?.spt.find(addr) {
            Some(page) => {
                if fault.is_write && !page.writable {
                    debug!("process {} writes to read-only {:?}", pid, addr);
                    return Err(VmError::invalid_access(addr, AccessViolation::ReadOnly));
                }
                if page.is_resident() {
                    // spurious, the mapping is already there
                    return Ok(());
                }
                debug!("process {} faults at {:?}: demand fetch", pid, addr);
            }
            None => {
                if !self.is_stack_access(&fault) {
                    debug!("process {} faults at {:?}: no page", pid, addr);
                    return Err(VmError::invalid_access(addr, AccessViolation::Unmapped));
                }

                debug!("process {} faults at {:?}: stack growth", pid, addr);
                self.grow_stack(pid, addr)?;
            }
        }

        self.claim_page(pid, addr)
    }

    /// Is `fault` a push or an access slightly below the stack pointer inside the stack area?
    fn is_stack_access(&self, fault: &PageFault) -> bool {
        let addr = fault.addr.as_usize();
        addr < self.config.stack_top
            && addr >= self.config.stack_limit()
            && addr.saturating_add(self.config.stack_slack) >= fault.rsp.as_usize()
    }

    fn grow_stack(&mut self, pid: Pid, addr: VirtAddr) -> Result<(), VmError> {
        let mut page = Page::new_uninit(addr.page_round_down(), true, LazyLoad::Zero);
        page.is_stack = true;
        self.alloc_page(pid, page)
    }
}
