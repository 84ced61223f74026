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

use std::collections::BTreeMap;

use log::{debug, error, info, trace};
use try_lock::TryLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    address_space::AddressSpace,
    error::AccessViolation,
    frame::{Frame, FrameAllocator, FrameNumber, FrameOwner},
    loader::LoadSegment,
    modules::{
        block_device::BlockDeviceModule,
        eviction::{ClockEvictionModule, EvictionModule},
        file::BackingFileModule,
        page_table::{PageTableModule, SoftPageTableModule},
    },
    page::{LazyLoad, Page, PagerContext, VmType},
    page_fault::PageFault,
    swap::SwapManager,
    PhysAddr, VMConfig, VirtAddr, VmError, PAGE_SIZE,
};

/// Identifies a process
pub type Pid = u32;

/// Paging activity since the virtual memory was created
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) evictions: u64,
    pub(crate) swap_ins: u64,
    pub(crate) swap_outs: u64,
    pub(crate) write_backs: u64,
    pub(crate) page_faults: u64,
}

/// Snapshot of the state of the virtual memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VmStats {
    pub frames_total: usize,
    pub frames_free: usize,
    pub swap_slots_total: usize,
    pub swap_slots_free: usize,
    pub evictions: u64,
    pub swap_ins: u64,
    pub swap_outs: u64,
    pub write_backs: u64,
    pub page_faults: u64,
    pub processes: usize,
}

/// The virtual memory subsystem of the kernel.
///
/// Owns the user frame pool, the swap device and the address space of every
/// process. All operations are serialized by one lock; an operation that
/// finds the lock taken fails with [`VmError::Busy`].
pub struct VirtualMemory<
    D: BlockDeviceModule,
    F: BackingFileModule,
    P: PageTableModule = SoftPageTableModule,
    E: EvictionModule = ClockEvictionModule,
> {
    inner: TryLock<VirtualMemoryInner<D, F, P, E>>,
}

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemory<D, F, P, E>
{
    pub fn new(config: VMConfig, swap_device: D) -> Self {
        Self {
            inner: TryLock::new(VirtualMemoryInner::new(config, swap_device)),
        }
    }

    #[inline]
    fn lock(&self) -> Result<try_lock::Locked<'_, VirtualMemoryInner<D, F, P, E>>, VmError> {
        self.inner.try_lock().ok_or(VmError::Busy)
    }

    pub fn config(&self) -> Result<VMConfig, VmError> {
        Ok(self.lock()?.config.clone())
    }

    /// Creates an empty address space for `pid`
    pub fn create_process(&self, pid: Pid) -> Result<(), VmError> {
        self.lock()?.create_process(pid)
    }

    /// Tears down the address space of `pid`.
    ///
    /// Dirty file pages are written back, swap slots and frames are released
    /// and all mappings are closed.
    pub fn exit_process(&self, pid: Pid) -> Result<(), VmError> {
        self.lock()?.exit_process(pid)
    }

    /// Reserves a zero filled page (`VmType::Anon`) at `va`.
    ///
    /// File pages need a file and can only be created by [`VirtualMemory::mmap`]
    /// or [`VirtualMemory::alloc_page_with_initializer`].
    pub fn alloc_page(
        &self,
        pid: Pid,
        vm_type: VmType,
        va: VirtAddr,
        writable: bool,
    ) -> Result<(), VmError> {
        match vm_type {
            VmType::Anon => self.alloc_page_with_initializer(pid, va, writable, LazyLoad::Zero),
            VmType::File => Err(VmError::InvalidArgument("file pages need a backing file")),
        }
    }

    /// Reserves the page at `va`, it is initialized by `load` on its first fault
    pub fn alloc_page_with_initializer(
        &self,
        pid: Pid,
        va: VirtAddr,
        writable: bool,
        load: LazyLoad<F>,
    ) -> Result<(), VmError> {
        let mut inner = self.lock()?;
        let page = Page::new_uninit(va.page_round_down(), writable, load);
        inner.alloc_page(pid, page)
    }

    /// Reserves the pages of an executable segment, they are read from `file` on their first fault
    pub fn load_segment(&self, pid: Pid, file: &F, segment: LoadSegment) -> Result<(), VmError> {
        self.lock()?.load_segment(pid, file, segment)
    }

    /// Creates the first stack page of `pid` and points the stack pointer to the stack top
    pub fn setup_stack(&self, pid: Pid) -> Result<(), VmError> {
        self.lock()?.setup_stack(pid)
    }

    /// Records the user stack pointer of `pid`, which decides if a fault below it grows the stack
    pub fn set_stack_pointer(&self, pid: Pid, rsp: VirtAddr) -> Result<(), VmError> {
        self.lock()?.space_mut(pid)?.stack_pointer = rsp;
        Ok(())
    }

    pub fn stack_pointer(&self, pid: Pid) -> Result<VirtAddr, VmError> {
        Ok(self.lock()?.space(pid)?.stack_pointer)
    }

    /// Makes the page at `va` resident
    pub fn claim_page(&self, pid: Pid, va: VirtAddr) -> Result<(), VmError> {
        self.lock()?.claim_page(pid, va)
    }

    /// Resolves a page fault of `pid`.
    ///
    /// If the fault can not be resolved and the error is fatal for the
    /// process, the process is terminated before the error is returned.
    pub fn handle_page_fault(&self, pid: Pid, fault: PageFault) -> Result<(), VmError> {
        let mut inner = self.lock()?;
        let res = inner.handle_page_fault(pid, fault);
        inner.kill_on_fatal(pid, res)
    }

    /// Maps `length` bytes of `file` starting at `offset` to `addr`.
    ///
    /// The mapping keeps its own handle, so `file` may be closed afterwards.
    pub fn mmap(
        &self,
        pid: Pid,
        addr: VirtAddr,
        length: usize,
        writable: bool,
        file: &F,
        offset: usize,
    ) -> Result<VirtAddr, VmError> {
        self.lock()?.mmap(pid, addr, length, writable, file, offset)
    }

    /// Removes the mapping starting at `addr`. Unknown mappings are ignored.
    pub fn munmap(&self, pid: Pid, addr: VirtAddr) -> Result<(), VmError> {
        self.lock()?.munmap(pid, addr)
    }

    /// Creates process `child` with a copy of the address space of `parent`
    pub fn fork(&self, parent: Pid, child: Pid) -> Result<(), VmError> {
        self.lock()?.fork(parent, child)
    }

    /// Reads user memory of `pid` like the process itself would, faulting pages in
    pub fn read_user(&self, pid: Pid, va: VirtAddr, dest: &mut [u8]) -> Result<(), VmError> {
        let mut inner = self.lock()?;
        let res = inner.read_user(pid, va, dest);
        inner.kill_on_fatal(pid, res)
    }

    /// Writes user memory of `pid` like the process itself would, faulting pages in
    pub fn write_user(&self, pid: Pid, va: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        let mut inner = self.lock()?;
        let res = inner.write_user(pid, va, src);
        inner.kill_on_fatal(pid, res)
    }

    /// Type of the page at `va`, for uninitialized pages the type they will have
    pub fn page_type(&self, pid: Pid, va: VirtAddr) -> Result<Option<VmType>, VmError> {
        Ok(self.lock()?.space(pid)?.spt.find(va).map(|page| page.vm_type()))
    }

    pub fn is_resident(&self, pid: Pid, va: VirtAddr) -> Result<bool, VmError> {
        Ok(self
            .lock()?
            .space(pid)?
            .spt
            .find(va)
            .is_some_and(|page| page.is_resident()))
    }

    pub fn stats(&self) -> Result<VmStats, VmError> {
        Ok(self.lock()?.stats())
    }
}

pub(crate) struct VirtualMemoryInner<
    D: BlockDeviceModule,
    F: BackingFileModule,
    P: PageTableModule,
    E: EvictionModule,
> {
    pub(crate) config: VMConfig,
    pub(crate) frames: FrameAllocator<E>,
    pub(crate) swap: SwapManager<D>,
    pub(crate) spaces: BTreeMap<Pid, AddressSpace<F, P>>,
    pub(crate) counters: Counters,
}

impl<D: BlockDeviceModule, F: BackingFileModule, P: PageTableModule, E: EvictionModule>
    VirtualMemoryInner<D, F, P, E>
{
    fn new(config: VMConfig, swap_device: D) -> Self {
        info!(
            "virtual memory with {} frames, stack {:#x}..{:#x}",
            config.frame_count,
            config.stack_limit(),
            config.stack_top
        );

        Self {
            frames: FrameAllocator::new(config.frame_count),
            swap: SwapManager::new(swap_device),
            spaces: BTreeMap::new(),
            counters: Counters::default(),
            config,
        }
    }

    pub(crate) fn space(&self, pid: Pid) -> Result<&AddressSpace<F, P>, VmError> {
        self.spaces.get(&pid).ok_or(VmError::NoSuchProcess(pid))
    }

    pub(crate) fn space_mut(&mut self, pid: Pid) -> Result<&mut AddressSpace<F, P>, VmError> {
        self.spaces.get_mut(&pid).ok_or(VmError::NoSuchProcess(pid))
    }

    pub(crate) fn create_process(&mut self, pid: Pid) -> Result<(), VmError> {
        if self.spaces.contains_key(&pid) {
            return Err(VmError::ProcessExists(pid));
        }

        info!("created address space of process {}", pid);
        self.spaces
            .insert(pid, AddressSpace::new(VirtAddr::new(self.config.stack_top)));
        Ok(())
    }

    pub(crate) fn exit_process(&mut self, pid: Pid) -> Result<(), VmError> {
        let mut space = self.spaces.remove(&pid).ok_or(VmError::NoSuchProcess(pid))?;

        let mut ctx = PagerContext {
            frames: &mut self.frames,
            swap: &mut self.swap,
            page_table: &mut space.page_table,
            counters: &mut self.counters,
        };
        space.spt.destroy_all(&mut ctx);

        // closes the files of all mappings
        space.regions.clear();

        info!("destroyed address space of process {}", pid);
        Ok(())
    }

    /// Terminates `pid` if `res` holds an error the process can not survive
    fn kill_on_fatal(&mut self, pid: Pid, res: Result<(), VmError>) -> Result<(), VmError> {
        if let Err(err) = &res {
            if err.is_process_fatal() && self.spaces.contains_key(&pid) {
                error!("process {} killed: {}", pid, err);
                self.exit_process(pid)?;
            }
        }

        res
    }

    /// Checks that `va` may hold a user page
    pub(crate) fn check_user_addr(&self, va: VirtAddr) -> Result<(), VmError> {
        if va.is_null() {
            return Err(VmError::invalid_access(va, AccessViolation::NullAddress));
        }
        if va.as_usize() >= self.config.kernel_base {
            return Err(VmError::invalid_access(va, AccessViolation::KernelAddress));
        }

        Ok(())
    }

    /// Adds a not yet resident page to the address space of `pid`
    pub(crate) fn alloc_page(&mut self, pid: Pid, page: Page<F>) -> Result<(), VmError> {
        self.check_user_addr(page.va)?;

        let space = self.space_mut(pid)?;
        let va = page.va;
        let vm_type = page.vm_type();
        space
            .spt
            .insert(page)
            .map_err(|page| VmError::AlreadyMapped { addr: page.va })?;

        trace!("process {} reserved {:?} page at {:?}", pid, vm_type, va);
        Ok(())
    }

    /// Gets a frame for `owner`, evicting some other page if no frame is free.
    ///
    /// The frame is pinned. Panics if no frame can be evicted.
    pub(crate) fn acquire_frame(&mut self, owner: FrameOwner) -> Frame {
        if let Some(frame) = self.frames.take_free(owner) {
            return frame;
        }

        let Some(victim) = self.frames.select_victim(&mut self.spaces) else {
            panic!("out of memory: no frame can be evicted");
        };

        match self.evict(victim) {
            Ok(frame) => self.frames.assign(frame, owner),
            Err(err) => panic!("out of memory: evicting {:?} failed: {}", victim, err),
        }
    }

    fn evict(&mut self, victim: FrameNumber) -> Result<Frame, VmError> {
        let owner = self
            .frames
            .owner(victim)
            .ok_or(VmError::InvalidArgument("victim frame is free"))?;
        let space = self
            .spaces
            .get_mut(&owner.pid)
            .ok_or(VmError::NoSuchProcess(owner.pid))?;
        let page = space
            .spt
            .find_mut(owner.va)
            .ok_or(VmError::InvalidArgument("victim frame has no page"))?;

        let mut ctx = PagerContext {
            frames: &mut self.frames,
            swap: &mut self.swap,
            page_table: &mut space.page_table,
            counters: &mut self.counters,
        };
        let frame = page.send_out(&mut ctx)?;

        self.counters.evictions += 1;
        debug!(
            "evicted {:?} of process {} from {:?}",
            owner.va, owner.pid, victim
        );
        Ok(frame)
    }

    /// Makes the page containing `va` resident
    pub(crate) fn claim_page(&mut self, pid: Pid, va: VirtAddr) -> Result<(), VmError> {
        let va = va.page_round_down();
        match self.space(pid)?.spt.find(va) {
            None => return Err(VmError::invalid_access(va, AccessViolation::Unmapped)),
            Some(page) if page.is_resident() => return Ok(()),
            Some(_) => {}
        }

        // the page itself is not resident, so it can not be the victim
        let frame = self.acquire_frame(FrameOwner { pid, va });
        let number = frame.number();

        let Some(space) = self.spaces.get_mut(&pid) else {
            self.frames.release(frame);
            return Err(VmError::NoSuchProcess(pid));
        };
        let Some(page) = space.spt.find_mut(va) else {
            self.frames.release(frame);
            return Err(VmError::invalid_access(va, AccessViolation::Unmapped));
        };

        if space
            .page_table
            .install(va, frame.phys_addr(), page.writable)
            .is_err()
        {
            self.frames.release(frame);
            return Err(VmError::MappingFailed { addr: va });
        }
        page.frame = Some(frame);

        let mut ctx = PagerContext {
            frames: &mut self.frames,
            swap: &mut self.swap,
            page_table: &mut space.page_table,
            counters: &mut self.counters,
        };
        if let Err(err) = page.bring_in(&mut ctx) {
            ctx.page_table.clear(va);
            if let Some(frame) = page.frame.take() {
                ctx.frames.release(frame);
            }
            return Err(err);
        }

        ctx.frames.unpin(number);
        trace!("process {} claimed {:?} with {:?}", pid, va, number);
        Ok(())
    }

    /// Translates `va` like the mmu does, raising a page fault if needed
    fn translate(&mut self, pid: Pid, va: VirtAddr, is_write: bool) -> Result<PhysAddr, VmError> {
        let mut faulted = false;
        loop {
            let space = self.space_mut(pid)?;
            let is_present = match space.page_table.resolve(va) {
                Some(pa) if !is_write || space.page_table.is_writable(va) => {
                    space.page_table.set_accessed(va, true);
                    if is_write {
                        space.page_table.set_dirty(va, true);
                    }
                    return Ok(pa);
                }
                Some(_) => true,
                None => false,
            };

            if faulted {
                // a resolved fault always leaves the page mapped
                return Err(VmError::MappingFailed { addr: va });
            }
            faulted = true;

            let fault = PageFault {
                addr: va,
                is_write,
                is_present,
                rsp: space.stack_pointer,
            };
            self.handle_page_fault(pid, fault)?;
        }
    }

    pub(crate) fn read_user(&mut self, pid: Pid, va: VirtAddr, dest: &mut [u8]) -> Result<(), VmError> {
        let mut done = 0;
        while done < dest.len() {
            let addr = va
                .checked_add(done)
                .ok_or(VmError::invalid_access(va, AccessViolation::KernelAddress))?;
            let len = (PAGE_SIZE - addr.page_offset()).min(dest.len() - done);

            let pa = self.translate(pid, addr, false)?;
            dest[done..done + len].copy_from_slice(self.frames.phys(pa, len));
            done += len;
        }

        Ok(())
    }

    pub(crate) fn write_user(&mut self, pid: Pid, va: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        let mut done = 0;
        while done < src.len() {
            let addr = va
                .checked_add(done)
                .ok_or(VmError::invalid_access(va, AccessViolation::KernelAddress))?;
            let len = (PAGE_SIZE - addr.page_offset()).min(src.len() - done);

            let pa = self.translate(pid, addr, true)?;
            self.frames
                .phys_mut(pa, len)
                .copy_from_slice(&src[done..done + len]);
            done += len;
        }

        Ok(())
    }

    fn stats(&self) -> VmStats {
        VmStats {
            frames_total: self.frames.frame_count(),
            frames_free: self.frames.free_count(),
            swap_slots_total: self.swap.slot_count(),
            swap_slots_free: self.swap.free_slots(),
            evictions: self.counters.evictions,
            swap_ins: self.counters.swap_ins,
            swap_outs: self.counters.swap_outs,
            write_backs: self.counters.write_backs,
            page_faults: self.counters.page_faults,
            processes: self.spaces.len(),
        }
    }
}
