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

use core::fmt;
use std::collections::BTreeMap;

use log::{debug, trace};

use crate::{
    address_space::AddressSpace,
    modules::{
        eviction::{EvictionModule, VictimCandidates},
        file::BackingFileModule,
        page_table::PageTableModule,
    },
    vm::Pid,
    PhysAddr, VirtAddr, PAGE_SIZE,
};

/// Index of a physical frame in the frame pool
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameNumber(usize);

impl FrameNumber {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn phys_addr(self) -> PhysAddr {
        PhysAddr::new(self.0 * PAGE_SIZE)
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame#{}", self.0)
    }
}

/// Ownership of one physical frame.
///
/// Exactly one page holds it while it is resident. Giving it back to the
/// [`FrameAllocator`] is the only way to free the frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Frame {
    number: FrameNumber,
}

impl Frame {
    #[inline]
    pub(crate) fn number(&self) -> FrameNumber {
        self.number
    }

    #[inline]
    pub(crate) fn phys_addr(&self) -> PhysAddr {
        self.number.phys_addr()
    }
}

/// The page a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameOwner {
    pub(crate) pid: Pid,
    pub(crate) va: VirtAddr,
}

#[derive(Clone, Copy, Default)]
struct FrameEntry {
    owner: Option<FrameOwner>,

    /// pinned frames are never chosen as victim
    pinned: bool,
}

/// Owns the user frame pool and its content
pub(crate) struct FrameAllocator<E: EvictionModule> {
    memory: Vec<u8>,
    entries: Vec<FrameEntry>,
    free: Vec<FrameNumber>,
    policy: E,
}

impl<E: EvictionModule> FrameAllocator<E> {
    pub(crate) fn new(frame_count: usize) -> Self {
        Self {
            memory: vec![0; frame_count * PAGE_SIZE],
            entries: vec![FrameEntry::default(); frame_count],
            // lowest frames are handed out first
            free: (0..frame_count).rev().map(FrameNumber::new).collect(),
            policy: E::new(frame_count),
        }
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Takes a frame of the free list and assigns it to `owner`.
    ///
    /// The frame stays pinned until [`FrameAllocator::unpin`] is called.
    pub(crate) fn take_free(&mut self, owner: FrameOwner) -> Option<Frame> {
        let number = self.free.pop()?;
        Some(self.assign(Frame { number }, owner))
    }

    /// Hands an evicted frame to its next owner
    pub(crate) fn assign(&mut self, frame: Frame, owner: FrameOwner) -> Frame {
        let entry = &mut self.entries[frame.number.index()];
        entry.owner = Some(owner);
        entry.pinned = true;
        self.policy.frame_acquired(frame.number);

        trace!("{:?} assigned to {:?} of process {}", frame.number, owner.va, owner.pid);
        frame
    }

    /// Puts `frame` back on the free list
    pub(crate) fn release(&mut self, frame: Frame) {
        let entry = &mut self.entries[frame.number.index()];
        debug_assert!(entry.owner.is_some(), "{:?} released twice", frame.number);
        *entry = FrameEntry::default();
        self.policy.frame_released(frame.number);

        trace!("{:?} released", frame.number);
        self.free.push(frame.number);
    }

    pub(crate) fn owner(&self, number: FrameNumber) -> Option<FrameOwner> {
        self.entries[number.index()].owner
    }

    pub(crate) fn pin(&mut self, number: FrameNumber) {
        self.entries[number.index()].pinned = true;
    }

    pub(crate) fn unpin(&mut self, number: FrameNumber) {
        self.entries[number.index()].pinned = false;
    }

    /// Content of `frame`
    pub(crate) fn bytes(&self, frame: &Frame) -> &[u8] {
        let start = frame.phys_addr().as_usize();
        &self.memory[start..start + PAGE_SIZE]
    }

    pub(crate) fn bytes_mut(&mut self, frame: &Frame) -> &mut [u8] {
        let start = frame.phys_addr().as_usize();
        &mut self.memory[start..start + PAGE_SIZE]
    }

    /// Copies the content of `src` into `dest`
    pub(crate) fn copy_frame(&mut self, src: &Frame, dest: &Frame) {
        let src_start = src.phys_addr().as_usize();
        let dest_start = dest.phys_addr().as_usize();
        self.memory
            .copy_within(src_start..src_start + PAGE_SIZE, dest_start);
    }

    /// Physical memory as the mmu sees it. `pa..pa + len` must not cross a frame.
    pub(crate) fn phys(&self, pa: PhysAddr, len: usize) -> &[u8] {
        debug_assert!(pa.as_usize() % PAGE_SIZE + len <= PAGE_SIZE);
        &self.memory[pa.as_usize()..pa.as_usize() + len]
    }

    pub(crate) fn phys_mut(&mut self, pa: PhysAddr, len: usize) -> &mut [u8] {
        debug_assert!(pa.as_usize() % PAGE_SIZE + len <= PAGE_SIZE);
        &mut self.memory[pa.as_usize()..pa.as_usize() + len]
    }

    /// Asks the eviction policy for a victim among all resident pages
    pub(crate) fn select_victim<F: BackingFileModule, P: PageTableModule>(
        &mut self,
        spaces: &mut BTreeMap<Pid, AddressSpace<F, P>>,
    ) -> Option<FrameNumber> {
        let mut candidates = Candidates {
            entries: &self.entries,
            spaces,
        };
        let victim = self.policy.select_victim(&mut candidates);
        debug!("eviction policy chose {:?}", victim);
        victim
    }
}

struct Candidates<'a, F: BackingFileModule, P: PageTableModule> {
    entries: &'a [FrameEntry],
    spaces: &'a mut BTreeMap<Pid, AddressSpace<F, P>>,
}

impl<F: BackingFileModule, P: PageTableModule> VictimCandidates for Candidates<'_, F, P> {
    fn frame_count(&self) -> usize {
        self.entries.len()
    }

    fn is_evictable(&self, frame: FrameNumber) -> bool {
        let entry = &self.entries[frame.index()];
        entry.owner.is_some() && !entry.pinned
    }

    fn take_accessed(&mut self, frame: FrameNumber) -> bool {
        let Some(owner) = self.entries[frame.index()].owner else {
            return false;
        };
        let Some(space) = self.spaces.get_mut(&owner.pid) else {
            return false;
        };

        let accessed = space.page_table.is_accessed(owner.va);
        space.page_table.set_accessed(owner.va, false);
        accessed
    }
}
