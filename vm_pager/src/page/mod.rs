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

mod anon;
mod file_backed;
mod uninit;

pub(crate) use anon::AnonPage;
pub(crate) use file_backed::FilePage;
pub use uninit::LazyLoad;
pub(crate) use uninit::UninitPage;

use core::mem;

use log::trace;

use crate::{
    frame::{Frame, FrameAllocator},
    modules::{
        block_device::BlockDeviceModule, eviction::EvictionModule, file::BackingFileModule,
        page_table::PageTableModule,
    },
    swap::SwapManager,
    vm::Counters,
    VirtAddr, VmError,
};

/// What kind of memory a page holds once it is initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmType {
    /// Anonymous memory, swapped to the swap device
    Anon,
    /// Memory mapped file, written back to its file
    File,
}

/// Everything a page needs to move its content between frame and backing store
pub(crate) struct PagerContext<'a, D: BlockDeviceModule, P: PageTableModule, E: EvictionModule> {
    pub(crate) frames: &'a mut FrameAllocator<E>,
    pub(crate) swap: &'a mut SwapManager<D>,
    pub(crate) page_table: &'a mut P,
    pub(crate) counters: &'a mut Counters,
}

pub(crate) enum PageKind<F: BackingFileModule> {
    Uninit(UninitPage<F>),
    Anon(AnonPage),
    File(FilePage<F>),
}

impl<F: BackingFileModule> PageKind<F> {
    /// Replaces an uninitialized page by the variant it was reserved for
    fn initialize(self) -> Self {
        match self {
            PageKind::Uninit(uninit) => uninit.initialize(),
            other => other,
        }
    }
}

/// One page of user virtual memory
pub(crate) struct Page<F: BackingFileModule> {
    pub(crate) va: VirtAddr,
    pub(crate) writable: bool,

    /// Page was created by stack growth or `setup_stack`
    pub(crate) is_stack: bool,

    /// Base address of the mapping region this page belongs to
    pub(crate) region: Option<VirtAddr>,

    /// Set while the page is resident
    pub(crate) frame: Option<Frame>,

    pub(crate) kind: PageKind<F>,
}

impl<F: BackingFileModule> Page<F> {
    /// Creates a page that is not initialized before its first fault
    pub(crate) fn new_uninit(va: VirtAddr, writable: bool, load: LazyLoad<F>) -> Self {
        debug_assert!(va.is_page_aligned());
        Self {
            va,
            writable,
            is_stack: false,
            region: None,
            frame: None,
            kind: PageKind::Uninit(UninitPage::new(load)),
        }
    }

    pub(crate) fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    /// The type this page has (or will have after its first fault)
    pub(crate) fn vm_type(&self) -> VmType {
        match &self.kind {
            PageKind::Uninit(uninit) => uninit.target_type(),
            PageKind::Anon(_) => VmType::Anon,
            PageKind::File(_) => VmType::File,
        }
    }

    /// Creates a not yet resident page at the same address that loads like this one.
    ///
    /// Pages that were already initialized load zeros (anonymous) or their
    /// file range (file backed), file handles are reopened.
    pub(crate) fn duplicate(&self) -> Result<Self, ()> {
        let load = match &self.kind {
            PageKind::Uninit(uninit) => uninit.lazy_load().reopen()?,
            PageKind::Anon(_) => LazyLoad::Zero,
            PageKind::File(file) => LazyLoad::Mapped {
                file: file.file().reopen()?,
                offset: file.offset(),
                length: file.length(),
            },
        };

        let mut page = Page::new_uninit(self.va, self.writable, load);
        page.is_stack = self.is_stack;
        page.region = self.region;
        Ok(page)
    }

    /// Fills the attached frame with the content of this page.
    ///
    /// An uninitialized page only turns into its target variant if loading succeeded.
    pub(crate) fn bring_in<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) -> Result<(), VmError> {
        let Some(frame) = self.frame.as_ref() else {
            return Err(VmError::InvalidArgument("page has no frame attached"));
        };
        let addr = self.va;

        trace!("bring in {:?} to {:?}", addr, frame.number());
        let loaded = match &mut self.kind {
            PageKind::Uninit(uninit) => {
                uninit
                    .load(ctx.frames.bytes_mut(frame))
                    .map_err(|_| VmError::Io { addr })?;
                true
            }
            PageKind::Anon(anon) => {
                anon.swap_in(addr, frame, ctx)?;
                false
            }
            PageKind::File(file) => {
                file.swap_in(addr, frame, ctx)?;
                false
            }
        };

        if loaded {
            let kind = mem::replace(&mut self.kind, PageKind::Anon(AnonPage::new()));
            self.kind = kind.initialize();
        }

        Ok(())
    }

    /// Moves the content of this page to its backing store and gives up the frame.
    ///
    /// On failure the page stays resident.
    pub(crate) fn send_out<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        &mut self,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) -> Result<Frame, VmError> {
        let Some(frame) = self.frame.as_ref() else {
            return Err(VmError::InvalidArgument("page is not resident"));
        };
        let addr = self.va;

        trace!("send out {:?} from {:?}", addr, frame.number());
        match &mut self.kind {
            PageKind::Uninit(_) => {
                return Err(VmError::InvalidArgument("page is not initialized yet"))
            }
            PageKind::Anon(anon) => anon.swap_out(addr, frame, ctx)?,
            PageKind::File(file) => file.write_back(addr, frame, ctx),
        }

        ctx.page_table.clear(addr);
        self.frame
            .take()
            .ok_or(VmError::InvalidArgument("page is not resident"))
    }

    /// Releases everything this page holds.
    ///
    /// Dirty file pages are written back first. Failures there are only logged.
    pub(crate) fn destroy<D: BlockDeviceModule, P: PageTableModule, E: EvictionModule>(
        mut self,
        ctx: &mut PagerContext<'_, D, P, E>,
    ) {
        trace!("destroy {:?}", self.va);

        match &mut self.kind {
            PageKind::Uninit(_) => {}
            PageKind::Anon(anon) => anon.release_slot(ctx),
            PageKind::File(file) => {
                if let Some(frame) = self.frame.as_ref() {
                    if self.writable {
                        file.write_back(self.va, frame, ctx);
                    }
                }
            }
        }

        if let Some(frame) = self.frame.take() {
            ctx.page_table.clear(self.va);
            ctx.frames.release(frame);
        }
    }
}
