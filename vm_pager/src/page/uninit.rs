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

use super::{AnonPage, FilePage, PageKind, VmType};
use crate::{modules::file::BackingFileModule, PAGE_SIZE};

/// Describes how a page gets its content on the first fault
pub enum LazyLoad<F: BackingFileModule> {
    /// Zero filled anonymous memory
    Zero,

    /// Anonymous memory that starts with `read_bytes` bytes of `file` at
    /// `offset`, the rest of the page is zero filled
    Segment {
        file: F,
        offset: usize,
        read_bytes: usize,
    },

    /// One page of a memory mapped file. `length` bytes are backed by the
    /// file, the rest of the page is zero filled and never written back.
    Mapped {
        file: F,
        offset: usize,
        length: usize,
    },
}

impl<F: BackingFileModule> LazyLoad<F> {
    pub fn target_type(&self) -> VmType {
        match self {
            LazyLoad::Zero | LazyLoad::Segment { .. } => VmType::Anon,
            LazyLoad::Mapped { .. } => VmType::File,
        }
    }

    /// Creates the same description with its own file handle
    pub(crate) fn reopen(&self) -> Result<Self, ()> {
        Ok(match self {
            LazyLoad::Zero => LazyLoad::Zero,
            LazyLoad::Segment {
                file,
                offset,
                read_bytes,
            } => LazyLoad::Segment {
                file: file.reopen()?,
                offset: *offset,
                read_bytes: *read_bytes,
            },
            LazyLoad::Mapped {
                file,
                offset,
                length,
            } => LazyLoad::Mapped {
                file: file.reopen()?,
                offset: *offset,
                length: *length,
            },
        })
    }

    fn check(&self) -> bool {
        match self {
            LazyLoad::Zero => true,
            LazyLoad::Segment { read_bytes, .. } => *read_bytes <= PAGE_SIZE,
            LazyLoad::Mapped { length, .. } => *length <= PAGE_SIZE,
        }
    }
}

/// A reserved page that was never faulted in
pub(crate) struct UninitPage<F: BackingFileModule> {
    load: LazyLoad<F>,
}

impl<F: BackingFileModule> UninitPage<F> {
    pub(crate) fn new(load: LazyLoad<F>) -> Self {
        debug_assert!(load.check(), "lazy load exceeds one page");
        Self { load }
    }

    pub(crate) fn target_type(&self) -> VmType {
        self.load.target_type()
    }

    pub(crate) fn lazy_load(&self) -> &LazyLoad<F> {
        &self.load
    }

    /// Produces the initial content of the page in `dest`
    pub(crate) fn load(&mut self, dest: &mut [u8]) -> Result<(), ()> {
        let filled = match &mut self.load {
            LazyLoad::Zero => 0,
            LazyLoad::Segment {
                file,
                offset,
                read_bytes,
            } => {
                // executables have to be complete
                if file.read_at(*offset, &mut dest[..*read_bytes])? != *read_bytes {
                    return Err(());
                }
                *read_bytes
            }
            LazyLoad::Mapped {
                file,
                offset,
                length,
            } => file.read_at(*offset, &mut dest[..*length])?,
        };

        dest[filled..].fill(0);
        Ok(())
    }

    /// Turns into the variant this page was reserved for
    pub(crate) fn initialize(self) -> PageKind<F> {
        match self.load {
            // the segment file is not needed anymore and gets closed here
            LazyLoad::Zero | LazyLoad::Segment { .. } => PageKind::Anon(AnonPage::new()),
            LazyLoad::Mapped {
                file,
                offset,
                length,
            } => PageKind::File(FilePage::new(file, offset, length)),
        }
    }
}
