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

use thiserror::Error;

use crate::{vm::Pid, VirtAddr};

/// Why an access was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessViolation {
    NullAddress,
    KernelAddress,
    Unmapped,
    ReadOnly,
}

impl fmt::Display for AccessViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccessViolation::NullAddress => "null address",
            AccessViolation::KernelAddress => "kernel address",
            AccessViolation::Unmapped => "no page mapped",
            AccessViolation::ReadOnly => "write to read-only page",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid access at {addr:?}: {reason}")]
    InvalidAccess {
        addr: VirtAddr,
        reason: AccessViolation,
    },

    #[error("i/o error while paging {addr:?}")]
    Io { addr: VirtAddr },

    #[error("could not install mapping for {addr:?}")]
    MappingFailed { addr: VirtAddr },

    #[error("no free swap slot left")]
    SwapExhausted,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("a page is already mapped at {addr:?}")]
    AlreadyMapped { addr: VirtAddr },

    #[error("no such process: {0}")]
    NoSuchProcess(Pid),

    #[error("process {0} already exists")]
    ProcessExists(Pid),

    #[error("virtual memory is locked by another context")]
    Busy,
}

impl VmError {
    pub(crate) fn invalid_access(addr: VirtAddr, reason: AccessViolation) -> Self {
        VmError::InvalidAccess { addr, reason }
    }

    /// Errors that end the faulting process but leave the kernel intact
    pub fn is_process_fatal(&self) -> bool {
        matches!(
            self,
            VmError::InvalidAccess { .. } | VmError::Io { .. } | VmError::MappingFailed { .. }
        )
    }
}
