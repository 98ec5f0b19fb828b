//! # Lottery Scheduling Policy
//!
//! The policy core of a user-space scheduling server. For every managed
//! process it decides:
//! - The priority queue the process is dispatched from
//! - The quantum it runs for
//! - The CPU it is assigned to (SMP only)
//!
//! ## Algorithm
//!
//! A multilevel feedback queue with a lottery layered on top:
//! - Running out of quantum outside the user band demotes a process
//! - A periodic sweep promotes demoted processes back toward their ceiling
//! - After every state change a lottery elevates one resting process,
//!   chosen with probability proportional to its tickets
//!
//! The dispatch kernel is strict-priority; this crate only decides what it
//! is told. All actual context switching lives behind the [`Kernel`] trait.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod balance;
pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod lifecycle;
pub mod lottery;
pub mod metrics;
pub mod nice;
pub mod priority;
pub mod quantum;
pub mod registry;
pub mod rng;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use balance::BalanceTimer;
pub use config::PolicyConfig;
pub use cpu::{CpuLoad, CpuLoadTable};
pub use dispatch::{ChangeSet, DispatchError, Kernel, ScheduleRequest};
pub use lifecycle::StartMode;
pub use priority::Priority;
pub use registry::{ProcessRegistry, ScheduledProcess, SlotId};
pub use rng::{TicketSource, XorShiftSource};
pub use state::SchedulerState;

use core::fmt;

/// CPU index as understood by the dispatch kernel
pub type CpuId = usize;

/// Opaque process endpoint handed out by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint(i32);

impl Endpoint {
    /// Create from raw value
    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw endpoint value
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling result type
pub type SchedResult<T> = Result<T, SchedError>;

/// Scheduling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Endpoint does not map to a live record
    UnknownProcess,
    /// Requested priority is not a valid queue
    InvalidPriority,
    /// Every CPU has been marked dead
    NoUsableCpu,
    /// The process table has no free slot
    RegistryFull,
    /// A live record already holds this endpoint
    AlreadyRegistered,
    /// Kernel refused to hand the process over to us
    TakeoverFailed(i32),
    /// Dispatch kernel rejected a scheduling request
    Dispatch(DispatchError),
}

impl From<DispatchError> for SchedError {
    fn from(err: DispatchError) -> Self {
        SchedError::Dispatch(err)
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::UnknownProcess => write!(f, "unknown process"),
            SchedError::InvalidPriority => write!(f, "invalid priority"),
            SchedError::NoUsableCpu => write!(f, "no usable cpu left"),
            SchedError::RegistryFull => write!(f, "process table full"),
            SchedError::AlreadyRegistered => write!(f, "endpoint already scheduled"),
            SchedError::TakeoverFailed(code) => write!(f, "kernel takeover failed ({})", code),
            SchedError::Dispatch(err) => write!(f, "dispatch failed: {}", err),
        }
    }
}
