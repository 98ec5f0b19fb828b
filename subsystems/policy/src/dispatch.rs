//! # Dispatch Adapter
//!
//! Turns a scheduling record into a request for the dispatch kernel. Only
//! the fields named in the [`ChangeSet`] are sent; the rest go out as
//! "no change".

use crate::cpu::{CpuLoad, CpuLoadTable};
use crate::registry::ScheduledProcess;
use crate::{CpuId, Endpoint, SchedResult};
use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// Fields of a scheduling request the kernel should apply
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeSet: u32 {
        /// Send the priority queue
        const PRIORITY = 1 << 0;
        /// Send the quantum
        const QUANTUM = 1 << 1;
        /// Send the CPU
        const CPU = 1 << 2;
        /// Priority and quantum, keeping the CPU
        const LOCAL = Self::PRIORITY.bits() | Self::QUANTUM.bits();
        /// Everything
        const ALL = Self::LOCAL.bits() | Self::CPU.bits();
    }
}

/// Dispatch kernel errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The CPU in the request cannot take processes
    BadCpu,
    /// Any other kernel status
    Rejected(i32),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::BadCpu => write!(f, "bad cpu"),
            DispatchError::Rejected(code) => write!(f, "kernel error {}", code),
        }
    }
}

/// A scheduling request for one process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRequest {
    /// Target process
    pub endpoint: Endpoint,
    /// New priority queue
    pub priority: Option<u8>,
    /// New quantum in ticks
    pub quantum: Option<u32>,
    /// New CPU
    pub cpu: Option<CpuId>,
}

impl ScheduleRequest {
    /// Wire value meaning "leave this field alone"
    pub const NO_CHANGE: i32 = -1;

    /// Build the request for `record`, sending only `changes`
    pub fn for_record(record: &ScheduledProcess, changes: ChangeSet) -> Self {
        Self {
            endpoint: record.endpoint,
            priority: changes.contains(ChangeSet::PRIORITY).then(|| record.priority.level()),
            quantum: changes.contains(ChangeSet::QUANTUM).then_some(record.time_slice),
            cpu: changes.contains(ChangeSet::CPU).then_some(record.cpu),
        }
    }

    /// Flatten to `(endpoint, priority, quantum, cpu)` kernel call arguments
    pub fn to_raw(&self) -> (i32, i32, i32, i32) {
        let field = |v: Option<i64>| v.map_or(Self::NO_CHANGE, |v| v.clamp(0, i64::from(i32::MAX)) as i32);
        (
            self.endpoint.as_raw(),
            field(self.priority.map(i64::from)),
            field(self.quantum.map(i64::from)),
            field(self.cpu.map(|c| c as i64)),
        )
    }
}

/// Calls the scheduler makes into the dispatch kernel
pub trait Kernel {
    /// Apply a scheduling request
    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), DispatchError>;

    /// Take over scheduling of a process from the kernel
    fn take_over(&mut self, endpoint: Endpoint) -> Result<(), i32>;

    /// Kernel ticks per second
    fn tick_rate(&self) -> u32;
}

/// Place `record` if needed and send it to the kernel.
///
/// Placement is redone when the request carries the CPU or when the record's
/// CPU has been marked dead; in the latter case the new CPU is added to the
/// request. Otherwise the record keeps its CPU and its charge, so the load
/// table and the kernel always agree on where each process runs.
///
/// `BadCpu` is returned as-is; retrying on another CPU is up to the caller.
pub fn schedule_process<K: Kernel>(
    record: &mut ScheduledProcess,
    cpus: &mut CpuLoadTable,
    kernel: &mut K,
    system_spawner: Endpoint,
    mut changes: ChangeSet,
) -> SchedResult<()> {
    let cpu_lost = !cpus.load(record.cpu).is_some_and(CpuLoad::is_available);
    if changes.contains(ChangeSet::CPU) || cpu_lost {
        cpus.place(record, system_spawner)?;
        changes |= ChangeSet::CPU;
    }

    let request = ScheduleRequest::for_record(record, changes);
    kernel.schedule(&request).map_err(|err| {
        if err != DispatchError::BadCpu {
            log::warn!("error scheduling endpoint {}: {}", record.endpoint, err);
        }
        err.into()
    })
}
