//! # CPU Load Tracking and Placement
//!
//! Per-CPU count of charged processes, plus the placement heuristic:
//! system processes and uniprocessor machines stay on the boot CPU, all
//! other processes go to the least loaded live CPU that is not the boot CPU.
//! A CPU that rejects a dispatch is marked dead and never chosen again.

use crate::registry::ScheduledProcess;
use crate::{CpuId, Endpoint, SchedError, SchedResult};
use arrayvec::ArrayVec;

/// Upper bound on CPUs the table can track
pub const MAX_CPUS: usize = 64;

/// Load state of one CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuLoad {
    /// Accepting processes, with this many charged to it
    Available(u32),
    /// Rejected a dispatch; excluded for the rest of the run
    Dead,
}

impl CpuLoad {
    /// Whether placement may pick this CPU
    pub fn is_available(self) -> bool {
        matches!(self, CpuLoad::Available(_))
    }
}

/// Per-CPU load table
#[derive(Debug, Clone)]
pub struct CpuLoadTable {
    loads: ArrayVec<CpuLoad, MAX_CPUS>,
    boot_cpu: CpuId,
}

impl CpuLoadTable {
    /// Create a table of `cpu_count` idle CPUs
    pub fn new(cpu_count: usize, boot_cpu: CpuId) -> Self {
        let count = cpu_count.clamp(1, MAX_CPUS);
        let mut loads = ArrayVec::new();
        for _ in 0..count {
            loads.push(CpuLoad::Available(0));
        }
        Self {
            loads,
            boot_cpu: boot_cpu.min(count - 1),
        }
    }

    /// Number of CPUs tracked
    pub fn cpu_count(&self) -> usize {
        self.loads.len()
    }

    /// Bootstrap processor
    pub fn boot_cpu(&self) -> CpuId {
        self.boot_cpu
    }

    /// Load state of a CPU
    pub fn load(&self, cpu: CpuId) -> Option<CpuLoad> {
        self.loads.get(cpu).copied()
    }

    /// All load states, indexed by CPU
    pub fn loads(&self) -> &[CpuLoad] {
        &self.loads
    }

    /// Number of CPUs not marked dead
    pub fn available_count(&self) -> usize {
        self.loads.iter().filter(|l| l.is_available()).count()
    }

    /// Exclude a CPU from placement. Returns `true` if it was alive.
    pub fn mark_dead(&mut self, cpu: CpuId) -> bool {
        match self.loads.get_mut(cpu) {
            Some(load) if load.is_available() => {
                *load = CpuLoad::Dead;
                log::info!("CPU {} marked dead, {} remaining", cpu, self.available_count());
                true
            }
            _ => false,
        }
    }

    fn charge(&mut self, cpu: CpuId) {
        if let Some(CpuLoad::Available(n)) = self.loads.get_mut(cpu) {
            *n += 1;
        }
    }

    fn release(&mut self, cpu: CpuId) {
        if let Some(CpuLoad::Available(n)) = self.loads.get_mut(cpu) {
            *n = n.saturating_sub(1);
        }
    }

    /// Drop whatever charge a record holds
    pub fn release_record(&mut self, record: &mut ScheduledProcess) {
        if let Some(cpu) = record.charged_cpu.take() {
            self.release(cpu);
        }
    }

    /// Pick a CPU without touching any counter.
    ///
    /// Pinned processes go to the boot CPU while it is alive; everything else
    /// goes to the least loaded live CPU other than the boot CPU, ties to the
    /// lowest index. The boot CPU takes unpinned work only as the last
    /// survivor, and pinned work falls back to the other CPUs once it is dead.
    pub fn select(&self, pinned: bool) -> SchedResult<CpuId> {
        let boot_alive = self.load(self.boot_cpu).is_some_and(CpuLoad::is_available);
        if boot_alive && (pinned || self.cpu_count() == 1) {
            return Ok(self.boot_cpu);
        }

        let mut best: Option<(CpuId, u32)> = None;
        for (cpu, load) in self.loads.iter().enumerate() {
            let CpuLoad::Available(n) = *load else { continue };
            if cpu == self.boot_cpu {
                continue;
            }
            if best.map_or(true, |(_, least)| n < least) {
                best = Some((cpu, n));
            }
        }

        match best {
            Some((cpu, _)) => Ok(cpu),
            None if boot_alive => Ok(self.boot_cpu),
            None => Err(SchedError::NoUsableCpu),
        }
    }

    /// Assign a CPU to a record and charge it.
    ///
    /// Any charge the record already held is released first, so a record is
    /// counted against exactly one CPU at a time. Pinned placements on the
    /// boot CPU (uniprocessor, system processes, the root process) carry no
    /// charge.
    pub fn place(&mut self, record: &mut ScheduledProcess, system_spawner: Endpoint) -> SchedResult<CpuId> {
        let pinned = self.cpu_count() == 1 || record.parent == system_spawner || record.is_root();

        self.release_record(record);
        let cpu = match self.select(pinned) {
            Ok(cpu) => cpu,
            Err(err) => {
                log::error!("no usable CPU left for endpoint {}", record.endpoint);
                return Err(err);
            }
        };

        record.cpu = cpu;
        if !pinned || cpu != self.boot_cpu {
            self.charge(cpu);
            record.charged_cpu = Some(cpu);
        }
        Ok(cpu)
    }
}
