//! # Process Registry
//!
//! Fixed-capacity table of scheduling records. A slot is addressed by a
//! [`SlotId`] carrying a generation counter, so an id held across a
//! deregistration never aliases the process that later reuses the slot.
//!
//! Iteration is always in slot order; the lottery depends on that order
//! being stable.

use crate::priority::Priority;
use crate::{CpuId, Endpoint, SchedError, SchedResult};
use alloc::vec::Vec;
use core::fmt;

/// Stable identifier of a registry slot
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// Slot position in the table
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this id was issued
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({}:{})", self.index, self.generation)
    }
}

/// Scheduling record of one managed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledProcess {
    /// Process endpoint
    pub endpoint: Endpoint,
    /// Endpoint of the creating process (equal to `endpoint` for the root)
    pub parent: Endpoint,
    /// Current priority
    pub priority: Priority,
    /// Ceiling level the balancer promotes back up to
    pub max_priority: u8,
    /// Quantum in kernel ticks
    pub time_slice: u32,
    /// Consumed quanta, diagnostic only
    pub cputime: u64,
    /// Lottery weight
    pub tickets: u32,
    /// Assigned CPU
    pub cpu: CpuId,
    /// CPU whose load counter currently includes this record
    pub(crate) charged_cpu: Option<CpuId>,
}

impl ScheduledProcess {
    /// Create a record with the given placement parameters
    pub fn new(endpoint: Endpoint, parent: Endpoint, max_priority: u8, tickets: u32) -> Self {
        Self {
            endpoint,
            parent,
            priority: Priority::Resting,
            max_priority,
            time_slice: 0,
            cputime: 0,
            tickets,
            cpu: 0,
            charged_cpu: None,
        }
    }

    /// Whether this is the self-parented root process
    pub fn is_root(&self) -> bool {
        self.endpoint == self.parent
    }

    /// CPU this record is counted against, if any
    pub fn charged_cpu(&self) -> Option<CpuId> {
        self.charged_cpu
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    record: Option<ScheduledProcess>,
}

/// Process registry
#[derive(Debug)]
pub struct ProcessRegistry {
    slots: Vec<Slot>,
    len: usize,
}

impl ProcessRegistry {
    /// Create a registry with `capacity` free slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot { generation: 0, record: None });
        Self { slots, len: 0 }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no record is live
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a record for `endpoint` could be inserted right now
    pub fn check_vacancy(&self, endpoint: Endpoint) -> SchedResult<()> {
        if self.resolve(endpoint).is_ok() {
            return Err(SchedError::AlreadyRegistered);
        }
        if self.len == self.slots.len() {
            return Err(SchedError::RegistryFull);
        }
        Ok(())
    }

    /// Commit a record to the lowest free slot
    pub fn insert(&mut self, record: ScheduledProcess) -> SchedResult<SlotId> {
        self.check_vacancy(record.endpoint)?;

        let (index, slot) = self.slots.iter_mut()
            .enumerate()
            .find(|(_, s)| s.record.is_none())
            .ok_or(SchedError::RegistryFull)?;

        slot.record = Some(record);
        self.len += 1;

        Ok(SlotId {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Free a slot, returning the record it held
    pub fn remove(&mut self, id: SlotId) -> SchedResult<ScheduledProcess> {
        let slot = self.slots.get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .ok_or(SchedError::UnknownProcess)?;

        let record = slot.record.take().ok_or(SchedError::UnknownProcess)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        Ok(record)
    }

    /// Map an endpoint to the slot holding its live record
    pub fn resolve(&self, endpoint: Endpoint) -> SchedResult<SlotId> {
        self.iter()
            .find(|(_, r)| r.endpoint == endpoint)
            .map(|(id, _)| id)
            .ok_or(SchedError::UnknownProcess)
    }

    /// Whether `id` still names a live record
    pub fn is_in_use(&self, id: SlotId) -> bool {
        self.get(id).is_ok()
    }

    /// Get a record by slot id
    pub fn get(&self, id: SlotId) -> SchedResult<&ScheduledProcess> {
        self.slots.get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_ref())
            .ok_or(SchedError::UnknownProcess)
    }

    /// Get a record by slot id (mutable)
    pub fn get_mut(&mut self, id: SlotId) -> SchedResult<&mut ScheduledProcess> {
        self.slots.get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_mut())
            .ok_or(SchedError::UnknownProcess)
    }

    /// Get the live record of an endpoint
    pub fn lookup(&mut self, endpoint: Endpoint) -> SchedResult<&mut ScheduledProcess> {
        let id = self.resolve(endpoint)?;
        self.get_mut(id)
    }

    /// Iterate live records in slot order
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ScheduledProcess)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record.as_ref().map(|r| {
                (SlotId { index: index as u32, generation: slot.generation }, r)
            })
        })
    }

    /// Iterate live records in slot order (mutable)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut ScheduledProcess)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.record.as_mut().map(|r| {
                (SlotId { index: index as u32, generation }, r)
            })
        })
    }
}
