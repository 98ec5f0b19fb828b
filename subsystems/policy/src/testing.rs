//! Test doubles for the dispatch kernel and the draw source.

use crate::dispatch::{DispatchError, Kernel, ScheduleRequest};
use crate::lifecycle::StartMode;
use crate::rng::TicketSource;
use crate::state::SchedulerState;
use crate::{CpuId, Endpoint, PolicyConfig};
use alloc::vec::Vec;

/// Endpoint of the root process registered by [`scheduler`]
pub const ROOT: Endpoint = Endpoint::from_raw(1);

/// Kernel that records every request
#[derive(Debug, Default)]
pub struct MockKernel {
    pub requests: Vec<ScheduleRequest>,
    pub bad_cpus: Vec<CpuId>,
    pub reject_all: Option<i32>,
    pub takeover_error: Option<i32>,
    pub takeovers: Vec<Endpoint>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Kernel for MockKernel {
    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), DispatchError> {
        self.requests.push(*request);
        if let Some(code) = self.reject_all {
            return Err(DispatchError::Rejected(code));
        }
        match request.cpu {
            Some(cpu) if self.bad_cpus.contains(&cpu) => Err(DispatchError::BadCpu),
            _ => Ok(()),
        }
    }

    fn take_over(&mut self, endpoint: Endpoint) -> Result<(), i32> {
        self.takeovers.push(endpoint);
        match self.takeover_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn tick_rate(&self) -> u32 {
        60
    }
}

/// Draw source returning a fixed value
#[derive(Debug, Default)]
pub struct FixedDraw {
    pub value: u64,
    pub last_bound: Option<u64>,
}

impl TicketSource for FixedDraw {
    fn random_uniform(&mut self, bound: u64) -> u64 {
        self.last_bound = Some(bound);
        self.value % bound
    }

    fn reseed(&mut self, _seed: u64) {}
}

pub type TestState = SchedulerState<MockKernel, FixedDraw>;

/// State with no processes
pub fn bare(config: PolicyConfig) -> TestState {
    SchedulerState::new(config, MockKernel::new(), FixedDraw::default())
}

/// State with `cpus` CPUs and a root process parked at queue 0, outside
/// the lottery and the balancer
pub fn scheduler(cpus: usize) -> TestState {
    let mut s = bare(PolicyConfig::smp(cpus, 0).with_max_procs(16));
    s.register(ROOT, ROOT, 0, StartMode::Explicit { quantum: 200 })
        .expect("root registers");
    s
}

/// Register a resting child of the root with the given ceiling
pub fn spawn(s: &mut TestState, endpoint: i32, ceiling: u32) -> Endpoint {
    let ep = Endpoint::from_raw(endpoint);
    s.register(ep, ROOT, ceiling, StartMode::Inherit)
        .expect("spawn registers");
    ep
}
