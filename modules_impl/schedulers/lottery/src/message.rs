//! # Scheduling Messages
//!
//! Requests the server receives from the process manager, the system
//! spawner and the kernel, the replies it sends back, and the system events
//! and admin requests the hosting framework delivers.

use alloc::string::String;
use alloc::vec::Vec;
use lotsched_policy::{DispatchError, Endpoint, SchedError};

// =============================================================================
// Scheduling requests
// =============================================================================

/// A scheduling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Sender endpoint
    pub source: Endpoint,
    /// What is being asked
    pub kind: MessageKind,
}

/// Scheduling request kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Start scheduling with explicit priority and quantum
    Start {
        /// Process to schedule
        endpoint: Endpoint,
        /// Its creator
        parent: Endpoint,
        /// Ceiling queue
        max_priority: u32,
        /// Quantum in ticks
        quantum: u32,
    },
    /// Start scheduling, inheriting the parent's quantum
    Inherit {
        /// Process to schedule
        endpoint: Endpoint,
        /// Its creator
        parent: Endpoint,
        /// Ceiling queue
        max_priority: u32,
    },
    /// Stop scheduling a process
    Stop {
        /// Process to drop
        endpoint: Endpoint,
    },
    /// Change a process's ticket count
    Nice {
        /// Target process
        endpoint: Endpoint,
        /// Tickets to add (may be negative)
        delta: i32,
    },
    /// Sent by the kernel when the source ran out of quantum
    NoQuantum,
}

impl Message {
    /// Create a message
    pub fn new(source: Endpoint, kind: MessageKind) -> Self {
        Self { source, kind }
    }

    /// Whether only trusted senders may send this kind
    pub fn needs_authorization(&self) -> bool {
        !matches!(self.kind, MessageKind::NoQuantum)
    }
}

/// Wire-level status of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Request handled
    Ok,
    /// Sender may not send this request
    PermissionDenied,
    /// Endpoint unknown or already in use
    BadEndpoint,
    /// Argument out of range
    Invalid,
    /// Kernel rejected the CPU
    BadCpu,
    /// No CPU left to place on
    NoCpu,
    /// Process table full
    NoSlot,
    /// Any other kernel status
    Kernel(i32),
}

impl Status {
    /// Operation not permitted
    pub const EPERM: i32 = -1;
    /// Try again (no free slot)
    pub const EAGAIN: i32 = -11;
    /// Invalid argument
    pub const EINVAL: i32 = -22;
    /// Bad endpoint
    pub const EBADEPT: i32 = -301;
    /// Bad CPU
    pub const EBADCPU: i32 = -302;
    /// No CPU available
    pub const ENOCPU: i32 = -303;

    /// Numeric code put on the wire; zero means success
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::PermissionDenied => Self::EPERM,
            Status::BadEndpoint => Self::EBADEPT,
            Status::Invalid => Self::EINVAL,
            Status::BadCpu => Self::EBADCPU,
            Status::NoCpu => Self::ENOCPU,
            Status::NoSlot => Self::EAGAIN,
            Status::Kernel(code) => code,
        }
    }

    /// Whether this is a success status
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl From<SchedError> for Status {
    fn from(err: SchedError) -> Self {
        match err {
            SchedError::UnknownProcess | SchedError::AlreadyRegistered => Status::BadEndpoint,
            SchedError::InvalidPriority => Status::Invalid,
            SchedError::NoUsableCpu => Status::NoCpu,
            SchedError::RegistryFull => Status::NoSlot,
            SchedError::TakeoverFailed(code) => Status::Kernel(code),
            SchedError::Dispatch(DispatchError::BadCpu) => Status::BadCpu,
            SchedError::Dispatch(DispatchError::Rejected(code)) => Status::Kernel(code),
        }
    }
}

impl<T> From<Result<T, SchedError>> for Status {
    fn from(result: Result<T, SchedError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.into(),
        }
    }
}

/// Reply to a scheduling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Outcome
    pub status: Status,
    /// Scheduler now owning the process (start requests only)
    pub scheduler: Option<Endpoint>,
}

impl Reply {
    /// Reply with a bare status
    pub fn status(status: Status) -> Self {
        Self { status, scheduler: None }
    }
}

// =============================================================================
// Events and admin requests
// =============================================================================

/// System events delivered to the module
#[derive(Debug, Clone)]
pub enum Event {
    /// Timer tick
    Tick {
        /// Kernel tick count
        now: u64,
    },
    /// CPU hotplug
    CpuHotplug {
        /// CPU index
        cpu_id: usize,
        /// New state
        online: bool,
    },
    /// System is shutting down
    Shutdown,
}

/// Response to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResponse {
    /// Event handled successfully
    Handled,
    /// Event not relevant to this module
    Ignored,
}

/// Admin request from another module
#[derive(Debug, Clone)]
pub struct Request {
    /// Request type
    pub request_type: String,
}

impl Request {
    /// Create a request of the given type
    pub fn new(request_type: impl Into<String>) -> Self {
        Self { request_type: request_type.into() }
    }
}

/// Response to an admin request
#[derive(Debug, Clone)]
pub struct Response {
    /// Success status
    pub success: bool,
    /// Response payload
    pub payload: Vec<u8>,
    /// Error message if failed
    pub error: Option<String>,
}

impl Response {
    /// Create a success response
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// Create an error response
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Vec::new(),
            error: Some(message.into()),
        }
    }
}

// =============================================================================
// Module context
// =============================================================================

/// Context provided to the module during initialization
pub struct Context<'a> {
    config: &'a dyn Fn(&str) -> Option<&'a str>,
}

impl<'a> Context<'a> {
    /// Create a new context
    pub fn new(config: &'a dyn Fn(&str) -> Option<&'a str>) -> Self {
        Self { config }
    }

    /// Get a configuration value
    pub fn config(&self, key: &str) -> Option<&str> {
        (self.config)(key)
    }

    /// Get a configuration value as a number
    pub fn config_usize(&self, key: &str) -> Option<usize> {
        self.config(key).and_then(|s| s.trim().parse().ok())
    }

    /// Get a configuration value as a 64-bit number
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config(key).and_then(|s| s.trim().parse().ok())
    }

    /// Get a comma-separated list of endpoints
    pub fn config_endpoints(&self, key: &str) -> Option<Vec<Endpoint>> {
        let raw = self.config(key)?;
        raw.split(',')
            .map(|s| s.trim().parse::<i32>().ok().map(Endpoint::from_raw))
            .collect()
    }
}

impl core::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}
