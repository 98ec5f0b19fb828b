//! # Ticket Draw Source
//!
//! The lottery needs one uniform draw per round. The source is a trait so
//! the server can plug in a kernel entropy source and tests can fix the draw.

/// Source of uniform lottery draws
pub trait TicketSource {
    /// Uniform value in `[0, bound)`. `bound` is never zero.
    fn random_uniform(&mut self, bound: u64) -> u64;

    /// Restart the sequence from `seed`
    fn reseed(&mut self, seed: u64);
}

/// xorshift64 generator. Not cryptographically secure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShiftSource {
    state: u64,
}

impl XorShiftSource {
    /// Create a generator. A zero seed is replaced with 1.
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Next raw value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl Default for XorShiftSource {
    fn default() -> Self {
        Self::new(0x9E37_79B9_7F4A_7C15)
    }
}

impl TicketSource for XorShiftSource {
    fn random_uniform(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next_u64() % bound
    }

    fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }
}
