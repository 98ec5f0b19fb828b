//! # Priority Levels
//!
//! The dispatch kernel knows priorities only as a flat queue index where a
//! lower number is more urgent. Inside the scheduler a priority is tagged by
//! where it sits relative to the user band, and is flattened back to a queue
//! index only when talking to the kernel.

use static_assertions::const_assert;

/// Number of scheduling queues in the dispatch kernel
pub const QUEUE_COUNT: u8 = 16;

/// Most urgent level of the user band (lottery winners run here)
pub const MAX_USER_Q: u8 = 12;

/// Resting level of the user band
pub const USER_Q: u8 = 13;

/// Least urgent level of the user band
pub const MIN_USER_Q: u8 = 14;

/// Idle queue, below the user band
pub const IDLE_Q: u8 = 15;

const_assert!(MAX_USER_Q >= 1);
const_assert!(MAX_USER_Q < USER_Q);
const_assert!(USER_Q <= MIN_USER_Q);
const_assert!(MIN_USER_Q < QUEUE_COUNT);
const_assert!(IDLE_Q == QUEUE_COUNT - 1);

/// Level that quantum-expiry demotion never pushes past
pub const DEMOTION_FLOOR: u8 = MAX_USER_Q - 1;

/// Position of a process on the scheduling scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Lottery winner, at `MAX_USER_Q`
    Elevated,
    /// Resting level `USER_Q`, eligible for the lottery
    Resting,
    /// Inside the band but below resting (`USER_Q < level <= MIN_USER_Q`)
    Demoted(u8),
    /// Any level outside the user band
    OutOfBand(u8),
}

impl Priority {
    /// Classify a flat queue index. Returns `None` for indices past the last queue.
    pub const fn from_level(level: u8) -> Option<Self> {
        if level >= QUEUE_COUNT {
            return None;
        }
        Some(if level == MAX_USER_Q {
            Priority::Elevated
        } else if level == USER_Q {
            Priority::Resting
        } else if level > USER_Q && level <= MIN_USER_Q {
            Priority::Demoted(level)
        } else {
            Priority::OutOfBand(level)
        })
    }

    /// Flatten to the queue index the dispatch kernel expects
    pub const fn level(self) -> u8 {
        match self {
            Priority::Elevated => MAX_USER_Q,
            Priority::Resting => USER_Q,
            Priority::Demoted(level) | Priority::OutOfBand(level) => level,
        }
    }

    /// Whether the level lies in `[MAX_USER_Q, MIN_USER_Q]`
    pub const fn in_user_band(self) -> bool {
        !matches!(self, Priority::OutOfBand(_))
    }

    /// Whether this is the resting user level
    pub const fn is_resting(self) -> bool {
        matches!(self, Priority::Resting)
    }

    /// One level more urgent, saturating at queue 0
    pub const fn raised(self) -> Self {
        let level = self.level();
        if level == 0 {
            return self;
        }
        match Self::from_level(level - 1) {
            Some(p) => p,
            None => self,
        }
    }

    /// One level less urgent, saturating at the idle queue
    pub const fn lowered(self) -> Self {
        match Self::from_level(self.level() + 1) {
            Some(p) => p,
            None => self,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Resting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_round_trips_every_queue() {
        for level in 0..QUEUE_COUNT {
            let p = Priority::from_level(level).expect("valid queue");
            assert_eq!(p.level(), level);
        }
        assert!(Priority::from_level(QUEUE_COUNT).is_none());
    }

    #[test]
    fn test_band_membership() {
        assert_eq!(Priority::from_level(MAX_USER_Q), Some(Priority::Elevated));
        assert_eq!(Priority::from_level(USER_Q), Some(Priority::Resting));
        assert_eq!(Priority::from_level(MIN_USER_Q), Some(Priority::Demoted(MIN_USER_Q)));
        assert!(!Priority::OutOfBand(DEMOTION_FLOOR).in_user_band());
        assert!(!Priority::OutOfBand(IDLE_Q).in_user_band());
        assert!(Priority::Demoted(MIN_USER_Q).in_user_band());
    }

    #[test]
    fn test_raise_and_lower_saturate() {
        assert_eq!(Priority::OutOfBand(0).raised(), Priority::OutOfBand(0));
        assert_eq!(Priority::OutOfBand(IDLE_Q).lowered(), Priority::OutOfBand(IDLE_Q));
        assert_eq!(Priority::Resting.raised(), Priority::Elevated);
        assert_eq!(Priority::Elevated.raised(), Priority::OutOfBand(DEMOTION_FLOOR));
        assert_eq!(Priority::OutOfBand(DEMOTION_FLOOR).lowered(), Priority::Elevated);
    }
}
