use crate::dual_role::modifier::Side;
use std::time::{Duration, Instant};

/// How many GUI-role keys are physically down.
///
/// Only two GUI-role keys exist, so the count is bounded by construction. `since` is the
/// instant the first of them went down and survives the second one coming and going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hold {
    #[default]
    Idle,
    OneHeld { side: Side, since: Instant },
    /// `latest` is the side pressed second; it decides the resolved side.
    TwoHeld {
        first: Side,
        latest: Side,
        since: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The other GUI-role key is still down.
    StillHeld,
    /// The last GUI-role key went up.
    Last { side: Side, held_for: Duration },
    /// A release arrived with nothing held.
    Unmatched,
}

impl Hold {
    pub fn count(&self) -> u8 {
        match self {
            Hold::Idle => 0,
            Hold::OneHeld { .. } => 1,
            Hold::TwoHeld { .. } => 2,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match *self {
            Hold::Idle => None,
            Hold::OneHeld { side, .. } => Some(side),
            Hold::TwoHeld { latest, .. } => Some(latest),
        }
    }

    pub fn since(&self) -> Option<Instant> {
        match *self {
            Hold::Idle => None,
            Hold::OneHeld { since, .. } | Hold::TwoHeld { since, .. } => Some(since),
        }
    }

    pub fn press(self, side: Side, now: Instant) -> Self {
        match self {
            Hold::Idle => Hold::OneHeld { side, since: now },
            Hold::OneHeld { side: first, since } => Hold::TwoHeld {
                first,
                latest: side,
                since,
            },
            Hold::TwoHeld { latest, since, .. } => Hold::TwoHeld {
                first: latest,
                latest: side,
                since,
            },
        }
    }

    pub fn release(self, side: Side, now: Instant) -> (Self, Released) {
        match self {
            Hold::Idle => (Hold::Idle, Released::Unmatched),
            Hold::OneHeld { side: held, since } => (
                Hold::Idle,
                Released::Last {
                    side: held,
                    held_for: now.saturating_duration_since(since),
                },
            ),
            // Whichever key did not just go up is the one still held.
            Hold::TwoHeld {
                first,
                latest,
                since,
            } => {
                let remaining = if side == latest { first } else { latest };
                (
                    Hold::OneHeld {
                        side: remaining,
                        since,
                    },
                    Released::StillHeld,
                )
            }
        }
    }
}
