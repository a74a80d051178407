//! [`MemberStatus`]: the closed lifecycle enum and its transition relation.
//!
//! The machine is pure; it performs no I/O and holds no state of its own.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lifecycle a member moves through. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemberStatus {
    Joining,
    WeaklyUp,
    Up,
    Leaving,
    Exiting,
    Down,
    Removed,
    PreparingForShutdown,
    ReadyForShutdown,
}

impl MemberStatus {
    /// The statuses a given status is allowed to transition to.
    fn allowed_targets(self) -> &'static [MemberStatus] {
        use MemberStatus::*;
        match self {
            Joining => &[WeaklyUp, Up, Leaving, Down, Removed],
            WeaklyUp => &[Up, Leaving, Down, Removed],
            Up => &[Leaving, Down, Removed, PreparingForShutdown],
            Leaving => &[Exiting, Down, Removed],
            Exiting => &[Removed, Down],
            Down => &[Removed],
            PreparingForShutdown => &[ReadyForShutdown, Removed, Leaving, Down],
            ReadyForShutdown => &[Removed, Leaving, Down],
            Removed => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MemberStatus::Removed)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error raised when a transition is attempted that the table in spec §3
/// forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal member status transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: MemberStatus,
    pub to: MemberStatus,
}

/// Pure predicate: may a member move from `from` to `to`?
pub fn can_transition(from: MemberStatus, to: MemberStatus) -> bool {
    from.allowed_targets().contains(&to)
}

/// Checked transition: returns the target status or an [`InvalidTransition`]
/// error describing the rejected move. Callers own deciding what "checked"
/// means for them — the coordinator treats a violation reaching its own
/// bookkeeping as a programming error (spec §7), while API callers should
/// propagate this as an ordinary precondition failure.
pub fn transition(from: MemberStatus, to: MemberStatus) -> Result<MemberStatus, InvalidTransition> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MemberStatus::*;

    const ALL: [MemberStatus; 9] = [
        Joining,
        WeaklyUp,
        Up,
        Leaving,
        Exiting,
        Down,
        Removed,
        PreparingForShutdown,
        ReadyForShutdown,
    ];

    /// Table in spec §3, written out for the exhaustive transition-soundness
    /// test below.
    fn allowed_pairs() -> Vec<(MemberStatus, MemberStatus)> {
        vec![
            (Joining, WeaklyUp),
            (Joining, Up),
            (Joining, Leaving),
            (Joining, Down),
            (Joining, Removed),
            (WeaklyUp, Up),
            (WeaklyUp, Leaving),
            (WeaklyUp, Down),
            (WeaklyUp, Removed),
            (Up, Leaving),
            (Up, Down),
            (Up, Removed),
            (Up, PreparingForShutdown),
            (Leaving, Exiting),
            (Leaving, Down),
            (Leaving, Removed),
            (Exiting, Removed),
            (Exiting, Down),
            (Down, Removed),
            (PreparingForShutdown, ReadyForShutdown),
            (PreparingForShutdown, Removed),
            (PreparingForShutdown, Leaving),
            (PreparingForShutdown, Down),
            (ReadyForShutdown, Removed),
            (ReadyForShutdown, Leaving),
            (ReadyForShutdown, Down),
        ]
    }

    #[test]
    fn transition_soundness_matches_the_table_exactly() {
        let allowed = allowed_pairs();
        for &from in &ALL {
            for &to in &ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "can_transition({from:?}, {to:?}) should be {expected}"
                );
            }
        }
    }

    #[test]
    fn removed_is_terminal() {
        for &to in &ALL {
            assert!(!can_transition(Removed, to));
        }
        assert!(Removed.is_terminal());
        assert!(!Joining.is_terminal());
    }

    #[test]
    fn transition_returns_invalid_transition_error() {
        let err = transition(Removed, Up).unwrap_err();
        assert_eq!(err.from, Removed);
        assert_eq!(err.to, Up);
    }

    #[test]
    fn transition_succeeds_for_an_allowed_pair() {
        assert_eq!(transition(Joining, Up), Ok(Up));
    }
}
