// SMP state machine.

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::group::GroupParams;

/// Which SMP message type is valid next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpState {
    /// Idle; accepts message type 2.
    Expect1,
    /// Initiator sent type 2; accepts type 3.
    Expect2,
    /// Responder sent type 3; accepts type 4.
    Expect3,
    /// Initiator sent type 4; accepts type 5.
    Expect4,
}

impl SmpState {
    pub fn label(self) -> &'static str {
        match self {
            SmpState::Expect1 => "Expect1",
            SmpState::Expect2 => "Expect2",
            SmpState::Expect3 => "Expect3",
            SmpState::Expect4 => "Expect4",
        }
    }
}

impl fmt::Display for SmpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A secret exponent, cleared when dropped.
pub(crate) struct Secret(BigUint);

impl Secret {
    pub(crate) fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// Fresh exponent in `[1, Q)`.
    pub(crate) fn random(group: &GroupParams) -> Self {
        Self(group.random_exponent())
    }

    pub(crate) fn get(&self) -> &BigUint {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.set_zero();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Run progress, carrying exactly what the next step needs.
pub(crate) enum Progress {
    Idle,

    /// We sent type 2 as initiator.
    Expect2 { a2: Secret, a3: Secret },

    /// We sent type 3 as responder.
    Expect3 {
        /// The initiator's `g3a`.
        g3o: BigUint,
        g2: BigUint,
        g3: BigUint,
        b3: Secret,
        /// Our `Pb`, `Qb`.
        p: BigUint,
        q: BigUint,
    },

    /// We sent type 4 as initiator.
    Expect4 {
        /// The responder's `g3b`.
        g3o: BigUint,
        a3: Secret,
        /// `Qa / Qb`.
        qoq: BigUint,
        /// `Pa / Pb`.
        pop: BigUint,
    },
}

impl Progress {
    pub(crate) fn state(&self) -> SmpState {
        match self {
            Progress::Idle => SmpState::Expect1,
            Progress::Expect2 { .. } => SmpState::Expect2,
            Progress::Expect3 { .. } => SmpState::Expect3,
            Progress::Expect4 { .. } => SmpState::Expect4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_expect1() {
        assert_eq!(Progress::Idle.state(), SmpState::Expect1);
        assert_eq!(SmpState::Expect3.to_string(), "Expect3");
    }

    #[test]
    fn secret_debug_is_redacted() {
        let s = Secret::new(BigUint::from(12345u32));
        assert_eq!(format!("{s:?}"), "Secret(..)");
    }
}
