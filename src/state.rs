use std::fmt;

/// Lifecycle of an OpAMP client.
///
/// The machine only moves forward: a client bootstraps, settles into heartbeating and is
/// finally disconnected. There is no way back out of `Disconnected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Bootstrapping,
    Steady,
    Disconnected,
}

impl Phase {
    /// Validates a transition, returning the phase to move into.
    pub fn evaluate(self, next: Phase) -> Option<Phase> {
        let allowed = matches!(
            (self, next),
            (Phase::Bootstrapping, Phase::Steady)
                | (Phase::Bootstrapping, Phase::Disconnected)
                | (Phase::Steady, Phase::Disconnected)
        );
        if allowed {
            log::debug!("In phase {:?}, moving to {:?}", self, next);
            Some(next)
        } else {
            log::debug!("Rejected phase change {:?} -> {:?}", self, next);
            None
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Phase::Disconnected
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Bootstrapping => "bootstrapping",
            Phase::Steady => "steady",
            Phase::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
