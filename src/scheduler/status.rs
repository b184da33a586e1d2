//! The scheduler lifecycle state machine.
//!
//! Externally triggered transitions always target a transient state
//! (initializing, starting, stopping); the scheduler itself settles into
//! the matching steady state afterwards, or rolls back to the previous
//! one on failure. While a transient state is active no other transition
//! is accepted.

use crate::error::{CrawlError, CrawlResult};
use std::fmt;

/// The seven lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Uninitialized => "uninitialized",
            Status::Initializing => "initializing",
            Status::Initialized => "initialized",
            Status::Starting => "starting",
            Status::Started => "started",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks whether `current` may transition into the transient state
/// `wanted`. A rejected transition leaves the scheduler untouched.
pub(crate) fn check_transition(current: Status, wanted: Status) -> CrawlResult<()> {
    let reject = |msg: &str| Err(CrawlError::Scheduler(msg.to_string()));

    match current {
        Status::Initializing => return reject("the scheduler is being initialized"),
        Status::Starting => return reject("the scheduler is being started"),
        Status::Stopping => return reject("the scheduler is being stopped"),
        _ => {}
    }

    match wanted {
        Status::Initializing => match current {
            Status::Started => reject("the scheduler has been started"),
            _ => Ok(()),
        },
        Status::Starting => match current {
            Status::Uninitialized => reject("the scheduler has not been initialized"),
            Status::Started => reject("the scheduler has been started"),
            _ => Ok(()),
        },
        Status::Stopping => match current {
            Status::Started => Ok(()),
            _ => reject("the scheduler has not been started"),
        },
        _ => reject("the wanted status is not a transient status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEADY: [Status; 4] = [
        Status::Uninitialized,
        Status::Initialized,
        Status::Started,
        Status::Stopped,
    ];
    const TRANSIENT: [Status; 3] = [Status::Initializing, Status::Starting, Status::Stopping];

    #[test]
    fn transient_states_reject_every_transition() {
        for current in TRANSIENT {
            for wanted in TRANSIENT {
                assert!(check_transition(current, wanted).is_err());
            }
        }
    }

    #[test]
    fn initialization_is_allowed_except_while_running() {
        assert!(check_transition(Status::Uninitialized, Status::Initializing).is_ok());
        assert!(check_transition(Status::Initialized, Status::Initializing).is_ok());
        assert!(check_transition(Status::Stopped, Status::Initializing).is_ok());
        assert!(check_transition(Status::Started, Status::Initializing).is_err());
    }

    #[test]
    fn starting_requires_prior_initialization() {
        assert!(check_transition(Status::Uninitialized, Status::Starting).is_err());
        assert!(check_transition(Status::Initialized, Status::Starting).is_ok());
        assert!(check_transition(Status::Stopped, Status::Starting).is_ok());
        assert!(check_transition(Status::Started, Status::Starting).is_err());
    }

    #[test]
    fn stopping_requires_a_running_scheduler() {
        for current in STEADY {
            let result = check_transition(current, Status::Stopping);
            if current == Status::Started {
                assert!(result.is_ok());
            } else {
                assert!(result.is_err());
            }
        }
    }

    #[test]
    fn rejection_messages_name_the_obstacle() {
        let err = check_transition(Status::Initializing, Status::Starting).unwrap_err();
        assert!(err.to_string().contains("being initialized"));

        let err = check_transition(Status::Uninitialized, Status::Starting).unwrap_err();
        assert!(err.to_string().contains("not been initialized"));

        let err = check_transition(Status::Stopped, Status::Stopping).unwrap_err();
        assert!(err.to_string().contains("not been started"));
    }
}
