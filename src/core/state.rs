//! Application lifecycle states, events and the transition table.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::fsm::{TransitionRule, TransitionTable};

use self::ApplicationEventType as Ev;
use self::ApplicationState as St;

/// Lifecycle state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationState {
    /// Created, not yet submitted.
    New,
    /// Submitted to the scheduler, awaiting acceptance.
    Submitted,
    /// Re-registered with the scheduler after a restart.
    Recovering,
    /// Accepted by the scheduler.
    Accepted,
    /// Waiting for gang placeholders to be bound.
    Reserving,
    /// Regular tasks may be scheduled.
    Running,
    /// Finished successfully.
    Completed,
    /// Rejected by the scheduler.
    Rejected,
    /// Failed.
    Failed,
    /// Kill requested, waiting for tasks to stop.
    Killing,
    /// Killed.
    Killed,
}

impl ApplicationState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::New,
        Self::Submitted,
        Self::Recovering,
        Self::Accepted,
        Self::Reserving,
        Self::Running,
        Self::Completed,
        Self::Rejected,
        Self::Failed,
        Self::Killing,
        Self::Killed,
    ];

    /// Whether the application has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Rejected | Self::Failed | Self::Killed
        )
    }

    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Submitted => "Submitted",
            Self::Recovering => "Recovering",
            Self::Accepted => "Accepted",
            Self::Reserving => "Reserving",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
            Self::Failed => "Failed",
            Self::Killing => "Killing",
            Self::Killed => "Killed",
        }
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events accepted by the application state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationEventType {
    /// Submit a new application to the scheduler.
    Submit,
    /// Re-register an application after a restart.
    Recover,
    /// Scheduler accepted the application.
    Accept,
    /// Start the gang reservation phase.
    TryReserve,
    /// A placeholder's binding changed.
    UpdateReservation,
    /// Start scheduling regular tasks.
    Run,
    /// Release an allocation identified by allocation id.
    ReleaseAllocation,
    /// Release a pending ask identified by task id.
    ReleaseAllocationAsk,
    /// Application finished.
    Complete,
    /// Scheduler rejected the application.
    Reject,
    /// Application failed.
    Fail,
    /// Kill requested.
    Kill,
    /// Kill finished.
    Killed,
}

impl ApplicationEventType {
    /// Every event, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Submit,
        Self::Recover,
        Self::Accept,
        Self::TryReserve,
        Self::UpdateReservation,
        Self::Run,
        Self::ReleaseAllocation,
        Self::ReleaseAllocationAsk,
        Self::Complete,
        Self::Reject,
        Self::Fail,
        Self::Kill,
        Self::Killed,
    ];

    /// Wire name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "SubmitApplication",
            Self::Recover => "RecoverApplication",
            Self::Accept => "AcceptApplication",
            Self::TryReserve => "TryReserve",
            Self::UpdateReservation => "UpdateReservation",
            Self::Run => "RunApplication",
            Self::ReleaseAllocation => "ReleaseAppAllocation",
            Self::ReleaseAllocationAsk => "ReleaseAppAllocationAsk",
            Self::Complete => "CompleteApplication",
            Self::Reject => "RejectApplication",
            Self::Fail => "FailApplication",
            Self::Kill => "KillApplication",
            Self::Killed => "KilledApplication",
        }
    }
}

impl fmt::Display for ApplicationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application transition rules.
pub const APPLICATION_TRANSITIONS: &[TransitionRule<ApplicationState, ApplicationEventType>] = &[
    TransitionRule {
        event: Ev::Submit,
        sources: &[St::New],
        destination: St::Submitted,
    },
    TransitionRule {
        event: Ev::Recover,
        sources: &[St::New],
        destination: St::Recovering,
    },
    TransitionRule {
        event: Ev::Accept,
        sources: &[St::Submitted, St::Recovering],
        destination: St::Accepted,
    },
    TransitionRule {
        event: Ev::TryReserve,
        sources: &[St::Accepted],
        destination: St::Reserving,
    },
    TransitionRule {
        event: Ev::UpdateReservation,
        sources: &[St::Reserving],
        destination: St::Reserving,
    },
    TransitionRule {
        event: Ev::Run,
        sources: &[St::Accepted, St::Reserving, St::Running],
        destination: St::Running,
    },
    TransitionRule {
        event: Ev::ReleaseAllocation,
        sources: &[St::Running],
        destination: St::Running,
    },
    TransitionRule {
        event: Ev::ReleaseAllocation,
        sources: &[St::Failed],
        destination: St::Failed,
    },
    TransitionRule {
        event: Ev::ReleaseAllocationAsk,
        sources: &[St::Running, St::Accepted, St::Reserving],
        destination: St::Running,
    },
    TransitionRule {
        event: Ev::ReleaseAllocationAsk,
        sources: &[St::Failed],
        destination: St::Failed,
    },
    TransitionRule {
        event: Ev::Complete,
        sources: &[St::Running],
        destination: St::Completed,
    },
    TransitionRule {
        event: Ev::Reject,
        sources: &[St::Submitted],
        destination: St::Rejected,
    },
    TransitionRule {
        event: Ev::Fail,
        sources: &[
            St::Submitted,
            St::Rejected,
            St::Accepted,
            St::Running,
            St::Reserving,
        ],
        destination: St::Failed,
    },
    TransitionRule {
        event: Ev::Kill,
        sources: &[St::Accepted, St::Running, St::Reserving],
        destination: St::Killing,
    },
    TransitionRule {
        event: Ev::Killed,
        sources: &[St::Killing],
        destination: St::Killed,
    },
];

/// Shared, validated application transition table.
///
/// # Panics
///
/// Panics on first use if [`APPLICATION_TRANSITIONS`] declares a route twice.
pub fn application_transitions(
) -> &'static TransitionTable<ApplicationState, ApplicationEventType> {
    static TABLE: OnceLock<TransitionTable<ApplicationState, ApplicationEventType>> =
        OnceLock::new();
    TABLE.get_or_init(|| match TransitionTable::new(APPLICATION_TRANSITIONS) {
        Ok(table) => table,
        Err(e) => panic!("application transition table: {e}"),
    })
}
