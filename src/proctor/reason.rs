use serde::{Deserialize, Serialize};

/// Why a proctored session ended. Displays as a kebab-case code
/// (`tab-hidden`, `time-expired`, ...) which is also what the history log stores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TerminationReason {
    FullscreenDenied,
    FullscreenExitConfirmed,
    FullscreenRestoreFailed,
    TabHidden,
    WindowBlurred,
    PageHidden,
    DevtoolsDetected,
    ManualQuit,
    TimeExpired,
    /// The host ended the session because every question was answered.
    Submitted,
}

impl TerminationReason {
    /// Submission, time running out and a confirmed quit are normal endings,
    /// everything else means the learner left the locked-down state.
    pub fn is_misconduct(&self) -> bool {
        !matches!(self, Self::TimeExpired | Self::ManualQuit | Self::Submitted)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::FullscreenDenied => "Fullscreen is required to take this quiz",
            Self::FullscreenExitConfirmed => "You chose to end the quiz after leaving fullscreen",
            Self::FullscreenRestoreFailed => "Fullscreen could not be restored",
            Self::TabHidden => "The quiz was hidden",
            Self::WindowBlurred => "The quiz window lost focus",
            Self::PageHidden => "The quiz page was closed",
            Self::DevtoolsDetected => "Inspection tools were detected",
            Self::ManualQuit => "You ended the quiz",
            Self::TimeExpired => "Time is up",
            Self::Submitted => "All questions answered",
        }
    }
}

/// Violations that ask the learner for confirmation instead of ending at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ViolationKind {
    FullscreenExit,
    ManualQuit,
}

impl ViolationKind {
    /// Reason recorded when the learner confirms ending the attempt.
    pub fn confirmed_reason(&self) -> TerminationReason {
        match self {
            Self::FullscreenExit => TerminationReason::FullscreenExitConfirmed,
            Self::ManualQuit => TerminationReason::ManualQuit,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::FullscreenExit => {
                "You left fullscreen. End the quiz now? (y = end, n = return to fullscreen)"
            }
            Self::ManualQuit => "End the quiz now? Your answers will be submitted. (y/n)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_display_as_kebab_codes() {
        assert_eq!(TerminationReason::FullscreenDenied.to_string(), "fullscreen-denied");
        assert_eq!(
            TerminationReason::FullscreenRestoreFailed.to_string(),
            "fullscreen-restore-failed"
        );
        assert_eq!(TerminationReason::TabHidden.to_string(), "tab-hidden");
        assert_eq!(TerminationReason::DevtoolsDetected.to_string(), "devtools-detected");
        assert_eq!(TerminationReason::TimeExpired.to_string(), "time-expired");
    }

    #[test]
    fn serde_uses_same_codes_as_display() {
        let json = serde_json::to_string(&TerminationReason::WindowBlurred).unwrap();
        assert_eq!(json, "\"window-blurred\"");
        let back: TerminationReason = serde_json::from_str("\"page-hidden\"").unwrap();
        assert_eq!(back, TerminationReason::PageHidden);
    }

    #[test]
    fn only_violations_count_as_misconduct() {
        assert!(!TerminationReason::TimeExpired.is_misconduct());
        assert!(!TerminationReason::ManualQuit.is_misconduct());
        assert!(!TerminationReason::Submitted.is_misconduct());
        assert!(TerminationReason::TabHidden.is_misconduct());
        assert!(TerminationReason::FullscreenExitConfirmed.is_misconduct());
    }

    #[test]
    fn confirmed_violation_maps_to_reason() {
        assert_eq!(
            ViolationKind::FullscreenExit.confirmed_reason(),
            TerminationReason::FullscreenExitConfirmed
        );
        assert_eq!(
            ViolationKind::ManualQuit.confirmed_reason(),
            TerminationReason::ManualQuit
        );
    }
}
