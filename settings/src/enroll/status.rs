//! Enrollment state enums and the fixed daemon-signal mappings.

/// Coarse enrollment state consumed by presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollStatus {
    Ready,
    Next,
    Retry,
    Finished,
}

impl EnrollStatus {
    /// Map a daemon status string to the coarse state.
    ///
    /// Exact-match dispatch on the two meaningful values; anything else
    /// degrades to `Next` instead of failing.
    pub fn from_signal(value: &str, done: bool) -> Self {
        if value == "enroll-completed" && done {
            return EnrollStatus::Finished;
        }

        if value == "enroll-retry-scan" {
            return EnrollStatus::Retry;
        }

        EnrollStatus::Next
    }
}

/// Why the daemon asked for another scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Print image unusable (dirty sensor or bad placement).
    SmudgedScan,
    /// Finger lifted too early.
    TouchTooShort,
    /// Sample overlaps already-captured data too much.
    HighRepetition,
    /// Finger already enrolled under another slot.
    ThumbRepeated,
}

/// Diagnostic stage decoded from the EnrollStatus (id, code, message) push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollStage {
    Default,
    Failed,
    StagePassed { progress: u8 },
    Retry { reason: RetryReason },
}

impl EnrollStage {
    /// Decode one (code, message) pair pushed by the daemon. For stage
    /// passes the message carries the capture progress as decimal text.
    pub fn from_signal(code: i32, message: &str) -> Self {
        match code {
            0 => EnrollStage::Failed,
            1 => {
                let progress = message.trim().parse::<u32>().unwrap_or(0).min(100) as u8;
                EnrollStage::StagePassed { progress }
            }
            2 => EnrollStage::Retry {
                reason: RetryReason::SmudgedScan,
            },
            3 => EnrollStage::Retry {
                reason: RetryReason::TouchTooShort,
            },
            4 => EnrollStage::Retry {
                reason: RetryReason::HighRepetition,
            },
            5 => EnrollStage::Retry {
                reason: RetryReason::ThumbRepeated,
            },
            _ => EnrollStage::Default,
        }
    }
}

/// Prompt selection for a capture-progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePrompt {
    /// Lift the finger and press again.
    LiftAndPressAgain,
    /// Adjust the pressed area to capture the print edges.
    AdjustEdgePlacement,
    /// Enrollment is complete; offer a Done action.
    Completed,
}

/// Select the prompt for `progress`. Thresholds are fixed policy.
pub fn stage_prompt(progress: u8) -> StagePrompt {
    if progress < 35 {
        StagePrompt::LiftAndPressAgain
    } else if progress < 100 {
        StagePrompt::AdjustEdgePlacement
    } else {
        StagePrompt::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_thresholds_are_exact() {
        assert_eq!(stage_prompt(0), StagePrompt::LiftAndPressAgain);
        assert_eq!(stage_prompt(34), StagePrompt::LiftAndPressAgain);
        assert_eq!(stage_prompt(35), StagePrompt::AdjustEdgePlacement);
        assert_eq!(stage_prompt(99), StagePrompt::AdjustEdgePlacement);
        assert_eq!(stage_prompt(100), StagePrompt::Completed);
    }

    #[test]
    fn status_mapping_is_exact_match_only() {
        assert_eq!(
            EnrollStatus::from_signal("enroll-completed", true),
            EnrollStatus::Finished
        );
        assert_eq!(
            EnrollStatus::from_signal("enroll-completed", false),
            EnrollStatus::Next
        );
        assert_eq!(
            EnrollStatus::from_signal("enroll-retry-scan", false),
            EnrollStatus::Retry
        );
        assert_eq!(
            EnrollStatus::from_signal("enroll-retry-scan", true),
            EnrollStatus::Retry
        );
        assert_eq!(
            EnrollStatus::from_signal("unexpected-value", true),
            EnrollStatus::Next
        );
        assert_eq!(
            EnrollStatus::from_signal("enroll-stage-passed", false),
            EnrollStatus::Next
        );
        assert_eq!(EnrollStatus::from_signal("", false), EnrollStatus::Next);
    }

    #[test]
    fn stage_decoding_covers_retry_reasons() {
        assert_eq!(EnrollStage::from_signal(0, ""), EnrollStage::Failed);
        assert_eq!(
            EnrollStage::from_signal(1, "35"),
            EnrollStage::StagePassed { progress: 35 }
        );
        assert_eq!(
            EnrollStage::from_signal(2, ""),
            EnrollStage::Retry {
                reason: RetryReason::SmudgedScan
            }
        );
        assert_eq!(
            EnrollStage::from_signal(5, ""),
            EnrollStage::Retry {
                reason: RetryReason::ThumbRepeated
            }
        );
        assert_eq!(EnrollStage::from_signal(42, ""), EnrollStage::Default);
    }

    #[test]
    fn stage_progress_is_clamped_and_tolerant() {
        assert_eq!(
            EnrollStage::from_signal(1, "250"),
            EnrollStage::StagePassed { progress: 100 }
        );
        assert_eq!(
            EnrollStage::from_signal(1, "not-a-number"),
            EnrollStage::StagePassed { progress: 0 }
        );
    }
}
