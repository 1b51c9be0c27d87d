use super::types::HeraldError;

/// Where an error sits in the scheduler's failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misconfiguration of the runner or a task; fatal for the task.
    Configuration,
    /// Skill failure or timeout; retried while attempts remain.
    Transient,
    /// Fault inside the runner itself; logged and backed off.
    SchedulerInternal,
    /// Misuse of the public API; returned to the caller.
    Programmer,
    /// Explicit cancellation by the caller.
    Cancellation,
}

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl HeraldError {
    /// Classify this error to determine its type and whether the task may be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            HeraldError::Skill(_) => ErrorClassification {
                error_type: "SkillError",
                kind: ErrorKind::Transient,
                retryable: true,
            },
            HeraldError::SkillRejected(_) => ErrorClassification {
                error_type: "SkillRejectedError",
                kind: ErrorKind::Transient,
                retryable: true,
            },
            HeraldError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                kind: ErrorKind::Transient,
                retryable: true,
            },

            // Configuration errors
            HeraldError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                kind: ErrorKind::Configuration,
                retryable: false,
            },
            HeraldError::NoSkill(_) => ErrorClassification {
                error_type: "ConfigurationError",
                kind: ErrorKind::Configuration,
                retryable: false,
            },

            HeraldError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                kind: ErrorKind::Cancellation,
                retryable: false,
            },

            // Programmer errors
            HeraldError::AlreadyRunning => ErrorClassification {
                error_type: "AlreadyRunningError",
                kind: ErrorKind::Programmer,
                retryable: false,
            },
            HeraldError::NotRunning => ErrorClassification {
                error_type: "NotRunningError",
                kind: ErrorKind::Programmer,
                retryable: false,
            },
            HeraldError::NotPaused => ErrorClassification {
                error_type: "NotPausedError",
                kind: ErrorKind::Programmer,
                retryable: false,
            },
            HeraldError::InvalidTransition { .. } => ErrorClassification {
                error_type: "InvalidTransitionError",
                kind: ErrorKind::Programmer,
                retryable: false,
            },
            HeraldError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                kind: ErrorKind::Programmer,
                retryable: false,
            },

            // Scheduler internals: never retried at the task level
            HeraldError::Panicked(_) => ErrorClassification {
                error_type: "PanicError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
            HeraldError::Io(_) => ErrorClassification {
                error_type: "IoError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
            HeraldError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
            HeraldError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
            HeraldError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
            HeraldError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                kind: ErrorKind::SchedulerInternal,
                retryable: false,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify().retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskType;

    #[test]
    fn test_skill_error_is_retryable() {
        let err = HeraldError::Skill("upstream 503".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.kind, ErrorKind::Transient);
        assert_eq!(class.error_type, "SkillError");
    }

    #[test]
    fn test_timeout_is_retryable() {
        let class = HeraldError::Timeout(100).classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "TimeoutError");
    }

    #[test]
    fn test_missing_skill_is_configuration_error() {
        let err = HeraldError::NoSkill(TaskType::SocialPost);
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.kind, ErrorKind::Configuration);
        assert!(err.to_string().contains("No skill found"));
    }

    #[test]
    fn test_api_misuse_is_programmer_error() {
        for err in [HeraldError::AlreadyRunning, HeraldError::NotPaused, HeraldError::NotRunning] {
            let class = err.classify();
            assert_eq!(class.kind, ErrorKind::Programmer);
            assert!(!class.retryable);
        }
    }

    #[test]
    fn test_database_error_is_internal() {
        let class = HeraldError::Database("disk full".into()).classify();
        assert_eq!(class.kind, ErrorKind::SchedulerInternal);
        assert!(!class.retryable);
    }

    #[test]
    fn test_cancellation_not_retryable() {
        let err = HeraldError::Cancelled("by caller".into());
        assert!(!err.is_retryable());
        assert_eq!(err.classify().kind, ErrorKind::Cancellation);
    }
}
