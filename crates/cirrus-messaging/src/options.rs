//! Per-call options, capability advertisement and batch results

use cirrus_core::config::{MAX_MESSAGES_LIMIT, WAIT_TIME_LIMIT_SECS};
use cirrus_core::CirrusError;

/// Maximum number of entries a backend accepts in one batch request
pub const BATCH_LIMIT: usize = 10;

/// Options recognised by messaging operations; unknown combinations are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingOption {
    /// Upper bound on messages returned by one receive call; zero or less receives nothing
    MaxMessages(i32),
    /// Long-poll duration in seconds
    WaitTime(i32),
    /// Subject line for notification publishes
    Subject(String),
}

/// Effective receive settings after applying options to the configured defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub wait_time_secs: i32,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_MESSAGES_LIMIT,
            wait_time_secs: 0,
        }
    }
}

impl ReceiveOptions {
    pub fn new(max_messages: i32, wait_time_secs: i32) -> Self {
        Self {
            max_messages,
            wait_time_secs,
        }
        .clamped()
    }

    /// Apply `options` on top of `self`; the last occurrence of an option wins.
    pub fn apply(self, options: &[MessagingOption]) -> Self {
        let mut resolved = self;
        for option in options {
            match option {
                MessagingOption::MaxMessages(max) => resolved.max_messages = *max,
                MessagingOption::WaitTime(wait) => resolved.wait_time_secs = *wait,
                MessagingOption::Subject(_) => {}
            }
        }
        resolved.clamped()
    }

    fn clamped(self) -> Self {
        Self {
            max_messages: self.max_messages.clamp(0, MAX_MESSAGES_LIMIT),
            wait_time_secs: self.wait_time_secs.clamp(0, WAIT_TIME_LIMIT_SECS),
        }
    }
}

/// Subject option, if given (last occurrence wins)
pub fn subject(options: &[MessagingOption]) -> Option<&str> {
    options.iter().rev().find_map(|option| match option {
        MessagingOption::Subject(subject) => Some(subject.as_str()),
        _ => None,
    })
}

/// Optional capabilities a provider supports beyond sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// receive, receive_batch and add_listener
    pub receive: bool,
    pub acknowledge: bool,
}

/// An entry the backend rejected within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntryFailure {
    pub id: String,
    pub code: String,
    pub message: String,
    pub sender_fault: bool,
}

/// Per-entry outcome of a batch send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Identifier assigned to every entry, in input order
    pub ids: Vec<String>,
    pub failed: Vec<BatchEntryFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.ids.len() - self.failed.len()
    }

    /// Mark every entry from `start` on as failed with `error`, after a batch request
    /// was lost in transport.
    pub fn fail_from(&mut self, start: usize, error: &CirrusError) {
        let code = error.error_code();
        let message = error.to_string();
        self.failed.extend(self.ids.iter().skip(start).map(|id| BatchEntryFailure {
            id: id.clone(),
            code: code.to_string(),
            message: message.clone(),
            sender_fault: false,
        }));
    }
}

/// Result of one backend batch request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendResult {
    pub successful: Vec<String>,
    pub failed: Vec<BatchEntryFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ReceiveOptions::default();
        assert_eq!(options.max_messages, 10);
        assert_eq!(options.wait_time_secs, 0);
    }

    #[test]
    fn test_apply_last_wins_and_clamps() {
        let options = ReceiveOptions::default().apply(&[
            MessagingOption::MaxMessages(3),
            MessagingOption::WaitTime(5),
            MessagingOption::MaxMessages(4),
        ]);
        assert_eq!(options, ReceiveOptions::new(4, 5));

        let options = ReceiveOptions::default().apply(&[
            MessagingOption::MaxMessages(100),
            MessagingOption::WaitTime(-3),
        ]);
        assert_eq!(options.max_messages, 10);
        assert_eq!(options.wait_time_secs, 0);

        let options = ReceiveOptions::default().apply(&[MessagingOption::MaxMessages(0)]);
        assert_eq!(options.max_messages, 0);

        let options = ReceiveOptions::default().apply(&[MessagingOption::MaxMessages(-3)]);
        assert_eq!(options.max_messages, 0);
    }

    #[test]
    fn test_subject() {
        assert_eq!(subject(&[]), None);
        assert_eq!(
            subject(&[
                MessagingOption::Subject("first".to_string()),
                MessagingOption::MaxMessages(1),
                MessagingOption::Subject("second".to_string()),
            ]),
            Some("second")
        );
    }

    #[test]
    fn test_batch_outcome_counts() {
        let outcome = BatchOutcome {
            ids: vec!["a".to_string(), "b".to_string()],
            failed: vec![BatchEntryFailure {
                id: "b".to_string(),
                code: "InvalidParameterValue".to_string(),
                message: "empty body".to_string(),
                sender_fault: true,
            }],
        };
        assert!(!outcome.is_complete());
        assert_eq!(outcome.succeeded(), 1);
    }

    #[test]
    fn test_fail_from_marks_undelivered_entries() {
        let mut outcome = BatchOutcome {
            ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            failed: Vec::new(),
        };
        outcome.fail_from(1, &CirrusError::Transport("connection reset".to_string()));

        let ids: Vec<&str> = outcome.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(outcome.failed[0].code, "TRANSPORT_ERROR");
        assert!(!outcome.failed[0].sender_fault);
        assert_eq!(outcome.succeeded(), 1);
    }
}
