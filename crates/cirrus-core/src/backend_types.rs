use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::CirrusError;

/// Backend families served by the adapters
///
/// The family name doubles as the family-default lookup key in the profile registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Object store (S3)
    #[serde(rename = "s3")]
    ObjectStore,
    /// Queue service (SQS)
    #[serde(rename = "sqs")]
    Queue,
    /// Fan-out notification service (SNS)
    #[serde(rename = "sns")]
    Notification,
}

impl BackendKind {
    /// Family-default key used as the third tier of profile resolution
    pub fn default_key(&self) -> &'static str {
        match self {
            BackendKind::ObjectStore => "s3",
            BackendKind::Queue => "sqs",
            BackendKind::Notification => "sns",
        }
    }
}

impl FromStr for BackendKind {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(BackendKind::ObjectStore),
            "sqs" => Ok(BackendKind::Queue),
            "sns" => Ok(BackendKind::Notification),
            _ => Err(CirrusError::ConfigUnavailable(format!(
                "Invalid backend kind: {}",
                s
            ))),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.default_key())
    }
}
