//! Backend-specific views of a [`Locator`]
//!
//! Each backend family validates its own locator grammar:
//!
//! - object store: `scheme://authority/container[/key...]`
//! - queue: `https://sqs.<region>.<domain>/<account>/<queue>`
//! - notification: `sns://<service>.<region>.<domain>/<account>/<topic>`
//!
//! Deriving an address from the same locator always yields the same address.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{CirrusError, CirrusResult};
use crate::locator::{HostPattern, Locator};

/// Scheme required for queue locators
pub const QUEUE_SCHEME: &str = "https";

/// How the object key keeps the separator that follows the container segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// `s3://h/bucket/a/b` yields key `a/b`
    #[default]
    Trim,
    /// `s3://h/bucket/a/b` yields key `/a/b`
    PreserveLeadingSlash,
}

impl FromStr for KeyStyle {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trim" => Ok(KeyStyle::Trim),
            "preserve" => Ok(KeyStyle::PreserveLeadingSlash),
            _ => Err(CirrusError::ConfigUnavailable(format!(
                "Invalid key style: {} (expected trim or preserve)",
                s
            ))),
        }
    }
}

/// Which host pattern notification locators are validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicHostPolicy {
    /// `sns.<region>.<domain>`
    #[default]
    Topic,
    /// `sqs.<region>.<domain>`, accepted for locators written against the queue hosts
    Queue,
}

impl TopicHostPolicy {
    pub fn host_pattern(&self, domain: &str) -> CirrusResult<HostPattern> {
        match self {
            TopicHostPolicy::Topic => HostPattern::new("sns", domain),
            TopicHostPolicy::Queue => HostPattern::new("sqs", domain),
        }
    }
}

impl FromStr for TopicHostPolicy {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "topic" | "sns" => Ok(TopicHostPolicy::Topic),
            "queue" | "sqs" => Ok(TopicHostPolicy::Queue),
            _ => Err(CirrusError::ConfigUnavailable(format!(
                "Invalid topic host policy: {} (expected topic or queue)",
                s
            ))),
        }
    }
}

fn check_scheme(locator: &Locator, schemes: &[&str]) -> CirrusResult<()> {
    if schemes.iter().any(|s| *s == locator.scheme()) {
        Ok(())
    } else {
        Err(CirrusError::InvalidLocator(format!(
            "{}: scheme '{}' is not one of {:?}",
            locator,
            locator.scheme(),
            schemes
        )))
    }
}

fn decode_segment(locator: &Locator, segment: &str) -> CirrusResult<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| CirrusError::InvalidLocator(format!("{}: {}", locator, e)))
}

/// Object-store address: container (bucket) plus object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAddress {
    locator: Locator,
    container: String,
    key: String,
}

impl ObjectAddress {
    /// Derive the container and key from `locator`.
    ///
    /// The container is the first path segment and is never empty; the key is the
    /// percent-decoded remainder.
    pub fn parse(locator: &Locator, schemes: &[&str], style: KeyStyle) -> CirrusResult<Self> {
        check_scheme(locator, schemes)?;

        let path = locator.path();
        let path = path.strip_prefix('/').unwrap_or(path);
        let (container, rest) = path.split_once('/').unwrap_or((path, ""));

        let container = decode_segment(locator, container)?;
        if container.is_empty() {
            return Err(CirrusError::InvalidLocator(format!(
                "{}: missing container segment",
                locator
            )));
        }

        let rest = decode_segment(locator, rest)?;
        let key = match style {
            KeyStyle::PreserveLeadingSlash if !rest.is_empty() => format!("/{}", rest),
            _ => rest,
        };

        Ok(Self {
            locator: locator.clone(),
            container,
            key,
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Directory-marker variant of the key (`key/`)
    pub fn marker_key(&self) -> String {
        if self.key.is_empty() || self.key.ends_with('/') {
            self.key.clone()
        } else {
            format!("{}/", self.key)
        }
    }

    /// Address of another object in the same container, used for listed children.
    ///
    /// The key is taken verbatim; it is never re-parsed, since URL parsing would collapse
    /// `.` and `..` segments into a different object. The child's locator spells out the key
    /// when it survives URL normalisation and falls back to the parent's locator otherwise.
    pub fn child(&self, key: &str) -> ObjectAddress {
        let locator = self
            .child_locator(key)
            .unwrap_or_else(|| self.locator.clone());
        ObjectAddress {
            locator,
            container: self.container.clone(),
            key: key.to_string(),
        }
    }

    fn child_locator(&self, key: &str) -> Option<Locator> {
        let key = key.strip_prefix('/').unwrap_or(key);
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let path = format!(
            "/{}/{}",
            urlencoding::encode(&self.container),
            encoded.join("/")
        );
        let authority = match self.locator.url().port() {
            Some(port) => format!("{}:{}", self.locator.host(), port),
            None => self.locator.host().to_string(),
        };
        let locator =
            Locator::parse(&format!("{}://{}{}", self.locator.scheme(), authority, path)).ok()?;
        (locator.path() == path).then_some(locator)
    }
}

impl Display for ObjectAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Queue address derived from a queue URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAddress {
    locator: Locator,
    region: String,
    queue_name: String,
}

impl QueueAddress {
    pub fn parse(locator: &Locator, hosts: &HostPattern) -> CirrusResult<Self> {
        check_scheme(locator, &[QUEUE_SCHEME])?;

        let region = hosts.region(locator.host()).ok_or_else(|| {
            CirrusError::InvalidLocator(format!(
                "{}: host '{}' is not a {} endpoint",
                locator,
                locator.host(),
                hosts.service()
            ))
        })?;

        let path = locator.path();
        if !path.starts_with('/') || path.trim_matches('/').is_empty() {
            return Err(CirrusError::InvalidLocator(format!(
                "{}: queue path is empty",
                locator
            )));
        }
        let queue_name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");

        Ok(Self {
            locator: locator.clone(),
            region: region.to_string(),
            queue_name: decode_segment(locator, queue_name)?,
        })
    }

    /// Queue URL passed to the backend
    pub fn queue_url(&self) -> &str {
        self.locator.as_str()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }
}

/// Notification topic address: `/<account>/<topic>` on a regional endpoint host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAddress {
    locator: Locator,
    region: String,
    account: String,
    topic: String,
}

impl TopicAddress {
    pub fn parse(locator: &Locator, schemes: &[&str], hosts: &HostPattern) -> CirrusResult<Self> {
        check_scheme(locator, schemes)?;

        let region = hosts.region(locator.host()).ok_or_else(|| {
            CirrusError::InvalidLocator(format!(
                "{}: host '{}' is not a {} endpoint",
                locator,
                locator.host(),
                hosts.service()
            ))
        })?;

        let segments: Vec<&str> = locator
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let [account, topic] = segments.as_slice() else {
            return Err(CirrusError::InvalidLocator(format!(
                "{}: expected /<account>/<topic>",
                locator
            )));
        };

        Ok(Self {
            locator: locator.clone(),
            region: region.to_string(),
            account: decode_segment(locator, account)?,
            topic: decode_segment(locator, topic)?,
        })
    }

    pub fn topic_arn(&self) -> String {
        format!("arn:aws:sns:{}:{}:{}", self.region, self.account, self.topic)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(input: &str, style: KeyStyle) -> CirrusResult<ObjectAddress> {
        ObjectAddress::parse(&Locator::parse(input).unwrap(), &["s3"], style)
    }

    fn queue_hosts() -> HostPattern {
        HostPattern::new("sqs", "amazonaws.com").unwrap()
    }

    #[test]
    fn test_object_container_is_first_segment() {
        let address = object("s3://endpoint/bucket1/folder/file.txt", KeyStyle::Trim).unwrap();
        assert_eq!(address.container(), "bucket1");
        assert_eq!(address.key(), "folder/file.txt");
        assert_eq!(address.marker_key(), "folder/file.txt/");
    }

    #[test]
    fn test_object_preserve_leading_slash() {
        let address = object(
            "s3://endpoint/bucket1/folder/file.txt",
            KeyStyle::PreserveLeadingSlash,
        )
        .unwrap();
        assert_eq!(address.container(), "bucket1");
        assert_eq!(address.key(), "/folder/file.txt");
    }

    #[test]
    fn test_object_container_only() {
        let address = object("s3://endpoint/bucket1", KeyStyle::Trim).unwrap();
        assert_eq!(address.container(), "bucket1");
        assert_eq!(address.key(), "");
        let address = object("s3://endpoint/bucket1/", KeyStyle::PreserveLeadingSlash).unwrap();
        assert_eq!(address.key(), "");
    }

    #[test]
    fn test_object_missing_container_fails() {
        for input in ["s3://endpoint", "s3://endpoint/", "s3://endpoint//key"] {
            let err = object(input, KeyStyle::Trim).unwrap_err();
            assert!(
                matches!(err, CirrusError::InvalidLocator(_)),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_object_wrong_scheme_fails() {
        let err = object("gs://endpoint/bucket/key", KeyStyle::Trim).unwrap_err();
        assert!(matches!(err, CirrusError::InvalidLocator(_)));
    }

    #[test]
    fn test_object_parse_is_idempotent() {
        let first = object("s3://endpoint/b/dir/a%20b.txt", KeyStyle::Trim).unwrap();
        let second = object(first.locator().as_str(), KeyStyle::Trim).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.key(), "dir/a b.txt");
    }

    #[test]
    fn test_object_child_locator_round_trips() {
        let address = object("s3://endpoint/bucket1/folder", KeyStyle::Trim).unwrap();
        let child = address.child("folder/a b.txt");
        assert_eq!(child.key(), "folder/a b.txt");
        assert_eq!(
            child.locator().as_str(),
            "s3://endpoint/bucket1/folder/a%20b.txt"
        );
        let reparsed = ObjectAddress::parse(child.locator(), &["s3"], KeyStyle::Trim).unwrap();
        assert_eq!(reparsed, child);
    }

    #[test]
    fn test_object_child_keeps_dot_segment_keys() {
        let address = object("s3://endpoint/bucket1/folder", KeyStyle::Trim).unwrap();

        for key in ["folder/../secret", "folder/./a", "folder/.."] {
            let child = address.child(key);
            assert_eq!(child.container(), "bucket1");
            assert_eq!(child.key(), key);
            assert_eq!(child.locator(), address.locator());
        }

        let literal = address.child("folder/%2e%2e/x");
        let reparsed = ObjectAddress::parse(literal.locator(), &["s3"], KeyStyle::Trim).unwrap();
        assert_eq!(reparsed.key(), "folder/%2e%2e/x");
    }

    #[test]
    fn test_object_child_keeps_port() {
        let address = object("s3://localhost:9000/bucket1/folder", KeyStyle::Trim).unwrap();
        let child = address.child("folder/a.txt");
        assert_eq!(child.locator().as_str(), "s3://localhost:9000/bucket1/folder/a.txt");
    }

    #[test]
    fn test_queue_locator_validates() {
        let locator =
            Locator::parse("https://sqs.us-east-1.amazonaws.com/123456789012/my-queue").unwrap();
        let address = QueueAddress::parse(&locator, &queue_hosts()).unwrap();
        assert_eq!(address.region(), "us-east-1");
        assert_eq!(address.queue_name(), "my-queue");
        assert_eq!(
            address.queue_url(),
            "https://sqs.us-east-1.amazonaws.com/123456789012/my-queue"
        );
    }

    #[test]
    fn test_queue_locator_empty_region_fails() {
        // Either the URL parser or the host pattern rejects the empty label.
        let result = Locator::parse("https://sqs..amazonaws.com/123456789012/my-queue")
            .and_then(|locator| QueueAddress::parse(&locator, &queue_hosts()));
        assert!(matches!(result, Err(CirrusError::InvalidLocator(_))));
    }

    #[test]
    fn test_queue_locator_requires_https_and_path() {
        let hosts = queue_hosts();
        let wrong_scheme =
            Locator::parse("sqs://sqs.us-east-1.amazonaws.com/123456789012/my-queue").unwrap();
        assert!(QueueAddress::parse(&wrong_scheme, &hosts).is_err());

        let no_path = Locator::parse("https://sqs.us-east-1.amazonaws.com").unwrap();
        assert!(matches!(
            QueueAddress::parse(&no_path, &hosts),
            Err(CirrusError::InvalidLocator(_))
        ));

        let wrong_host = Locator::parse("https://queue.example.com/123/q").unwrap();
        assert!(QueueAddress::parse(&wrong_host, &hosts).is_err());
    }

    #[test]
    fn test_topic_locator_derives_arn() {
        let hosts = TopicHostPolicy::Topic.host_pattern("amazonaws.com").unwrap();
        let locator =
            Locator::parse("sns://sns.eu-west-1.amazonaws.com/123456789012/alerts").unwrap();
        let address = TopicAddress::parse(&locator, &["sns"], &hosts).unwrap();
        assert_eq!(address.region(), "eu-west-1");
        assert_eq!(address.account(), "123456789012");
        assert_eq!(address.topic(), "alerts");
        assert_eq!(
            address.topic_arn(),
            "arn:aws:sns:eu-west-1:123456789012:alerts"
        );
    }

    #[test]
    fn test_topic_locator_queue_host_policy() {
        let sqs_host = Locator::parse("sns://sqs.eu-west-1.amazonaws.com/123/alerts").unwrap();

        let topic_hosts = TopicHostPolicy::Topic.host_pattern("amazonaws.com").unwrap();
        assert!(TopicAddress::parse(&sqs_host, &["sns"], &topic_hosts).is_err());

        let queue_hosts = TopicHostPolicy::Queue.host_pattern("amazonaws.com").unwrap();
        assert!(TopicAddress::parse(&sqs_host, &["sns"], &queue_hosts).is_ok());
    }

    #[test]
    fn test_topic_locator_requires_account_and_topic() {
        let hosts = TopicHostPolicy::Topic.host_pattern("amazonaws.com").unwrap();
        let locator = Locator::parse("sns://sns.eu-west-1.amazonaws.com/alerts").unwrap();
        assert!(matches!(
            TopicAddress::parse(&locator, &["sns"], &hosts),
            Err(CirrusError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_key_style_and_policy_from_str() {
        assert_eq!("trim".parse::<KeyStyle>().unwrap(), KeyStyle::Trim);
        assert_eq!(
            "Preserve".parse::<KeyStyle>().unwrap(),
            KeyStyle::PreserveLeadingSlash
        );
        assert!("keep".parse::<KeyStyle>().is_err());
        assert_eq!(
            "queue".parse::<TopicHostPolicy>().unwrap(),
            TopicHostPolicy::Queue
        );
    }
}
