//! Resource locators
//!
//! A [`Locator`] is the opaque, immutable address a caller hands to a provider
//! (`s3://endpoint/bucket/key`, `https://sqs.us-east-1.amazonaws.com/123456789012/queue`).
//! Backend-specific structure is derived from it by the address types in
//! [`crate::address`].

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use regex::Regex;
use url::Url;

use crate::error::{CirrusError, CirrusResult};

/// Parsed resource locator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    url: Url,
}

impl Locator {
    /// Parse a locator string.
    ///
    /// Fails with `InvalidLocator` for anything that is not an absolute URL.
    pub fn parse(input: &str) -> CirrusResult<Self> {
        let url = Url::parse(input)
            .map_err(|e| CirrusError::InvalidLocator(format!("{}: {}", input, e)))?;
        Ok(Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Authority (host) of the locator, empty when absent
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// Percent-encoded path, including the leading `/` when present
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl FromStr for Locator {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s)
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.url.as_str())
    }
}

/// Host pattern of a managed cloud service endpoint: `<service>.<region>.<domain>`
#[derive(Debug, Clone)]
pub struct HostPattern {
    service: String,
    domain: String,
    regex: Regex,
}

impl HostPattern {
    pub fn new(service: &str, domain: &str) -> CirrusResult<Self> {
        let pattern = format!(
            r"^{}\.([^.]+)\.{}$",
            regex::escape(service),
            regex::escape(domain)
        );
        let regex = Regex::new(&pattern).map_err(|e| {
            CirrusError::ConfigUnavailable(format!("Invalid host pattern {}: {}", pattern, e))
        })?;
        Ok(Self {
            service: service.to_string(),
            domain: domain.to_string(),
            regex,
        })
    }

    /// Region segment of `host`, or `None` when the host does not match.
    pub fn region<'a>(&self, host: &'a str) -> Option<&'a str> {
        self.regex
            .captures(host)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub fn matches(&self, host: &str) -> bool {
        self.region(host).is_some()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}
