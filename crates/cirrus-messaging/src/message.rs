//! Generic message envelope

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use cirrus_core::{CirrusError, CirrusResult};

/// Header carrying the backend receipt handle of a received message
pub const RECEIPT_HEADER: &str = "Receipt";
/// Header carrying the backend message id of a received message
pub const MESSAGE_ID_HEADER: &str = "MessageId";

/// Message body, headers and a read cursor over the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    headers: BTreeMap<String, Vec<u8>>,
    cursor: usize,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the body and rewind the read cursor.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.cursor = 0;
    }

    pub fn set_body_str(&mut self, body: &str) {
        self.set_body(body.as_bytes().to_vec());
    }

    /// Whole body as UTF-8 text
    pub fn read_as_str(&self) -> CirrusResult<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| CirrusError::InvalidPayload(format!("body is not UTF-8: {}", e)))
    }

    /// Serialize `value` as the JSON body.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> CirrusResult<()> {
        let body = serde_json::to_vec(value)
            .map_err(|e| CirrusError::InvalidPayload(format!("JSON encode failed: {}", e)))?;
        self.set_body(body);
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(&self) -> CirrusResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| CirrusError::InvalidPayload(format!("JSON decode failed: {}", e)))
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn remove_header(&mut self, name: &str) -> Option<Vec<u8>> {
        self.headers.remove(name)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Receipt handle set on received queue messages
    pub fn receipt(&self) -> Option<&str> {
        self.header_str(RECEIPT_HEADER)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header_str(MESSAGE_ID_HEADER)
    }
}

impl Read for Message {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.body[self.cursor.min(self.body.len())..];
        let read = remaining.len().min(buf.len());
        buf[..read].copy_from_slice(&remaining[..read]);
        self.cursor += read;
        Ok(read)
    }
}

impl Write for Message {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
