//! Error taxonomy for acceptance runs.
//!
//! Every failure a scenario can hit falls into one of four buckets: a broken
//! configuration, an infrastructure fault (transport, HTTP status, timeout),
//! a node-reported rejection, or an assertion that did not hold. Rejections
//! are only failures when the scenario did not expect them, so they are kept
//! as a separate variant carrying the node's message verbatim.

use std::time::Duration;

use alloy_core::primitives::B256;
use thiserror::Error;

/// Substring returned by a node when a private transaction carries ether.
pub const PRIVATE_VALUE_REJECTION: &str = "ether value is not supported for private transactions";

/// Substring returned by a node that does not know a (private) contract address.
pub const INVALID_ADDRESS: &str = "invalid address";

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{method} request to {endpoint} failed: {source}")]
    Transport {
        method: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} request to {endpoint} timed out")]
    Timeout { method: String, endpoint: String },

    #[error("{method} request to {endpoint} returned HTTP {status}")]
    HttpStatus {
        method: String,
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid {method} response: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("{method} rejected by node: {message}")]
    Rpc {
        method: String,
        code: Option<i64>,
        message: String,
    },

    #[error("timed out waiting for finality of {tx_hash} after {waited:?}")]
    FinalityTimeout { tx_hash: B256, waited: Duration },

    #[error("assertion failed [{context}]: {message} (expected {expected}, actual {actual})")]
    Assertion {
        context: String,
        message: String,
        expected: String,
        actual: String,
    },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("callback listener failed: {0}")]
    Callback(#[from] std::io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Coarse classification used by the suite runner when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    Infrastructure,
    Timeout,
    Rejection,
    Assertion,
}

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build an assertion failure with the observed and expected values.
    pub fn assertion(
        context: impl Into<String>,
        message: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::Assertion {
            context: context.into(),
            message: message.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Signing(_) => ErrorKind::Configuration,
            Self::Transport { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidResponse { .. }
            | Self::Callback(_) => ErrorKind::Infrastructure,
            Self::Timeout { .. } | Self::FinalityTimeout { .. } => ErrorKind::Timeout,
            Self::Rpc { .. } => ErrorKind::Rejection,
            Self::Assertion { .. } => ErrorKind::Assertion,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Whether this is a node-reported rejection whose message contains `needle`.
    ///
    /// Transport and assertion errors never match, even if their text does.
    pub fn is_rejection_containing(&self, needle: &str) -> bool {
        match self {
            Self::Rpc { message, .. } => message.contains(needle),
            _ => false,
        }
    }
}

/// Assert that two values are equal, producing a [`HarnessError::Assertion`] otherwise.
pub fn ensure_eq<T>(context: &str, message: &str, expected: T, actual: T) -> HarnessResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::assertion(
            context,
            message,
            format!("{:?}", expected),
            format!("{:?}", actual),
        ))
    }
}

/// Assert that two values differ.
pub fn ensure_ne<T>(context: &str, message: &str, unexpected: T, actual: T) -> HarnessResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if unexpected != actual {
        Ok(())
    } else {
        Err(HarnessError::assertion(
            context,
            message,
            format!("anything but {:?}", unexpected),
            format!("{:?}", actual),
        ))
    }
}
