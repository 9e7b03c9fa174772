//! Error types for the interception layer.
//!
//! Instrumentation errors never reach the caller of an intercepted operation:
//! `HookError` is returned from install-time calls only, `SerializationError`
//! and `SinkError` are contained by the recorder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object_model::{FunctionId, HostError, ObjectHandle};
use crate::vault::InterceptionKey;

/// Install-time and vault errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HookError {
    #[error("interception point `{key}` is already captured")]
    AlreadyCaptured { key: InterceptionKey },
    #[error("interception point `{key}` was never captured")]
    NotCaptured { key: InterceptionKey },
    #[error("member `{key}` is not callable (found {found})")]
    NotCallable { key: InterceptionKey, found: String },
    #[error("member `{key}` is not configurable")]
    NotConfigurable { key: InterceptionKey },
    #[error("host failure during install: {0}")]
    Host(HostError),
}

impl HookError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::AlreadyCaptured { .. } => "FE-HOOK-0001",
            Self::NotCaptured { .. } => "FE-HOOK-0002",
            Self::NotCallable { .. } => "FE-HOOK-0003",
            Self::NotConfigurable { .. } => "FE-HOOK-0004",
            Self::Host(_) => "FE-HOOK-0005",
        }
    }
}

impl From<HostError> for HookError {
    fn from(error: HostError) -> Self {
        Self::Host(error)
    }
}

/// A payload that cannot be rendered to a log-safe string.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SerializationError {
    #[error("converting circular structure at {object}")]
    Circular { object: ObjectHandle },
    #[error("payload nesting exceeds {max} levels")]
    TooDeep { max: usize },
    #[error("payload references missing {object}")]
    DanglingObject { object: ObjectHandle },
    #[error("payload references missing {function}")]
    DanglingFunction { function: FunctionId },
    #[error("encoding failure: {detail}")]
    Encoding { detail: String },
}

impl SerializationError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::Circular { .. } => "FE-HOOK-0101",
            Self::TooDeep { .. } => "FE-HOOK-0102",
            Self::DanglingObject { .. } | Self::DanglingFunction { .. } => "FE-HOOK-0103",
            Self::Encoding { .. } => "FE-HOOK-0104",
        }
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(error: serde_json::Error) -> Self {
        Self::Encoding {
            detail: error.to_string(),
        }
    }
}

/// Failure reported by an activity sink.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SinkError {
    #[error("sink `{sink}` unavailable: {detail}")]
    Unavailable { sink: String, detail: String },
    #[error("sink write failure: {0}")]
    Write(String),
}

impl SinkError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "FE-HOOK-0201",
            Self::Write(_) => "FE-HOOK-0202",
        }
    }
}

/// Failure loading or resolving a bootstrap inventory.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum InventoryError {
    #[error("inventory parse failure: {detail}")]
    Parse { detail: String },
    #[error("inventory names unbound owner `{owner}`")]
    UnboundOwner { owner: String },
}

impl InventoryError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "FE-HOOK-0301",
            Self::UnboundOwner { .. } => "FE-HOOK-0302",
        }
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse {
            detail: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> InterceptionKey {
        InterceptionKey::new(ObjectHandle(3), "Service", "fetchData")
    }

    #[test]
    fn display_names_the_interception_point() {
        let err = HookError::AlreadyCaptured { key: key() };
        assert_eq!(
            err.to_string(),
            "interception point `Service#3.fetchData` is already captured"
        );
    }

    #[test]
    fn stable_codes_are_distinct() {
        let errors = [
            HookError::AlreadyCaptured { key: key() },
            HookError::NotCaptured { key: key() },
            HookError::NotCallable {
                key: key(),
                found: "number".to_string(),
            },
            HookError::NotConfigurable { key: key() },
            HookError::Host(HostError::ObjectNotFound(ObjectHandle(9))),
        ];
        let codes: std::collections::BTreeSet<_> =
            errors.iter().map(HookError::stable_code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn hook_error_serde_roundtrip() {
        let err = HookError::NotCaptured { key: key() };
        let json = serde_json::to_string(&err).expect("serialize");
        let restored: HookError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, restored);
    }

    #[test]
    fn serialization_error_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SerializationError::from(json_err);
        assert_eq!(err.stable_code(), "FE-HOOK-0104");
    }
}
