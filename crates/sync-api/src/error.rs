use std::error::Error as StdError;

use atc_contracts::SchemaError;
use serde_json::{Map, Value};
use thiserror::Error;

/// The four failure kinds every synchronization call can produce.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Remote,
    Transport,
    Schema,
}

impl SyncError {
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Remote(_) => ErrorKind::Remote,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Schema(_) => ErrorKind::Schema,
        }
    }

    /// Status code of a remote failure; other kinds never carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote(err) => Some(err.status),
            _ => None,
        }
    }
}

/// The engine answered with a non-success status.
///
/// `fields` holds whatever the error body decoded to. A body that was not
/// JSON is kept as its raw text under `detail`; an empty body leaves
/// `fields` empty.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("engine responded with status {status}{}", describe(.fields))]
pub struct RemoteError {
    pub status: u16,
    pub fields: Map<String, Value>,
}

impl RemoteError {
    pub fn from_payload(status: u16, payload: Value) -> Self {
        let fields = match payload {
            Value::Object(fields) => fields,
            other => {
                let mut fields = Map::new();
                fields.insert("detail".to_string(), other);
                fields
            }
        };
        Self { status, fields }
    }

    pub fn detail(&self) -> Option<String> {
        self.text_field("detail")
    }

    pub fn message(&self) -> Option<String> {
        self.text_field("message")
    }

    fn text_field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn describe(fields: &Map<String, Value>) -> String {
    let text = |name: &str| match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    };

    match (text("detail"), text("message")) {
        (Some(detail), Some(message)) => format!(": {detail} ({message})"),
        (Some(reason), None) | (None, Some(reason)) => format!(": {reason}"),
        (None, None) => String::new(),
    }
}

/// The call never produced a response: connection failure, timeout, or an
/// unreadable body.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct TransportError {
    context: String,
    timed_out: bool,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            timed_out: false,
            source: source.into(),
        }
    }

    pub fn timeout(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            timed_out: true,
            ..Self::new(context, source)
        }
    }

    pub fn from_reqwest(context: impl Into<String>, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(context, err)
        } else {
            Self::new(context, err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid value for {name}: `{value}`")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
