use std::collections::HashMap;
use std::time::Duration;

use redis::streams::StreamId;
use redis::Value;
use thiserror::Error;

/// One validated execution request from the spawn stream.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Opaque id echoed in the response.
    pub request_id: String,
    /// Executable path or name, followed by positional arguments.
    pub command: Vec<String>,
    /// `KEY=VALUE` entries appended after the worker's own environment.
    pub env: Vec<String>,
    pub timeout: Duration,
    /// Redis-assigned stream entry id, used only for acknowledgement.
    pub message_id: String,
}

/// Why a stream message could not be turned into a [`SpawnRequest`].
#[derive(Debug)]
pub enum ParseError {
    /// No usable `id` field: there is nothing to address a response to,
    /// so the message is acknowledged and abandoned.
    MissingId,
    /// The message carries an id but the payload is malformed; a failure
    /// response addressed to that id must be published.
    Rejected {
        request_id: String,
        reason: RejectReason,
    },
}

/// Human-readable rejection reasons, mirrored into the failure response.
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("Bad command spec")]
    BadCommand,
    #[error("Bad command spec: {0}")]
    BadCommandJson(serde_json::Error),
    #[error("Bad env spec")]
    BadEnv,
    #[error("Bad env spec: {0}")]
    BadEnvJson(serde_json::Error),
    #[error("Bad timeout spec")]
    BadTimeout,
    #[error("Bad timeout spec: {0}")]
    BadTimeoutFloat(std::num::ParseFloatError),
    #[error("Bad timeout spec: {0}")]
    BadTimeoutRange(String),
}

impl SpawnRequest {
    /// Validate one stream message.
    pub fn parse(message: &StreamId) -> Result<Self, ParseError> {
        let request_id = string_field(&message.map, "id").ok_or(ParseError::MissingId)?;

        match Self::parse_payload(&message.map) {
            Ok((command, env, timeout)) => Ok(Self {
                request_id,
                command,
                env,
                timeout,
                message_id: message.id.clone(),
            }),
            Err(reason) => Err(ParseError::Rejected { request_id, reason }),
        }
    }

    fn parse_payload(
        map: &HashMap<String, Value>,
    ) -> Result<(Vec<String>, Vec<String>, Duration), RejectReason> {
        let raw_command = string_field(map, "command").ok_or(RejectReason::BadCommand)?;
        let command: Vec<String> =
            serde_json::from_str(&raw_command).map_err(RejectReason::BadCommandJson)?;
        if command.is_empty() {
            return Err(RejectReason::BadCommand);
        }

        let raw_env = string_field(map, "env").ok_or(RejectReason::BadEnv)?;
        let env: Vec<String> = serde_json::from_str(&raw_env).map_err(RejectReason::BadEnvJson)?;

        let raw_timeout = string_field(map, "timeout").ok_or(RejectReason::BadTimeout)?;
        let seconds: f64 = raw_timeout.parse().map_err(RejectReason::BadTimeoutFloat)?;
        let timeout = Duration::try_from_secs_f64(seconds)
            .map_err(|e| RejectReason::BadTimeoutRange(e.to_string()))?;

        Ok((command, env, timeout))
    }
}

/// A field is usable only when it is present and string-kinded.
fn string_field(map: &HashMap<String, Value>, name: &str) -> Option<String> {
    match map.get(name)? {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}
