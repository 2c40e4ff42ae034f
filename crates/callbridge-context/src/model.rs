//! The `CallContext` entity (§3, §4.5).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::error::ContextError;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum CallStatus {
    #[display(fmt = "pending")]
    Pending,
    #[display(fmt = "queued")]
    Queued,
    #[display(fmt = "claimed")]
    Claimed,
    #[display(fmt = "completed")]
    Completed,
    #[display(fmt = "failed")]
    Failed,
}

impl CallStatus {
    fn parse(s: &str) -> Result<Self, ContextError> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "claimed" => Ok(Self::Claimed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ContextError::Corrupt(format!("unknown status {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum CallDirection {
    #[display(fmt = "inbound")]
    Inbound,
    #[display(fmt = "outbound")]
    Outbound,
}

impl CallDirection {
    fn parse(s: &str) -> Result<Self, ContextError> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(ContextError::Corrupt(format!("unknown direction {other:?}"))),
        }
    }
}

/// One inbound or outbound call's persisted setup state (§3).
#[derive(Clone, Debug, PartialEq)]
pub struct CallContext {
    /// Empty until `Save` assigns a UUID.
    pub context_id: String,
    pub status: CallStatus,
    pub assistant_id: String,
    pub conversation_id: String,
    pub project_id: String,
    pub organization_id: String,
    pub auth_token: String,
    pub auth_type: String,
    pub provider: String,
    pub direction: CallDirection,
    pub caller_number: String,
    pub callee_number: String,
    pub from_number: String,
    pub assistant_provider_id: String,
    /// Provider-side identifier: Twilio CallSid, Vonage UUID, Asterisk
    /// channel ID, SIP Call-ID.
    pub channel_uuid: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller may mutate through `UpdateField` (§4.5).
pub const UPDATABLE_FIELDS: &[&str] = &["channel_uuid", "status", "provider"];

impl CallContext {
    /// Builds a fresh inbound call context (`Status = pending`), with no
    /// context id assigned yet.
    #[must_use]
    pub fn new_inbound(assistant_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self::new(CallDirection::Inbound, CallStatus::Pending, assistant_id, conversation_id)
    }

    /// Builds a fresh outbound call context (`Status = queued`), with no
    /// context id assigned yet.
    #[must_use]
    pub fn new_outbound(assistant_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self::new(CallDirection::Outbound, CallStatus::Queued, assistant_id, conversation_id)
    }

    fn new(direction: CallDirection, status: CallStatus, assistant_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            context_id: String::new(),
            status,
            assistant_id: assistant_id.into(),
            conversation_id: conversation_id.into(),
            project_id: String::new(),
            organization_id: String::new(),
            auth_token: String::new(),
            auth_type: String::new(),
            provider: String::new(),
            direction,
            caller_number: String::new(),
            callee_number: String::new(),
            from_number: String::new(),
            assistant_provider_id: String::new(),
            channel_uuid: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn to_hash_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("status", self.status.to_string()),
            ("assistant_id", self.assistant_id.clone()),
            ("conversation_id", self.conversation_id.clone()),
            ("project_id", self.project_id.clone()),
            ("organization_id", self.organization_id.clone()),
            ("auth_token", self.auth_token.clone()),
            ("auth_type", self.auth_type.clone()),
            ("provider", self.provider.clone()),
            ("direction", self.direction.to_string()),
            ("caller_number", self.caller_number.clone()),
            ("callee_number", self.callee_number.clone()),
            ("from_number", self.from_number.clone()),
            ("assistant_provider_id", self.assistant_provider_id.clone()),
            ("channel_uuid", self.channel_uuid.clone()),
            ("created_at", self.created_at.to_rfc3339()),
            ("updated_at", self.updated_at.to_rfc3339()),
        ]
    }

    pub(crate) fn from_hash_fields(context_id: &str, fields: &HashMap<String, String>) -> Result<Self, ContextError> {
        let get = |k: &str| -> Result<String, ContextError> {
            fields
                .get(k)
                .cloned()
                .ok_or_else(|| ContextError::Corrupt(format!("missing field {k:?}")))
        };
        let parse_time = |k: &str| -> Result<DateTime<Utc>, ContextError> {
            DateTime::parse_from_rfc3339(&get(k)?)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ContextError::Corrupt(e.to_string()))
        };
        Ok(Self {
            context_id: context_id.to_string(),
            status: CallStatus::parse(&get("status")?)?,
            assistant_id: get("assistant_id")?,
            conversation_id: get("conversation_id")?,
            project_id: get("project_id")?,
            organization_id: get("organization_id")?,
            auth_token: get("auth_token")?,
            auth_type: get("auth_type")?,
            provider: get("provider")?,
            direction: CallDirection::parse(&get("direction")?)?,
            caller_number: get("caller_number")?,
            callee_number: get("callee_number")?,
            from_number: get("from_number")?,
            assistant_provider_id: get("assistant_provider_id")?,
            channel_uuid: get("channel_uuid")?,
            created_at: parse_time("created_at")?,
            updated_at: parse_time("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_defaults_to_pending() {
        let cc = CallContext::new_inbound("assistant-1", "conv-1");
        assert_eq!(cc.status, CallStatus::Pending);
        assert_eq!(cc.direction, CallDirection::Inbound);
    }

    #[test]
    fn outbound_defaults_to_queued() {
        let cc = CallContext::new_outbound("assistant-1", "conv-1");
        assert_eq!(cc.status, CallStatus::Queued);
        assert_eq!(cc.direction, CallDirection::Outbound);
    }

    #[test]
    fn hash_field_round_trip_preserves_all_fields() {
        let mut cc = CallContext::new_inbound("assistant-1", "conv-1");
        cc.context_id = "ctx-1".to_string();
        cc.channel_uuid = "CA123".to_string();
        cc.provider = "twilio".to_string();

        let fields: HashMap<String, String> = cc.to_hash_fields().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let restored = CallContext::from_hash_fields(&cc.context_id, &fields).unwrap();
        assert_eq!(restored, cc);
    }
}
