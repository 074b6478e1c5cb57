//! Entities shared by the session registry, sync engine, and reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Transcript,
    Agent,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transcript" => Some(Self::Transcript),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    Public,
    System,
    Recipient,
}

impl ShareKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::System => "system",
            Self::Recipient => "recipient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "system" => Some(Self::System),
            "recipient" => Some(Self::Recipient),
            _ => None,
        }
    }
}

/// Highest-precedence grant a viewer holds on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Owner,
    Recipient,
    System,
    Public,
    None,
    Forbidden,
}

/// `{cwd, git_info}` as provided by a client, nested under `metadata` in the
/// init request. The deprecated top-level fields are handled by the caller
/// (logsync-server) applying precedence before this struct is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitMetadata {
    pub cwd: Option<String>,
    pub git_info: Option<Value>,
    pub hostname: Option<String>,
    pub username: Option<String>,
}

pub type GitInfo = Value;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_user_id: i64,
    pub external_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub git_info: Option<GitInfo>,
    pub summary: Option<String>,
    pub first_user_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Only owner access may observe `hostname`/`username`. Returns a copy
    /// with those fields nulled out for every other access type.
    pub fn project_for(&self, access: AccessType) -> Session {
        let mut projected = self.clone();
        if access != AccessType::Owner {
            projected.hostname = None;
            projected.username = None;
        }
        projected
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFile {
    pub session_id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub last_synced_line: i64,
    pub chunk_count: Option<i64>,
    pub latest_message_ts: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SyncFile {
    pub fn expected_first_line(&self) -> i64 {
        self.last_synced_line + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionShare {
    pub id: Uuid,
    pub session_id: Uuid,
    pub share_token: String,
    pub share_kind: ShareKind,
    pub recipient_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionShare {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventType {
    SessionEnd,
}

impl SessionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionEnd => "session_end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session_end" => Some(Self::SessionEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub event_type: SessionEventType,
    pub event_timestamp: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub status: UserStatus,
}
