use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The role of a group member
#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// The creator of the group
    Owner,
    /// A regular member
    Member,
}

/// The status of a group member
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// The member counts towards `memberCount`
    Active,
}

/// A member entry inside [Group::members]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// Denormalized name of the member
    pub name: String,

    /// Denormalized email of the member
    pub email: String,

    /// Denormalized profile picture of the member
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,

    /// Server-assigned time the member joined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,

    /// Role inside the group
    pub role: MemberRole,

    /// Membership status
    pub status: MemberStatus,
}

/// A group of users coordinating a meetup.
///
/// `member_count` is a denormalized counter over the active entries of
/// `members`; every mutation that adds a member must increment it in the
/// same atomic batch, using the store's increment primitive.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Store-assigned id, duplicated into the document
    pub group_id: String,

    /// Display name of the group
    pub name: String,

    /// 6-character join code. Unique by convention, not enforced by the
    /// store.
    pub invite_code: String,

    /// All members, keyed by user id
    pub members: BTreeMap<String, MemberRecord>,

    /// Number of entries in `members` with active status
    pub member_count: i64,

    /// Server-assigned time of the last mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Server-assigned time of the last activity in the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Who authored a chat message
#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Written by a group member
    User,
    /// Written by the server, e.g. join announcements
    System,
}

/// A message in a group's chat
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// The authoring user, or `"system"` for system messages
    pub sender_id: String,

    /// Denormalized name of the author
    pub sender_name: String,

    /// The message text
    pub content: String,

    /// Distinguishes member messages from server announcements
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Server-assigned time the message was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
