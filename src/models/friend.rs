use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle states of a [FriendRequest].
///
/// `Accepted` and `Declined` are terminal; no transition leaves them.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting for the recipient to accept or decline
    Pending,
    /// The recipient accepted; the friendship pair has been written
    Accepted,
    /// The recipient declined
    Declined,
}

impl RequestStatus {
    /// The wire representation, usable as a query filter value
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

/// A directional friend request.
///
/// Created by the sender, mutated only by the recipient. At most one pending
/// request should exist per ordered user pair; the store does not enforce
/// this, see [RelationshipService::send_friend_request].
///
/// [RelationshipService::send_friend_request]: crate::service::RelationshipService::send_friend_request
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Store-assigned id, duplicated into the document
    pub id: String,

    /// The sending user
    pub from_user_id: String,

    /// The receiving user
    pub to_user_id: String,

    /// Snapshot of the sender's name at request time
    pub from_user_name: String,

    /// Snapshot of the sender's email at request time
    pub from_user_email: String,

    /// Snapshot of the sender's profile picture at request time
    #[serde(rename = "fromUserPhotoURL", default)]
    pub from_user_photo_url: Option<String>,

    /// Snapshot of the recipient's name at request time
    pub to_user_name: String,

    /// Snapshot of the recipient's email at request time
    pub to_user_email: String,

    /// Current lifecycle state
    pub status: RequestStatus,

    /// Server-assigned creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Server-assigned time of the last state change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The status of a [Friendship] record.
///
/// There is no "removed" state; removal deletes both records.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    /// The friendship is in effect
    Active,
}

/// One half of a friendship.
///
/// This document has to be created 2 times for every relation, once under
/// each participant's friend list and keyed by the other participant's id.
/// Both halves are always written and deleted together in one batch, never
/// independently.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    /// The *other* participant
    pub user_id: String,

    /// Denormalized name of the other participant
    pub name: String,

    /// Denormalized email of the other participant
    pub email: String,

    /// Denormalized username of the other participant
    pub username: String,

    /// Denormalized profile picture of the other participant
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,

    /// Server-assigned time the request was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friends_since: Option<DateTime<Utc>>,

    /// Server-assigned time of the last interaction between the two
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction: Option<DateTime<Utc>>,

    /// Always [FriendshipStatus::Active] while the record exists
    pub status: FriendshipStatus,
}
