//! The friend request and friendship state machine.
//!
//! Requests move `pending -> accepted | declined` and never leave a terminal
//! state. A friendship is one logical edge materialized as two documents,
//! one under each participant's friend list; the two are always written and
//! deleted together in a single batch, so a reader can never observe one
//! half without the other.

use std::sync::Arc;

use log::warn;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::models::{FriendRequest, Friendship, FriendshipStatus, RequestStatus, User};
use crate::service::{
    friend_doc, friends_collection, request_doc, requests_collection, validate_id,
    DirectoryService, ServiceError, ServiceResult,
};
use crate::store::{
    decode, Direction, DocumentStore, FieldValue, Fields, Precondition, Query, StoreError,
    WriteBatch,
};

/// A directory match enriched with the requester's relation to it
#[derive(Serialize, ToSchema, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchResult {
    /// Id of the matched user
    pub user_id: String,
    /// Display name of the matched user
    #[schema(example = "Herbert")]
    pub name: String,
    /// Email of the matched user
    #[schema(example = "herbert@example.com")]
    pub email: String,
    /// Username of the matched user
    #[schema(example = "herbert")]
    pub username: String,
    /// Profile picture of the matched user
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Whether a friendship record exists from the requester to this user
    pub is_friend: bool,
    /// Whether the requester has a pending outbound request to this user
    pub request_pending: bool,
}

/// Owns the friend request lifecycle and the bidirectional friendship pairs
pub struct RelationshipService {
    store: Arc<dyn DocumentStore>,
    directory: Arc<DirectoryService>,
}

impl RelationshipService {
    /// Create the service on top of a store and the user directory
    pub fn new(store: Arc<dyn DocumentStore>, directory: Arc<DirectoryService>) -> Self {
        Self { store, directory }
    }

    /// Search the directory, excluding the requester and annotating each
    /// match with the relation flags. Side-effect free.
    pub async fn search_users(
        &self,
        query: &str,
        requester_id: &str,
    ) -> ServiceResult<Vec<UserSearchResult>> {
        validate_id(requester_id)?;
        let candidates = self.directory.candidates(query).await?;

        let mut results = Vec::with_capacity(candidates.len());
        for entry in candidates {
            if entry.user_id == requester_id {
                continue;
            }

            let is_friend = self
                .store
                .get(&friend_doc(requester_id, &entry.user_id))
                .await?
                .is_some();
            let request_pending = self.pending_between(requester_id, &entry.user_id).await?;

            results.push(UserSearchResult {
                user_id: entry.user_id,
                name: entry.name,
                email: entry.email,
                username: entry.username,
                photo_url: entry.photo_url,
                is_friend,
                request_pending,
            });
        }

        Ok(results)
    }

    /// Create a pending friend request from one user to another.
    ///
    /// Rejected if a pending request exists in either direction or the pair
    /// is already (fully) friends. The duplicate check is read-then-write:
    /// two concurrent sends for the same pair can both pass it, as the store
    /// enforces no uniqueness. Accepting either request keeps the data
    /// consistent, the loser merely stays pending.
    pub async fn send_friend_request(
        &self,
        from_user_id: &str,
        to_user_id: &str,
    ) -> ServiceResult<String> {
        validate_id(from_user_id)?;
        validate_id(to_user_id)?;
        if from_user_id == to_user_id {
            return Err(ServiceError::Forbidden);
        }

        let sender = self
            .directory
            .user(from_user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        let recipient = self
            .directory
            .user(to_user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if self.pending_between(from_user_id, to_user_id).await?
            || self.pending_between(to_user_id, from_user_id).await?
        {
            return Err(ServiceError::DuplicateRequest);
        }

        if self.fully_friends(from_user_id, to_user_id).await? {
            return Err(ServiceError::AlreadyFriends);
        }

        let id = self.store.allocate_id();
        let request = FriendRequest {
            id: id.clone(),
            from_user_id: sender.user_id,
            to_user_id: recipient.user_id,
            from_user_name: sender.name,
            from_user_email: sender.email,
            from_user_photo_url: sender.photo_url,
            to_user_name: recipient.name,
            to_user_email: recipient.email,
            status: RequestStatus::Pending,
            created_at: None,
            updated_at: None,
        };

        let fields = Fields::serialize(&request)?
            .field("createdAt", FieldValue::ServerTimestamp)
            .field("updatedAt", FieldValue::ServerTimestamp);

        self.store.set(request_doc(&id), fields).await?;

        Ok(id)
    }

    /// Accept a pending request addressed to `acting_user_id`.
    ///
    /// Writes both friendship records and flips the request to `accepted` in
    /// one all-or-nothing batch. The pending status is re-verified by the
    /// store at write time, so a concurrent resolve surfaces as
    /// [ServiceError::AlreadyResolved] instead of a double apply; replaying
    /// the two `Set`s would be harmless either way.
    pub async fn accept_friend_request(
        &self,
        request_id: &str,
        acting_user_id: &str,
    ) -> ServiceResult<()> {
        let request = self.pending_request(request_id, acting_user_id).await?;

        let sender = self
            .directory
            .user(&request.from_user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        let recipient = self
            .directory
            .user(&request.to_user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let batch = WriteBatch::new()
            .set(
                friend_doc(&sender.user_id, &recipient.user_id),
                friendship_fields(&recipient)?,
            )
            .set(
                friend_doc(&recipient.user_id, &sender.user_id),
                friendship_fields(&sender)?,
            )
            .update_if(
                request_doc(request_id),
                Fields::new()
                    .field("status", FieldValue::Json(json!("accepted")))
                    .field("updatedAt", FieldValue::ServerTimestamp),
                Precondition::FieldEquals("status".to_string(), json!("pending")),
            );

        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed(_)) => Err(ServiceError::AlreadyResolved),
            Err(err) => Err(err.into()),
        }
    }

    /// Decline a pending request addressed to `acting_user_id`
    pub async fn decline_friend_request(
        &self,
        request_id: &str,
        acting_user_id: &str,
    ) -> ServiceResult<()> {
        self.pending_request(request_id, acting_user_id).await?;

        let update = Fields::new()
            .field("status", FieldValue::Json(json!("declined")))
            .field("updatedAt", FieldValue::ServerTimestamp);
        let batch = WriteBatch::new().update_if(
            request_doc(request_id),
            update,
            Precondition::FieldEquals("status".to_string(), json!("pending")),
        );

        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed(_)) => Err(ServiceError::AlreadyResolved),
            Err(err) => Err(err.into()),
        }
    }

    /// The pending requests addressed to a user, newest first
    pub async fn list_friend_requests(&self, user_id: &str) -> ServiceResult<Vec<FriendRequest>> {
        let docs = self
            .store
            .query(
                Query::collection(requests_collection())
                    .filter("toUserId", json!(user_id))
                    .filter("status", json!(RequestStatus::Pending.as_str()))
                    .order_by("createdAt", Direction::Descending),
            )
            .await?;

        docs.into_iter()
            .map(|(_, doc)| Ok(decode(doc)?))
            .collect()
    }

    /// The active friendship records of a user, by name
    pub async fn list_friends(&self, user_id: &str) -> ServiceResult<Vec<Friendship>> {
        let docs = self
            .store
            .query(
                Query::collection(friends_collection(user_id))
                    .filter("status", json!("active"))
                    .order_by("name", Direction::Ascending),
            )
            .await?;

        docs.into_iter()
            .map(|(_, doc)| Ok(decode(doc)?))
            .collect()
    }

    /// Delete both halves of a friendship in one batch.
    ///
    /// Also cleans up a half-written pair: as long as at least one side
    /// exists, both paths are deleted together.
    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> ServiceResult<()> {
        validate_id(user_id)?;
        validate_id(friend_id)?;
        let own_side = friend_doc(user_id, friend_id);
        let other_side = friend_doc(friend_id, user_id);

        let any_side = self.store.get(&own_side).await?.is_some()
            || self.store.get(&other_side).await?.is_some();
        if !any_side {
            return Err(ServiceError::FriendNotFound);
        }

        let batch = WriteBatch::new().delete(own_side).delete(other_side);
        Ok(self.store.commit(batch).await?)
    }

    /// Fetch a request and check that `acting_user_id` may resolve it
    async fn pending_request(
        &self,
        request_id: &str,
        acting_user_id: &str,
    ) -> ServiceResult<FriendRequest> {
        validate_id(request_id)?;
        let doc = self
            .store
            .get(&request_doc(request_id))
            .await?
            .ok_or(ServiceError::RequestNotFound)?;
        let request: FriendRequest = decode(doc)?;

        if request.to_user_id != acting_user_id {
            return Err(ServiceError::Forbidden);
        }
        if request.status != RequestStatus::Pending {
            return Err(ServiceError::AlreadyResolved);
        }

        Ok(request)
    }

    /// Whether a pending request exists for the ordered pair
    async fn pending_between(&self, from_user_id: &str, to_user_id: &str) -> ServiceResult<bool> {
        let docs = self
            .store
            .query(
                Query::collection(requests_collection())
                    .filter("fromUserId", json!(from_user_id))
                    .filter("toUserId", json!(to_user_id))
                    .filter("status", json!(RequestStatus::Pending.as_str()))
                    .limit(1),
            )
            .await?;

        Ok(!docs.is_empty())
    }

    /// The strong already-friends check: both halves must exist and each
    /// half's `userId` must point back at the other participant. A partially
    /// written pair (e.g. from a failed accept on an older revision of this
    /// system) is logged and counts as not friends, so it can be repaired by
    /// a fresh request.
    async fn fully_friends(&self, user_id: &str, other_id: &str) -> ServiceResult<bool> {
        let own_side = self.store.get(&friend_doc(user_id, other_id)).await?;
        let other_side = self.store.get(&friend_doc(other_id, user_id)).await?;

        match (own_side, other_side) {
            (Some(own), Some(other)) => {
                let own: Friendship = decode(own)?;
                let other: Friendship = decode(other)?;
                if own.user_id == other_id && other.user_id == user_id {
                    Ok(true)
                } else {
                    warn!(
                        "Friendship records between {user_id} and {other_id} do not cross-reference"
                    );
                    Ok(false)
                }
            }
            (None, None) => Ok(false),
            _ => {
                warn!("One-sided friendship record between {user_id} and {other_id}");
                Ok(false)
            }
        }
    }
}

/// The field set of one friendship half; `other` is the participant the
/// record points at
fn friendship_fields(other: &User) -> Result<Fields, StoreError> {
    let friendship = Friendship {
        user_id: other.user_id.clone(),
        name: other.name.clone(),
        email: other.email.clone(),
        username: other.username.clone(),
        photo_url: other.photo_url.clone(),
        friends_since: None,
        last_interaction: None,
        status: FriendshipStatus::Active,
    };

    Ok(Fields::serialize(&friendship)?
        .field("friendsSince", FieldValue::ServerTimestamp)
        .field("lastInteraction", FieldValue::ServerTimestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;
    use crate::verify::IdentityClaims;

    async fn add_user(directory: &DirectoryService, uid: &str, name: &str) {
        directory
            .sync_profile(&IdentityClaims {
                uid: uid.to_string(),
                email: format!("{uid}@example.com"),
                name: Some(name.to_string()),
                picture: None,
            })
            .await
            .unwrap();
    }

    async fn setup(store: Arc<dyn DocumentStore>) -> RelationshipService {
        let directory = Arc::new(DirectoryService::new(store.clone()));
        for (uid, name) in [("a", "Alice"), ("b", "Bob"), ("c", "Carol")] {
            add_user(&directory, uid, name).await;
        }
        RelationshipService::new(store, directory)
    }

    #[tokio::test]
    async fn duplicate_send_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        service.send_friend_request("a", "b").await.unwrap();
        let err = service.send_friend_request("a", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRequest));

        // The reverse direction counts as a duplicate too
        let err = service.send_friend_request("b", "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRequest));
    }

    #[tokio::test]
    async fn send_to_unknown_user_fails() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        let err = service.send_friend_request("a", "ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[tokio::test]
    async fn accept_writes_both_sides_and_resolves_the_request() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.accept_friend_request(&id, "b").await.unwrap();

        let a_side = store.get(&friend_doc("a", "b")).await.unwrap().unwrap();
        let b_side = store.get(&friend_doc("b", "a")).await.unwrap().unwrap();
        assert_eq!(a_side.get("userId"), Some(&json!("b")));
        assert_eq!(b_side.get("userId"), Some(&json!("a")));

        let request = store.get(&request_doc(&id)).await.unwrap().unwrap();
        assert_eq!(request.get("status"), Some(&json!("accepted")));

        // Friends now show up in both lists
        assert_eq!(service.list_friends("a").await.unwrap()[0].name, "Bob");
        assert_eq!(service.list_friends("b").await.unwrap()[0].name, "Alice");
    }

    #[tokio::test]
    async fn accept_by_stranger_is_forbidden_and_leaves_the_request_pending() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        let err = service.accept_friend_request(&id, "c").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let request = store.get(&request_doc(&id)).await.unwrap().unwrap();
        assert_eq!(request.get("status"), Some(&json!("pending")));
        assert!(store.get(&friend_doc("a", "b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accepting_twice_reports_already_resolved() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.accept_friend_request(&id, "b").await.unwrap();

        let err = service.accept_friend_request(&id, "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyResolved));
    }

    #[tokio::test]
    async fn declined_requests_stay_declined() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.decline_friend_request(&id, "b").await.unwrap();

        let request = store.get(&request_doc(&id)).await.unwrap().unwrap();
        assert_eq!(request.get("status"), Some(&json!("declined")));

        let err = service.accept_friend_request(&id, "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyResolved));
        assert!(store.get(&friend_doc("a", "b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_request_reports_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        let err = service.accept_friend_request("nope", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestNotFound));
    }

    #[tokio::test]
    async fn pending_requests_are_listed_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        service.send_friend_request("a", "c").await.unwrap();
        service.send_friend_request("b", "c").await.unwrap();

        let requests = service.list_friend_requests("c").await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].from_user_id, "b");
        assert_eq!(requests[1].from_user_id, "a");

        // Resolved requests drop out of the list
        service
            .decline_friend_request(&requests[0].id, "c")
            .await
            .unwrap();
        assert_eq!(service.list_friend_requests("c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_friend_deletes_both_sides() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.accept_friend_request(&id, "b").await.unwrap();

        service.remove_friend("a", "b").await.unwrap();
        assert!(store.get(&friend_doc("a", "b")).await.unwrap().is_none());
        assert!(store.get(&friend_doc("b", "a")).await.unwrap().is_none());

        let err = service.remove_friend("a", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::FriendNotFound));
    }

    #[tokio::test]
    async fn sending_to_an_existing_friend_is_rejected() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.accept_friend_request(&id, "b").await.unwrap();

        let err = service.send_friend_request("a", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyFriends));

        // A half-written pair does not count as friends; a new request may
        // repair it
        store.delete(friend_doc("b", "a")).await.unwrap();
        service.send_friend_request("a", "b").await.unwrap();
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let service = setup(store.clone()).await;

        let err = service
            .send_friend_request("a", "b/friends/a")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));
        assert!(store.get(&friend_doc("b", "a")).await.unwrap().is_none());

        let err = service.remove_friend("a", "b.c").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));

        let err = service
            .accept_friend_request("r/../r2", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));
    }

    #[tokio::test]
    async fn failed_accept_batch_leaves_no_partial_friendship() {
        let store: Arc<FlakyStore> = Arc::new(FlakyStore::new());
        let service = setup(store.clone()).await;

        let id = service.send_friend_request("a", "b").await.unwrap();

        store.fail_next_commit();
        let err = service.accept_friend_request(&id, "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        // Neither friendship half may exist and the request must still be
        // pending, so the retry below can succeed
        assert!(store.get(&friend_doc("a", "b")).await.unwrap().is_none());
        assert!(store.get(&friend_doc("b", "a")).await.unwrap().is_none());
        let request = store.get(&request_doc(&id)).await.unwrap().unwrap();
        assert_eq!(request.get("status"), Some(&json!("pending")));

        service.accept_friend_request(&id, "b").await.unwrap();
        assert!(store.get(&friend_doc("a", "b")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn search_excludes_requester_and_annotates_relations() {
        let store = Arc::new(MemoryStore::new());
        let service = setup(store).await;

        let id = service.send_friend_request("a", "b").await.unwrap();
        service.accept_friend_request(&id, "b").await.unwrap();
        service.send_friend_request("a", "c").await.unwrap();

        // All three test users share the example.com domain
        assert!(service.search_users("x", "a").await.unwrap().is_empty());

        let results = service.search_users("example.com", "a").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.user_id != "a"));

        let bob = results.iter().find(|r| r.user_id == "b").unwrap();
        assert!(bob.is_friend);
        assert!(!bob.request_pending);

        let carol = results.iter().find(|r| r.user_id == "c").unwrap();
        assert!(!carol.is_friend);
        assert!(carol.request_pending);
    }
}
