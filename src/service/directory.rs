//! The user directory and its search projection.

use std::sync::Arc;

use itertools::Itertools;

use crate::models::{SearchIndexEntry, User};
use crate::service::{
    search_collection, search_doc, user_doc, validate_id, ServiceError, ServiceResult,
};
use crate::store::{
    decode, Direction, DocumentStore, FieldValue, Fields, Query, StoreError, WriteBatch,
};
use crate::verify::IdentityClaims;

/// Queries shorter than this return an empty result without hitting the store
pub const MIN_QUERY_LENGTH: usize = 2;

/// How many index entries a search scans at most.
///
/// Substring matching happens over this bounded candidate window, never over
/// the full directory.
const SEARCH_WINDOW: usize = 200;

/// Changes to apply to a user profile.
///
/// All fields are optional, but at least one of them is required.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New username
    pub username: Option<String>,
    /// New profile picture
    pub photo_url: Option<String>,
}

/// Keeps user profiles and their search projection in sync
pub struct DirectoryService {
    store: Arc<dyn DocumentStore>,
}

impl DirectoryService {
    /// Create the service on top of a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch a user profile
    pub(crate) async fn user(&self, user_id: &str) -> ServiceResult<Option<User>> {
        match self.store.get(&user_doc(user_id)).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Mirror verified identity claims into the store.
    ///
    /// Creates the profile (and its search projection) on first authenticated
    /// access; afterwards the stored profile is authoritative and only
    /// changed through [DirectoryService::update_profile].
    pub async fn sync_profile(&self, claims: &IdentityClaims) -> ServiceResult<User> {
        validate_id(&claims.uid)?;

        if let Some(user) = self.user(&claims.uid).await? {
            return Ok(user);
        }

        let local_part = claims
            .email
            .split('@')
            .next()
            .unwrap_or(&claims.email)
            .to_string();

        let user = User {
            user_id: claims.uid.clone(),
            name: claims.name.clone().unwrap_or_else(|| local_part.clone()),
            email: claims.email.clone(),
            username: local_part,
            photo_url: claims.picture.clone(),
        };

        let profile = Fields::serialize(&user)?
            .field("createdAt", FieldValue::ServerTimestamp)
            .field("updatedAt", FieldValue::ServerTimestamp);

        let batch = WriteBatch::new().set(user_doc(&user.user_id), profile);
        let batch = append_index_op(batch, &user)?;
        self.store.commit(batch).await?;

        Ok(user)
    }

    /// Apply a profile edit and reindex in the same batch.
    ///
    /// The projection is replaced wholesale, so terms derived from old field
    /// values never linger.
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> ServiceResult<User> {
        validate_id(user_id)?;
        let mut user = self.user(user_id).await?.ok_or(ServiceError::UserNotFound)?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(photo_url) = update.photo_url {
            user.photo_url = Some(photo_url);
        }

        let profile =
            Fields::serialize(&user)?.field("updatedAt", FieldValue::ServerTimestamp);

        let batch = WriteBatch::new().update(user_doc(user_id), profile);
        let batch = append_index_op(batch, &user)?;
        self.store.commit(batch).await?;

        Ok(user)
    }

    /// Rebuild the search projection of a user.
    ///
    /// Hook for collaborators that write profiles outside of
    /// [DirectoryService::update_profile].
    pub async fn reindex_user(&self, user: &User) -> ServiceResult<()> {
        validate_id(&user.user_id)?;
        let batch = append_index_op(WriteBatch::new(), user)?;
        Ok(self.store.commit(batch).await?)
    }

    /// Case-insensitive substring search over a bounded window of the
    /// projection. Queries shorter than [MIN_QUERY_LENGTH] yield nothing.
    pub(crate) async fn candidates(&self, query: &str) -> ServiceResult<Vec<SearchIndexEntry>> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < MIN_QUERY_LENGTH {
            return Ok(Vec::new());
        }

        let window = self
            .store
            .query(
                Query::collection(search_collection())
                    .order_by("name", Direction::Ascending)
                    .limit(SEARCH_WINDOW),
            )
            .await?;

        let mut matches = Vec::new();
        for (_, doc) in window {
            let entry: SearchIndexEntry = decode(doc)?;
            if entry.search_terms.iter().any(|term| term.contains(&needle)) {
                matches.push(entry);
            }
        }

        Ok(matches)
    }
}

/// Append the replace-style index write for a user to a batch
fn append_index_op(batch: WriteBatch, user: &User) -> Result<WriteBatch, StoreError> {
    let entry = SearchIndexEntry {
        user_id: user.user_id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
        photo_url: user.photo_url.clone(),
        search_terms: search_terms(user),
    };

    Ok(batch.set(search_doc(&user.user_id), Fields::serialize(&entry)?))
}

/// Derive the de-duplicated, lowercased term set of a user: full name, each
/// name token, email, email local part and username
fn search_terms(user: &User) -> Vec<String> {
    let name = user.name.to_lowercase();
    let email = user.email.to_lowercase();
    let local_part = email.split('@').next().unwrap_or(&email).to_string();

    name.split_whitespace()
        .map(str::to_string)
        .chain([name.clone(), email, local_part, user.username.to_lowercase()])
        .filter(|term| !term.is_empty())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn claims(uid: &str, email: &str, name: &str) -> IdentityClaims {
        IdentityClaims {
            uid: uid.to_string(),
            email: email.to_string(),
            name: Some(name.to_string()),
            picture: None,
        }
    }

    fn service() -> DirectoryService {
        DirectoryService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn terms_cover_name_tokens_email_and_username() {
        let user = User {
            user_id: "u1".to_string(),
            name: "Alice B Carol".to_string(),
            email: "Alice@Example.com".to_string(),
            username: "alice".to_string(),
            photo_url: None,
        };

        let terms = search_terms(&user);
        for expected in ["alice b carol", "alice", "b", "carol", "alice@example.com"] {
            assert!(terms.contains(&expected.to_string()), "missing {expected}");
        }
        // "alice" appears as token, local part and username, but only once
        assert_eq!(terms.iter().filter(|t| *t == "alice").count(), 1);
    }

    #[tokio::test]
    async fn first_access_mirrors_the_profile() {
        let service = service();

        let user = service
            .sync_profile(&claims("u1", "alice@example.com", "Alice"))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");

        // A second sync returns the stored profile instead of rewriting it
        let again = service
            .sync_profile(&claims("u1", "alice@example.com", "Someone Else"))
            .await
            .unwrap();
        assert_eq!(again.name, "Alice");
    }

    #[tokio::test]
    async fn short_queries_return_nothing() {
        let service = service();
        service
            .sync_profile(&claims("u1", "alice@example.com", "Alice"))
            .await
            .unwrap();

        assert!(service.candidates("a").await.unwrap().is_empty());
        assert!(service.candidates(" a ").await.unwrap().is_empty());
        assert_eq!(service.candidates("al").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_edit_replaces_stale_terms() {
        let service = service();
        service
            .sync_profile(&claims("u1", "alice@example.com", "Alice Smith"))
            .await
            .unwrap();

        service
            .update_profile(
                "u1",
                ProfileUpdate {
                    name: Some("Beatrix Jones".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let by_new_name = service.candidates("beatrix").await.unwrap();
        assert_eq!(by_new_name.len(), 1);
        assert_eq!(by_new_name[0].name, "Beatrix Jones");

        // The old name token must no longer be findable
        assert!(service.candidates("smith").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reindex_hook_replaces_the_projection() {
        let service = service();
        service
            .sync_profile(&claims("u1", "alice@example.com", "Alice"))
            .await
            .unwrap();

        // A collaborator rewrote the profile out of band and calls the hook
        let rewritten = User {
            user_id: "u1".to_string(),
            name: "Allie".to_string(),
            email: "allie@example.com".to_string(),
            username: "allie".to_string(),
            photo_url: None,
        };
        service.reindex_user(&rewritten).await.unwrap();

        assert_eq!(service.candidates("allie").await.unwrap().len(), 1);
        assert!(service.candidates("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_like_uids_cannot_forge_foreign_documents() {
        let store = Arc::new(MemoryStore::new());
        let service = DirectoryService::new(store.clone());

        // A self-issued token could carry a uid addressing another user's
        // friend list
        let err = service
            .sync_profile(&claims("x/friends/y", "mallory@example.com", "Mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));

        // The document the uid pointed into must not have been created
        assert!(store
            .get(&crate::service::friend_doc("x", "y"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_of_unknown_user_fails() {
        let service = service();
        let err = service
            .update_profile("ghost", ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }
}
