//! Group membership admission via invite codes.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde_json::json;

use crate::models::{
    ChatMessage, Group, MemberRecord, MemberRole, MemberStatus, MessageKind, User,
};
use crate::service::{
    group_doc, groups_collection, messages_collection, validate_id, ServiceError, ServiceResult,
};
use crate::store::{
    decode, Direction, DocumentStore, FieldValue, Fields, Precondition, Query, StoreError,
    WriteBatch,
};

/// Invite codes are exactly this long
pub const INVITE_CODE_LENGTH: usize = 6;

/// The characters an invite code is drawn from
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Sender id used for server-authored chat messages
const SYSTEM_SENDER: &str = "system";

/// A freshly created group
#[derive(Clone, Debug)]
pub struct NewGroup {
    /// Store-assigned group id
    pub group_id: String,
    /// Display name of the group
    pub name: String,
    /// The shareable join code
    pub invite_code: String,
}

/// The result of a join attempt
#[derive(Clone, Debug)]
pub struct JoinOutcome {
    /// Id of the joined group
    pub group_id: String,
    /// Name of the joined group
    pub group_name: String,
    /// True if the user was already an active member and nothing was changed
    pub already_member: bool,
}

/// Admits users into groups while keeping the member map and its
/// denormalized counter consistent
pub struct MembershipService {
    store: Arc<dyn DocumentStore>,
}

impl MembershipService {
    /// Create the service on top of a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a group with the creator as its only active member
    pub async fn create_group(&self, owner: &User, name: &str) -> ServiceResult<NewGroup> {
        validate_id(&owner.user_id)?;
        let group_id = self.store.allocate_id();
        let invite_code = generate_invite_code();

        let group = Group {
            group_id: group_id.clone(),
            name: name.to_string(),
            invite_code: invite_code.clone(),
            members: [(owner.user_id.clone(), member_record(owner, MemberRole::Owner))]
                .into_iter()
                .collect(),
            member_count: 1,
            updated_at: None,
            last_activity: None,
        };

        let fields = Fields::serialize(&group)?
            .field("createdAt", FieldValue::ServerTimestamp)
            .field("updatedAt", FieldValue::ServerTimestamp)
            .field("lastActivity", FieldValue::ServerTimestamp)
            .field(
                format!("members.{}.joinedAt", owner.user_id),
                FieldValue::ServerTimestamp,
            );

        let batch = WriteBatch::new().set(group_doc(&group_id), fields).set(
            messages_collection(&group_id).doc(self.store.allocate_id()),
            system_message_fields(&format!("{} created the group", owner.name))?,
        );
        self.store.commit(batch).await?;

        Ok(NewGroup {
            group_id,
            name: group.name,
            invite_code,
        })
    }

    /// Admit a user into the group behind an invite code.
    ///
    /// Idempotent: joining a group the user is already an active member of
    /// reports `already_member` and mutates nothing. Otherwise the member
    /// entry, the counter increment (an atomic store primitive, never
    /// read-increment-write), the activity timestamps and the join
    /// announcement are committed as one batch, guarded on the member entry
    /// still being absent at write time. The membership check is thereby
    /// re-verified by the store, not just at read time.
    pub async fn join_group_by_code(
        &self,
        member: &User,
        invite_code: &str,
    ) -> ServiceResult<JoinOutcome> {
        validate_id(&member.user_id)?;
        let code = invite_code.trim().to_uppercase();
        if code.chars().count() != INVITE_CODE_LENGTH {
            return Err(ServiceError::InvalidCodeFormat);
        }

        // Codes are unique by convention only; should duplicates exist, the
        // first match wins
        let mut groups = self
            .store
            .query(
                Query::collection(groups_collection())
                    .filter("inviteCode", json!(code))
                    .limit(1),
            )
            .await?;
        let (group_id, doc) = groups.pop().ok_or(ServiceError::InvalidCode)?;
        let group: Group = decode(doc)?;

        let is_active_member = group
            .members
            .get(&member.user_id)
            .map(|record| record.status == MemberStatus::Active)
            .unwrap_or(false);
        if is_active_member {
            return Ok(JoinOutcome {
                group_id,
                group_name: group.name,
                already_member: true,
            });
        }

        let batch = self.admission_batch(&group_id, member)?;
        match self.store.commit(batch).await {
            Ok(()) => Ok(JoinOutcome {
                group_id,
                group_name: group.name,
                already_member: false,
            }),
            // A concurrent join admitted the user between lookup and commit
            Err(StoreError::PreconditionFailed(_)) => Ok(JoinOutcome {
                group_id,
                group_name: group.name,
                already_member: true,
            }),
            // The group vanished between lookup and commit
            Err(StoreError::NotFound(_)) => Err(ServiceError::InvalidCode),
            Err(err) => Err(err.into()),
        }
    }

    /// Build the batch admitting a member: entry, counter increment,
    /// activity timestamps and the join announcement.
    ///
    /// The update is guarded on the member entry still being absent, so two
    /// admissions racing past the read-time check cannot double-increment
    /// the counter.
    fn admission_batch(&self, group_id: &str, member: &User) -> Result<WriteBatch, StoreError> {
        let record = member_record(member, MemberRole::Member);
        let admission = Fields::new()
            .field(
                format!("members.{}", member.user_id),
                FieldValue::Json(serde_json::to_value(&record)?),
            )
            .field(
                format!("members.{}.joinedAt", member.user_id),
                FieldValue::ServerTimestamp,
            )
            .field("memberCount", FieldValue::Increment(1))
            .field("updatedAt", FieldValue::ServerTimestamp)
            .field("lastActivity", FieldValue::ServerTimestamp);

        Ok(WriteBatch::new()
            .update_if(
                group_doc(group_id),
                admission,
                Precondition::FieldAbsent(format!("members.{}", member.user_id)),
            )
            .set(
                messages_collection(group_id).doc(self.store.allocate_id()),
                system_message_fields(&format!("{} joined the group", member.name))?,
            ))
    }

    /// Fetch a group; only active members may read it
    pub async fn get_group(&self, group_id: &str, user_id: &str) -> ServiceResult<Group> {
        validate_id(group_id)?;
        let doc = self
            .store
            .get(&group_doc(group_id))
            .await?
            .ok_or(ServiceError::GroupNotFound)?;
        let group: Group = decode(doc)?;

        let is_active_member = group
            .members
            .get(user_id)
            .map(|record| record.status == MemberStatus::Active)
            .unwrap_or(false);
        if !is_active_member {
            return Err(ServiceError::Forbidden);
        }

        Ok(group)
    }

    /// The chat messages of a group, oldest first; only active members may
    /// read them
    pub async fn list_messages(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ServiceResult<Vec<ChatMessage>> {
        self.get_group(group_id, user_id).await?;

        let docs = self
            .store
            .query(
                Query::collection(messages_collection(group_id))
                    .order_by("createdAt", Direction::Ascending),
            )
            .await?;

        docs.into_iter()
            .map(|(_, doc)| Ok(decode(doc)?))
            .collect()
    }
}

/// Draw a random invite code
fn generate_invite_code() -> String {
    let mut rng = thread_rng();
    (0..INVITE_CODE_LENGTH)
        // This unwrap is fine as the alphabet is never empty
        .map(|_| *CODE_ALPHABET.choose(&mut rng).unwrap() as char)
        .collect()
}

/// The member entry for a user; `joinedAt` is set by the store
fn member_record(user: &User, role: MemberRole) -> MemberRecord {
    MemberRecord {
        name: user.name.clone(),
        email: user.email.clone(),
        photo_url: user.photo_url.clone(),
        joined_at: None,
        role,
        status: MemberStatus::Active,
    }
}

/// The field set of a server-authored announcement
fn system_message_fields(content: &str) -> Result<Fields, StoreError> {
    let message = ChatMessage {
        sender_id: SYSTEM_SENDER.to_string(),
        sender_name: "System".to_string(),
        content: content.to_string(),
        kind: MessageKind::System,
        created_at: None,
    };

    Ok(Fields::serialize(&message)?.field("createdAt", FieldValue::ServerTimestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocPath, MemoryStore};

    fn user(uid: &str, name: &str) -> User {
        User {
            user_id: uid.to_string(),
            name: name.to_string(),
            email: format!("{uid}@example.com"),
            username: uid.to_string(),
            photo_url: None,
        }
    }

    /// Seed a group document directly, the way an older revision would have
    /// written it
    async fn seed_group(store: &MemoryStore, group_id: &str, code: &str, members: &[&str]) {
        let mut group = Group {
            group_id: group_id.to_string(),
            name: "Saturday Meetup".to_string(),
            invite_code: code.to_string(),
            members: Default::default(),
            member_count: members.len() as i64,
            updated_at: None,
            last_activity: None,
        };
        for uid in members {
            group.members.insert(
                uid.to_string(),
                member_record(&user(uid, uid), MemberRole::Member),
            );
        }

        store
            .set(
                DocPath::doc("groups", group_id),
                Fields::serialize(&group).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invite_codes_have_the_right_shape() {
        for _ in 0..32 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn malformed_codes_are_rejected_before_any_lookup() {
        let service = MembershipService::new(Arc::new(MemoryStore::new()));
        let alice = user("u1", "Alice");

        for code in ["", "AB12C", "AB12CDE"] {
            let err = service.join_group_by_code(&alice, code).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidCodeFormat));
        }

        let err = service
            .join_group_by_code(&alice, "AB12CD")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCode));
    }

    #[tokio::test]
    async fn join_admits_increments_and_announces() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());
        seed_group(&store, "g1", "AB12CD", &["m1", "m2", "m3"]).await;

        // Codes are normalized before the lookup
        let outcome = service
            .join_group_by_code(&user("u1", "Dora"), " ab12cd ")
            .await
            .unwrap();
        assert!(!outcome.already_member);
        assert_eq!(outcome.group_name, "Saturday Meetup");

        let group = service.get_group("g1", "u1").await.unwrap();
        assert_eq!(group.member_count, 4);
        assert_eq!(group.members["u1"].status, MemberStatus::Active);
        assert_eq!(group.members["u1"].role, MemberRole::Member);
        assert!(group.members["u1"].joined_at.is_some());

        let messages = service.list_messages("g1", "u1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Dora joined the group");
        assert_eq!(messages[0].kind, MessageKind::System);
        assert_eq!(messages[0].sender_id, SYSTEM_SENDER);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());
        seed_group(&store, "g1", "AB12CD", &["m1"]).await;

        let dora = user("u1", "Dora");
        service.join_group_by_code(&dora, "AB12CD").await.unwrap();
        let second = service.join_group_by_code(&dora, "AB12CD").await.unwrap();

        assert!(second.already_member);
        // Counter incremented exactly once, one announcement only
        let group = service.get_group("g1", "u1").await.unwrap();
        assert_eq!(group.member_count, 2);
        assert_eq!(service.list_messages("g1", "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admission_is_rechecked_at_write_time() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());
        seed_group(&store, "g1", "AB12CD", &["m1"]).await;

        // Two admissions built from the same pre-join read, the way two
        // racing requests would
        let dora = user("u1", "Dora");
        let first = service.admission_batch("g1", &dora).unwrap();
        let second = service.admission_batch("g1", &dora).unwrap();

        store.commit(first).await.unwrap();
        let err = store.commit(second).await.unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed(_)));

        // Counter incremented exactly once, one announcement only
        let group = service.get_group("g1", "u1").await.unwrap();
        assert_eq!(group.member_count, 2);
        assert_eq!(service.list_messages("g1", "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());
        seed_group(&store, "g1", "AB12CD", &["m1"]).await;

        // A dotted uid would address a foreign entry of the member map
        let err = service
            .join_group_by_code(&user("u.1", "Dot"), "AB12CD")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));
        let group = service.get_group("g1", "m1").await.unwrap();
        assert_eq!(group.member_count, 1);

        let err = service.get_group("g1/messages/m1", "m1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidId));
    }

    #[tokio::test]
    async fn created_groups_are_joinable_by_their_code() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());

        let alice = user("u1", "Alice");
        let created = service.create_group(&alice, "Brunch Crew").await.unwrap();

        let group = service.get_group(&created.group_id, "u1").await.unwrap();
        assert_eq!(group.member_count, 1);
        assert_eq!(group.members["u1"].role, MemberRole::Owner);
        assert!(group.members["u1"].joined_at.is_some());

        let outcome = service
            .join_group_by_code(&user("u2", "Bob"), &created.invite_code)
            .await
            .unwrap();
        assert_eq!(outcome.group_id, created.group_id);
        assert_eq!(
            service
                .get_group(&created.group_id, "u2")
                .await
                .unwrap()
                .member_count,
            2
        );
    }

    #[tokio::test]
    async fn non_members_may_not_read_groups_or_messages() {
        let store = Arc::new(MemoryStore::new());
        let service = MembershipService::new(store.clone());
        seed_group(&store, "g1", "AB12CD", &["m1"]).await;

        let err = service.get_group("g1", "stranger").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let err = service.list_messages("g1", "stranger").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let err = service.get_group("nope", "m1").await.unwrap_err();
        assert!(matches!(err, ServiceError::GroupNotFound));
    }

    #[tokio::test]
    async fn failed_join_batch_leaves_the_group_untouched() {
        let store = Arc::new(crate::store::testing::FlakyStore::new());
        let service = MembershipService::new(store.clone());

        let alice = user("u1", "Alice");
        let created = service.create_group(&alice, "Brunch Crew").await.unwrap();

        store.fail_next_commit();
        let err = service
            .join_group_by_code(&user("u2", "Bob"), &created.invite_code)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        // No partial admission: counter and member map are unchanged
        let group = service.get_group(&created.group_id, "u1").await.unwrap();
        assert_eq!(group.member_count, 1);
        assert!(!group.members.contains_key("u2"));
    }
}
