//! The core services: relationship state machine, membership admission and
//! the user directory.
//!
//! Every service is a thin struct over the [DocumentStore] seam. All
//! multi-document state changes are expressed as single atomic batches;
//! nothing here holds mutable in-process state between calls.
//!
//! [DocumentStore]: crate::store::DocumentStore

use std::fmt::{Display, Formatter};

use crate::store::{CollectionPath, DocPath, StoreError};

pub use directory::DirectoryService;
pub use membership::{JoinOutcome, MembershipService, NewGroup};
pub use relations::{RelationshipService, UserSearchResult};

pub mod directory;
pub mod membership;
pub mod relations;

/// The result type used throughout the services
pub type ServiceResult<T> = Result<T, ServiceError>;

/// All failures a core operation can report.
///
/// Store failures are wrapped in [ServiceError::Unavailable] at the
/// operation boundary; a raw store error never reaches a caller.
#[derive(Debug)]
pub enum ServiceError {
    /// An externally supplied id contains path or field-path characters
    InvalidId,
    /// The referenced user has no profile document
    UserNotFound,
    /// A pending request already exists between the pair
    DuplicateRequest,
    /// A (fully written) friendship already exists between the pair
    AlreadyFriends,
    /// The referenced friend request does not exist
    RequestNotFound,
    /// The caller is not authorized for the target resource
    Forbidden,
    /// The request has already been accepted or declined
    AlreadyResolved,
    /// No friendship record exists between the pair
    FriendNotFound,
    /// The invite code is not 6 characters long
    InvalidCodeFormat,
    /// No group carries the given invite code
    InvalidCode,
    /// The referenced group does not exist
    GroupNotFound,
    /// A store call failed; the cause is retained for logging
    Unavailable(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidId => {
                write!(f, "Ids must not be empty or contain '/' or '.'")
            }
            ServiceError::UserNotFound => write!(f, "User not found"),
            ServiceError::DuplicateRequest => write!(f, "A pending friend request already exists"),
            ServiceError::AlreadyFriends => write!(f, "The users are already friends"),
            ServiceError::RequestNotFound => write!(f, "Friend request not found"),
            ServiceError::Forbidden => write!(f, "Missing privileges for this resource"),
            ServiceError::AlreadyResolved => {
                write!(f, "The friend request was already accepted or declined")
            }
            ServiceError::FriendNotFound => write!(f, "The users are not friends"),
            ServiceError::InvalidCodeFormat => write!(f, "Invite codes are 6 characters long"),
            ServiceError::InvalidCode => write!(f, "Unknown invite code"),
            ServiceError::GroupNotFound => write!(f, "Group not found"),
            ServiceError::Unavailable(_) => write!(f, "Storage unavailable"),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Unavailable(value)
    }
}

/// Check an externally supplied id before it is spliced into a [DocPath]
/// or a dotted field path.
///
/// `/` would address a different document (`users/x/friends/y` for a "user"
/// id of `x/friends/y`), `.` would address a different field in dotted
/// updates like `members.{uid}`.
pub(crate) fn validate_id(id: &str) -> Result<(), ServiceError> {
    if id.is_empty() || id.contains(['/', '.']) {
        return Err(ServiceError::InvalidId);
    }
    Ok(())
}

/// `users/{uid}`
pub(crate) fn user_doc(user_id: &str) -> DocPath {
    DocPath::doc("users", user_id)
}

/// `user_search/{uid}`
pub(crate) fn search_doc(user_id: &str) -> DocPath {
    DocPath::doc("user_search", user_id)
}

/// `user_search`
pub(crate) fn search_collection() -> CollectionPath {
    CollectionPath::root("user_search")
}

/// `friend_requests/{id}`
pub(crate) fn request_doc(request_id: &str) -> DocPath {
    DocPath::doc("friend_requests", request_id)
}

/// `friend_requests`
pub(crate) fn requests_collection() -> CollectionPath {
    CollectionPath::root("friend_requests")
}

/// `users/{owner}/friends/{other}`
pub(crate) fn friend_doc(owner_id: &str, other_id: &str) -> DocPath {
    DocPath::doc("users", owner_id).sub("friends", other_id)
}

/// `users/{owner}/friends`
pub(crate) fn friends_collection(owner_id: &str) -> CollectionPath {
    CollectionPath::of(&user_doc(owner_id), "friends")
}

/// `groups/{gid}`
pub(crate) fn group_doc(group_id: &str) -> DocPath {
    DocPath::doc("groups", group_id)
}

/// `groups`
pub(crate) fn groups_collection() -> CollectionPath {
    CollectionPath::root("groups")
}

/// `groups/{gid}/messages`
pub(crate) fn messages_collection(group_id: &str) -> CollectionPath {
    CollectionPath::of(&group_doc(group_id), "messages")
}
