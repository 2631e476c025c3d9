use serde::{Deserialize, Serialize};

/// A user profile.
///
/// The identity itself is owned by the identity provider; this document is a
/// mirror created on first authenticated access and updated on profile
/// edits. It is never hard-deleted here.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The externally issued, stable id of the user
    pub user_id: String,

    /// The display name of the user
    pub name: String,

    /// The email address reported by the identity provider
    pub email: String,

    /// Defaults to the local part of the email
    pub username: String,

    /// URL of the profile picture, if any
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

/// The denormalized search projection of a [User].
///
/// This is a pure derived view: it has to be regenerated (replaced, not
/// merged) whenever a searchable field of the source user changes.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexEntry {
    /// Id of the source user
    pub user_id: String,

    /// The display name of the user
    pub name: String,

    /// The email address of the user
    pub email: String,

    /// The username of the user
    pub username: String,

    /// URL of the profile picture, if any
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,

    /// Lowercased tokens this entry can be found by
    pub search_terms: Vec<String>,
}
