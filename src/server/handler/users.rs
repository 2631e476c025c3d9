//! All handlers for the user profile and search endpoints live in here

use actix_web::web::{Data, Json, Query};
use actix_web::{get, put};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::User;
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult};
use crate::service::directory::ProfileUpdate;
use crate::service::{DirectoryService, RelationshipService, UserSearchResult};
use crate::verify::IdentityClaims;

/// The profile data of a user
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// The stable id issued by the identity provider
    pub(crate) user_id: String,
    #[schema(example = "Herbert")]
    pub(crate) name: String,
    #[schema(example = "herbert@example.com")]
    pub(crate) email: String,
    #[schema(example = "herbert")]
    pub(crate) username: String,
    #[serde(rename = "photoURL")]
    pub(crate) photo_url: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            username: user.username,
            photo_url: user.photo_url,
        }
    }
}

/// Returns the profile of the authenticated user.
///
/// On first authenticated access the verified identity claims are mirrored
/// into a fresh profile.
#[utoipa::path(
    tag = "Users",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the profile of the current user", body = UserResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("api_token" = []))
)]
#[get("/users/me")]
pub async fn get_me(
    claims: IdentityClaims,
    directory: Data<DirectoryService>,
) -> ApiResult<Json<UserResponse>> {
    let user = directory.sync_profile(&claims).await?;

    Ok(Json(user.into()))
}

/// Update profile request data
///
/// All parameter are optional, but at least one of them is required.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[schema(example = "Heeeerbeeeert")]
    name: Option<String>,
    #[schema(example = "herbert2")]
    username: Option<String>,
    #[serde(rename = "photoURL")]
    photo_url: Option<String>,
}

/// Updates the profile of the authenticated user.
///
/// The search projection is refreshed in the same write.
#[utoipa::path(
    tag = "Users",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the updated profile", body = UserResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = UpdateProfileRequest,
    security(("api_token" = []))
)]
#[put("/users/me")]
pub async fn update_me(
    req: Json<UpdateProfileRequest>,
    claims: IdentityClaims,
    directory: Data<DirectoryService>,
) -> ApiResult<Json<UserResponse>> {
    let req = req.into_inner();

    if req.name.is_none() && req.username.is_none() && req.photo_url.is_none() {
        return Err(ApiError::EmptyJson);
    }
    if matches!(&req.name, Some(name) if name.is_empty())
        || matches!(&req.username, Some(username) if username.is_empty())
    {
        return Err(ApiError::InvalidName);
    }

    let user = directory
        .update_profile(
            &claims.uid,
            ProfileUpdate {
                name: req.name,
                username: req.username,
                photo_url: req.photo_url,
            },
        )
        .await?;

    Ok(Json(user.into()))
}

/// The search terms
#[derive(Deserialize, IntoParams)]
pub struct SearchUsersQuery {
    /// Matched case-insensitively against name, email and username
    #[param(example = "herb")]
    query: String,
}

/// The matched users
#[derive(Serialize, ToSchema)]
pub struct SearchUsersResponse {
    users: Vec<UserSearchResult>,
}

/// Search for users to befriend.
///
/// Queries shorter than 2 characters return an empty result. The
/// authenticated user is never part of the result; every match carries
/// `isFriend` and `requestPending` flags relative to the authenticated user.
#[utoipa::path(
    tag = "Users",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns all matched users", body = SearchUsersResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(SearchUsersQuery),
    security(("api_token" = []))
)]
#[get("/users/search")]
pub async fn search_users(
    query: Query<SearchUsersQuery>,
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<Json<SearchUsersResponse>> {
    let users = relations.search_users(&query.query, &claims.uid).await?;

    Ok(Json(SearchUsersResponse { users }))
}
