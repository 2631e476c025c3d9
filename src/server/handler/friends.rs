//! All handlers for the friend request and friend list endpoints live in here

use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{FriendRequest, Friendship};
use crate::server::handler::{ApiErrorResponse, ApiResult};
use crate::service::RelationshipService;
use crate::verify::IdentityClaims;

/// The request of a new friendship
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFriendRequest {
    /// The user the request is addressed to
    to_user_id: String,
}

/// The id of the created friend request
#[derive(Serialize, ToSchema)]
pub struct CreateFriendRequestResponse {
    id: String,
}

/// Create a new friend request.
///
/// Fails if a pending request already exists between the two users or they
/// are already friends.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "Friend request has been created", body = CreateFriendRequestResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateFriendRequest,
    security(("api_token" = []))
)]
#[post("/friends/requests")]
pub async fn create_friend_request(
    req: Json<CreateFriendRequest>,
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<HttpResponse> {
    let id = relations
        .send_friend_request(&claims.uid, &req.to_user_id)
        .await?;

    Ok(HttpResponse::Created().json(CreateFriendRequestResponse { id }))
}

/// A single friend request
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    id: String,
    from_user_id: String,
    #[schema(example = "Herbert")]
    from_user_name: String,
    #[schema(example = "herbert@example.com")]
    from_user_email: String,
    #[serde(rename = "fromUserPhotoURL")]
    from_user_photo_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

/// The pending friend requests addressed to the user
#[derive(Serialize, ToSchema)]
pub struct GetFriendRequestsResponse {
    requests: Vec<FriendRequestResponse>,
}

/// Retrieve all pending friend requests addressed to the authenticated
/// user, newest first
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the pending friend requests", body = GetFriendRequestsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("api_token" = []))
)]
#[get("/friends/requests")]
pub async fn get_friend_requests(
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<Json<GetFriendRequestsResponse>> {
    let requests = relations.list_friend_requests(&claims.uid).await?;

    Ok(Json(GetFriendRequestsResponse {
        requests: requests
            .into_iter()
            .map(|request: FriendRequest| FriendRequestResponse {
                id: request.id,
                from_user_id: request.from_user_id,
                from_user_name: request.from_user_name,
                from_user_email: request.from_user_email,
                from_user_photo_url: request.from_user_photo_url,
                created_at: request.created_at,
            })
            .collect(),
    }))
}

/// The id of a friend request
#[derive(Deserialize, IntoParams)]
pub struct PathRequestId {
    id: String,
}

/// Accept a pending friend request.
///
/// Only the addressed user may accept. On success both users appear in each
/// other's friend lists.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Friend request has been accepted"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathRequestId),
    security(("api_token" = []))
)]
#[post("/friends/requests/{id}/accept")]
pub async fn accept_friend_request(
    path: Path<PathRequestId>,
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<HttpResponse> {
    relations
        .accept_friend_request(&path.id, &claims.uid)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Decline a pending friend request.
///
/// Only the addressed user may decline. Declined requests are terminal.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Friend request has been declined"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathRequestId),
    security(("api_token" = []))
)]
#[post("/friends/requests/{id}/decline")]
pub async fn decline_friend_request(
    path: Path<PathRequestId>,
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<HttpResponse> {
    relations
        .decline_friend_request(&path.id, &claims.uid)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// A single friend
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendResponse {
    user_id: String,
    #[schema(example = "Herbert")]
    name: String,
    #[schema(example = "herbert@example.com")]
    email: String,
    #[schema(example = "herbert")]
    username: String,
    #[serde(rename = "photoURL")]
    photo_url: Option<String>,
    friends_since: Option<DateTime<Utc>>,
}

/// The friends of the user
#[derive(Serialize, ToSchema)]
pub struct GetFriendsResponse {
    friends: Vec<FriendResponse>,
}

/// Retrieve the friends of the authenticated user
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns all friends", body = GetFriendsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("api_token" = []))
)]
#[get("/friends")]
pub async fn get_friends(
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<Json<GetFriendsResponse>> {
    let friends = relations.list_friends(&claims.uid).await?;

    Ok(Json(GetFriendsResponse {
        friends: friends
            .into_iter()
            .map(|friend: Friendship| FriendResponse {
                user_id: friend.user_id,
                name: friend.name,
                email: friend.email,
                username: friend.username,
                photo_url: friend.photo_url,
                friends_since: friend.friends_since,
            })
            .collect(),
    }))
}

/// The id of a friend
#[derive(Deserialize, IntoParams)]
pub struct PathFriendId {
    user_id: String,
}

/// Remove a friend.
///
/// Deletes the friendship from both users' friend lists in one step.
#[utoipa::path(
    tag = "Friends",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Friend has been removed"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathFriendId),
    security(("api_token" = []))
)]
#[delete("/friends/{user_id}")]
pub async fn delete_friend(
    path: Path<PathFriendId>,
    claims: IdentityClaims,
    relations: Data<RelationshipService>,
) -> ApiResult<HttpResponse> {
    relations.remove_friend(&claims.uid, &path.user_id).await?;

    Ok(HttpResponse::Ok().finish())
}
