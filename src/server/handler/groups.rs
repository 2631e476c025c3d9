//! All handlers for the group endpoints live in here

use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{MemberRole, MemberStatus, MessageKind};
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult};
use crate::service::{DirectoryService, MembershipService};
use crate::verify::IdentityClaims;

/// The content to create a new group
#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    #[schema(example = "Saturday Meetup")]
    name: String,
}

/// A freshly created group
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupResponse {
    group_id: String,
    #[schema(example = "Saturday Meetup")]
    name: String,
    /// The code to share with invitees
    #[schema(example = "AB12CD")]
    invite_code: String,
}

/// Create a new group.
///
/// The authenticated user becomes its owner and only member. The returned
/// invite code can be shared to let others join.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 201, description = "Group has been created", body = CreateGroupResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateGroupRequest,
    security(("api_token" = []))
)]
#[post("/groups")]
pub async fn create_group(
    req: Json<CreateGroupRequest>,
    claims: IdentityClaims,
    directory: Data<DirectoryService>,
    membership: Data<MembershipService>,
) -> ApiResult<HttpResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidName);
    }

    let user = directory.sync_profile(&claims).await?;
    let group = membership.create_group(&user, req.name.trim()).await?;

    Ok(HttpResponse::Created().json(CreateGroupResponse {
        group_id: group.group_id,
        name: group.name,
        invite_code: group.invite_code,
    }))
}

/// The code to join a group with
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    #[schema(example = "AB12CD")]
    invite_code: String,
}

/// The result of a join attempt
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupResponse {
    success: bool,
    /// True if the user was already a member and nothing was changed
    already_member: bool,
    group_id: String,
    #[schema(example = "Saturday Meetup")]
    group_name: String,
}

/// Join a group by invite code.
///
/// Joining a group the user is already a member of succeeds without any
/// change and reports `alreadyMember`.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Joined the group", body = JoinGroupResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = JoinGroupRequest,
    security(("api_token" = []))
)]
#[post("/groups/join")]
pub async fn join_group(
    req: Json<JoinGroupRequest>,
    claims: IdentityClaims,
    directory: Data<DirectoryService>,
    membership: Data<MembershipService>,
) -> ApiResult<Json<JoinGroupResponse>> {
    let user = directory.sync_profile(&claims).await?;
    let outcome = membership
        .join_group_by_code(&user, &req.invite_code)
        .await?;

    Ok(Json(JoinGroupResponse {
        success: true,
        already_member: outcome.already_member,
        group_id: outcome.group_id,
        group_name: outcome.group_name,
    }))
}

/// The id of a group
#[derive(Deserialize, IntoParams)]
pub struct PathGroupId {
    group_id: String,
}

/// A single group member
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberResponse {
    user_id: String,
    #[schema(example = "Herbert")]
    name: String,
    #[serde(rename = "photoURL")]
    photo_url: Option<String>,
    role: MemberRole,
    joined_at: Option<DateTime<Utc>>,
}

/// The group data
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    group_id: String,
    #[schema(example = "Saturday Meetup")]
    name: String,
    #[schema(example = "AB12CD")]
    invite_code: String,
    #[schema(example = 4)]
    member_count: i64,
    members: Vec<GroupMemberResponse>,
    last_activity: Option<DateTime<Utc>>,
}

/// Retrieve a group.
///
/// Only active members may access a group.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the group data", body = GroupResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathGroupId),
    security(("api_token" = []))
)]
#[get("/groups/{group_id}")]
pub async fn get_group(
    path: Path<PathGroupId>,
    claims: IdentityClaims,
    membership: Data<MembershipService>,
) -> ApiResult<Json<GroupResponse>> {
    let group = membership.get_group(&path.group_id, &claims.uid).await?;

    Ok(Json(GroupResponse {
        group_id: group.group_id,
        name: group.name,
        invite_code: group.invite_code,
        member_count: group.member_count,
        members: group
            .members
            .into_iter()
            .filter(|(_, record)| record.status == MemberStatus::Active)
            .map(|(user_id, record)| GroupMemberResponse {
                user_id,
                name: record.name,
                photo_url: record.photo_url,
                role: record.role,
                joined_at: record.joined_at,
            })
            .collect(),
        last_activity: group.last_activity,
    }))
}

/// A message of a group chat
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageResponse {
    sender_id: String,
    #[schema(example = "Herbert")]
    sender_name: String,
    #[schema(example = "Hello there!")]
    content: String,
    /// `"system"` for server announcements, `"user"` otherwise
    #[serde(rename = "type")]
    kind: MessageKind,
    created_at: Option<DateTime<Utc>>,
}

/// The messages of a group chat
///
/// `messages` are sorted by `createdAt`, oldest first.
#[derive(Serialize, ToSchema)]
pub struct GetGroupMessagesResponse {
    messages: Vec<GroupMessageResponse>,
}

/// Retrieve the chat messages of a group.
///
/// Only active members may read the chat. Messages are sorted by their
/// creation time, oldest first.
#[utoipa::path(
    tag = "Groups",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the messages of the group", body = GetGroupMessagesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathGroupId),
    security(("api_token" = []))
)]
#[get("/groups/{group_id}/messages")]
pub async fn get_group_messages(
    path: Path<PathGroupId>,
    claims: IdentityClaims,
    membership: Data<MembershipService>,
) -> ApiResult<Json<GetGroupMessagesResponse>> {
    let messages = membership
        .list_messages(&path.group_id, &claims.uid)
        .await?;

    Ok(Json(GetGroupMessagesResponse {
        messages: messages
            .into_iter()
            .map(|message| GroupMessageResponse {
                sender_id: message.sender_id,
                sender_name: message.sender_name,
                content: message.content,
                kind: message.kind,
                created_at: message.created_at,
            })
            .collect(),
    }))
}
