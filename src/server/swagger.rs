//! This module holds the definition of the swagger declaration

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::server::handler;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

/// Helper struct for the openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::version,
        handler::get_me,
        handler::update_me,
        handler::search_users,
        handler::create_friend_request,
        handler::get_friend_requests,
        handler::accept_friend_request,
        handler::decline_friend_request,
        handler::get_friends,
        handler::delete_friend,
        handler::create_group,
        handler::join_group,
        handler::get_group,
        handler::get_group_messages,
    ),
    components(schemas(
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::VersionResponse,
        handler::UserResponse,
        handler::UpdateProfileRequest,
        handler::SearchUsersResponse,
        crate::service::UserSearchResult,
        crate::models::MemberRole,
        crate::models::MessageKind,
        handler::CreateFriendRequest,
        handler::CreateFriendRequestResponse,
        handler::GetFriendRequestsResponse,
        handler::FriendRequestResponse,
        handler::GetFriendsResponse,
        handler::FriendResponse,
        handler::CreateGroupRequest,
        handler::CreateGroupResponse,
        handler::JoinGroupRequest,
        handler::JoinGroupResponse,
        handler::GroupResponse,
        handler::GroupMemberResponse,
        handler::GetGroupMessagesResponse,
        handler::GroupMessageResponse,
    )),
    modifiers(&TokenSecurity)
)]
pub struct ApiDoc;
