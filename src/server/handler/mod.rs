//! This module holds the handler of the server

use std::fmt::{Display, Formatter};

use actix_web::body::BoxBody;
use actix_web::HttpResponse;
use log::{debug, error, trace};
use serde::Serialize;
use serde_repr::Serialize_repr;
use utoipa::ToSchema;

use crate::service::ServiceError;
use crate::store::StoreError;
use crate::verify::VerifyError;

pub use crate::server::handler::friends::*;
pub use crate::server::handler::groups::*;
pub use crate::server::handler::users::*;
pub use crate::server::handler::version::*;

pub mod friends;
pub mod groups;
pub mod users;
pub mod version;

/// The result that is used throughout the complete api.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize_repr, ToSchema)]
#[repr(u16)]
pub(crate) enum ApiStatusCode {
    Unauthenticated = 1000,
    InvalidToken = 1001,
    NotFound = 1002,
    InvalidJson = 1003,
    EmptyJson = 1004,
    UserNotFound = 1005,
    DuplicateRequest = 1006,
    AlreadyFriends = 1007,
    RequestNotFound = 1008,
    MissingPrivileges = 1009,
    AlreadyResolved = 1010,
    FriendNotFound = 1011,
    InvalidCodeFormat = 1012,
    InvalidCode = 1013,
    GroupNotFound = 1014,
    InvalidName = 1015,
    InvalidId = 1016,

    InternalServerError = 2000,
    StoreError = 2001,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct ApiErrorResponse {
    #[schema(example = "Error message is here")]
    message: String,
    #[schema(example = 1000)]
    status_code: ApiStatusCode,
}

impl ApiErrorResponse {
    pub(crate) fn new(status_code: ApiStatusCode, message: String) -> Self {
        Self {
            message,
            status_code,
        }
    }
}

/// This enum holds all possible error types that can occur in the API
#[derive(Debug)]
pub enum ApiError {
    /// The request is missing a bearer credential
    Unauthenticated,
    /// The presented credential could not be verified
    InvalidToken,
    /// No fields were given to an update that requires at least one
    EmptyJson,
    /// A name or username field was empty
    InvalidName,
    /// A supplied id contains characters with path meaning
    InvalidId,
    /// The referenced user has no profile
    UserNotFound,
    /// A pending friend request already exists between the pair
    DuplicateRequest,
    /// The pair is already friends
    AlreadyFriends,
    /// The referenced friend request does not exist
    RequestNotFound,
    /// The user is not allowed to access the resource
    MissingPrivileges,
    /// The friend request has already been accepted or declined
    AlreadyResolved,
    /// No friendship exists between the pair
    FriendNotFound,
    /// The invite code has the wrong length
    InvalidCodeFormat,
    /// No group carries the invite code
    InvalidCode,
    /// The referenced group does not exist
    GroupNotFound,
    /// Unexpected server state
    InternalServerError,
    /// All errors thrown by the document store
    StoreError(StoreError),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "Unauthenticated"),
            ApiError::InvalidToken => write!(f, "Invalid token"),
            ApiError::EmptyJson => write!(f, "At least one field is required"),
            ApiError::InvalidName => write!(f, "Name must not be empty"),
            ApiError::InvalidId => write!(f, "Ids must not be empty or contain '/' or '.'"),
            ApiError::UserNotFound => write!(f, "User not found"),
            ApiError::DuplicateRequest => {
                write!(f, "A pending friend request already exists")
            }
            ApiError::AlreadyFriends => write!(f, "The users are already friends"),
            ApiError::RequestNotFound => write!(f, "Friend request not found"),
            ApiError::MissingPrivileges => write!(f, "Missing privileges"),
            ApiError::AlreadyResolved => {
                write!(f, "The friend request was already accepted or declined")
            }
            ApiError::FriendNotFound => write!(f, "The users are not friends"),
            ApiError::InvalidCodeFormat => write!(f, "Invite codes are 6 characters long"),
            ApiError::InvalidCode => write!(f, "Unknown invite code"),
            ApiError::GroupNotFound => write!(f, "Group not found"),
            ApiError::InternalServerError => write!(f, "Internal server error"),
            ApiError::StoreError(_) => write!(f, "Storage error occurred"),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        let client_error = |code: ApiStatusCode, err: &ApiError| {
            HttpResponse::BadRequest().json(ApiErrorResponse::new(code, err.to_string()))
        };

        match self {
            ApiError::Unauthenticated => {
                trace!("Unauthenticated");

                client_error(ApiStatusCode::Unauthenticated, self)
            }
            ApiError::InvalidToken => {
                debug!("Token verification failed");

                client_error(ApiStatusCode::InvalidToken, self)
            }
            ApiError::EmptyJson => client_error(ApiStatusCode::EmptyJson, self),
            ApiError::InvalidName => client_error(ApiStatusCode::InvalidName, self),
            ApiError::InvalidId => {
                debug!("Rejected a path-like id");

                client_error(ApiStatusCode::InvalidId, self)
            }
            ApiError::UserNotFound => client_error(ApiStatusCode::UserNotFound, self),
            ApiError::DuplicateRequest => {
                debug!("Duplicate friend request");

                client_error(ApiStatusCode::DuplicateRequest, self)
            }
            ApiError::AlreadyFriends => client_error(ApiStatusCode::AlreadyFriends, self),
            ApiError::RequestNotFound => client_error(ApiStatusCode::RequestNotFound, self),
            ApiError::MissingPrivileges => {
                debug!("Missing privileges");

                client_error(ApiStatusCode::MissingPrivileges, self)
            }
            ApiError::AlreadyResolved => client_error(ApiStatusCode::AlreadyResolved, self),
            ApiError::FriendNotFound => client_error(ApiStatusCode::FriendNotFound, self),
            ApiError::InvalidCodeFormat => client_error(ApiStatusCode::InvalidCodeFormat, self),
            ApiError::InvalidCode => client_error(ApiStatusCode::InvalidCode, self),
            ApiError::GroupNotFound => client_error(ApiStatusCode::GroupNotFound, self),
            ApiError::InternalServerError => {
                error!("Internal server error");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::InternalServerError,
                    self.to_string(),
                ))
            }
            ApiError::StoreError(err) => {
                error!("Store error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::StoreError,
                    self.to_string(),
                ))
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::InvalidId => Self::InvalidId,
            ServiceError::UserNotFound => Self::UserNotFound,
            ServiceError::DuplicateRequest => Self::DuplicateRequest,
            ServiceError::AlreadyFriends => Self::AlreadyFriends,
            ServiceError::RequestNotFound => Self::RequestNotFound,
            ServiceError::Forbidden => Self::MissingPrivileges,
            ServiceError::AlreadyResolved => Self::AlreadyResolved,
            ServiceError::FriendNotFound => Self::FriendNotFound,
            ServiceError::InvalidCodeFormat => Self::InvalidCodeFormat,
            ServiceError::InvalidCode => Self::InvalidCode,
            ServiceError::GroupNotFound => Self::GroupNotFound,
            ServiceError::Unavailable(err) => Self::StoreError(err),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(value: VerifyError) -> Self {
        match value {
            VerifyError::InvalidCredential => Self::InvalidToken,
            VerifyError::Unavailable(err) => {
                error!("Verifier unavailable: {err}");
                Self::InternalServerError
            }
        }
    }
}
