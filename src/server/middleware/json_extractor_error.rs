use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};

use crate::server::handler::{ApiErrorResponse, ApiStatusCode};

/// Map json extractor failures into the api's error format
pub(crate) fn json_extractor_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ApiErrorResponse::new(
        ApiStatusCode::InvalidJson,
        format!("Invalid json: {err}"),
    ));

    InternalError::from_response(err, response).into()
}
