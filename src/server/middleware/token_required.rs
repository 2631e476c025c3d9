use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::server::handler::ApiError;
use crate::service::validate_id;
use crate::verify::{IdentityClaims, IdentityVerifier};

/// Rejects any request without a verifiable bearer credential.
///
/// On success the verified [IdentityClaims] are attached to the request so
/// handlers can take them as an extractor parameter. There is no session:
/// every request is verified on its own.
pub(crate) struct TokenRequired;

impl<S, B> Transform<S, ServiceRequest> for TokenRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = TokenRequiredMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenRequiredMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub(crate) struct TokenRequiredMiddleware<S> {
    // The verify call is async, so the service handle has to move into the
    // future
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TokenRequiredMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = bearer_token(req.request()).ok_or(ApiError::Unauthenticated)?;

            let verifier = req
                .app_data::<Data<dyn IdentityVerifier>>()
                .ok_or(ApiError::InternalServerError)?
                .clone();

            let claims = verifier.verify(&token).await.map_err(ApiError::from)?;
            // A uid with path characters could address foreign documents
            validate_id(&claims.uid).map_err(|_| ApiError::InvalidToken)?;
            req.extensions_mut().insert(claims);

            service.call(req).await
        })
    }
}

/// Extract the token of an `Authorization: Bearer <token>` header
fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

impl FromRequest for IdentityClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<IdentityClaims>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthenticated.into()),
        )
    }
}
