//! This module holds the server definition

use std::net::SocketAddr;
use std::sync::Arc;

use actix_toolbox::tb_middleware::{setup_logging_mw, LoggingMiddlewareConfig};
use actix_web::http::StatusCode;
use actix_web::middleware::{Compress, ErrorHandlers};
use actix_web::web::{scope, Data, JsonConfig, PayloadConfig};
use actix_web::{App, HttpServer};
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::server::error::StartServerError;
use crate::server::handler::{
    accept_friend_request, create_friend_request, create_group, decline_friend_request,
    delete_friend, get_friend_requests, get_friends, get_group, get_group_messages, get_me,
    join_group, search_users, update_me, version,
};
use crate::server::middleware::{handle_not_found, json_extractor_error, TokenRequired};
use crate::server::swagger::ApiDoc;
use crate::service::{DirectoryService, MembershipService, RelationshipService};
use crate::store::DocumentStore;
use crate::verify::IdentityVerifier;

pub mod error;
pub mod handler;
pub mod middleware;
pub mod swagger;

/// Start the server
///
/// **Parameter**:
/// - `config`: Reference to a [Config] struct
/// - `store`: The document store all durable state lives in
/// - `verifier`: The identity verifier bearer credentials are checked against
pub async fn start_server(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    verifier: Arc<dyn IdentityVerifier>,
) -> Result<(), StartServerError> {
    let s_addr = SocketAddr::new(config.server.listen_address, config.server.listen_port);

    info!("Starting to listen on {}", s_addr);

    let directory = Arc::new(DirectoryService::new(store.clone()));
    let relations = Data::new(RelationshipService::new(store.clone(), directory.clone()));
    let membership = Data::new(MembershipService::new(store.clone()));
    let directory = Data::from(directory);
    let verifier = Data::from(verifier);

    HttpServer::new(move || {
        App::new()
            .app_data(PayloadConfig::default())
            .app_data(JsonConfig::default().error_handler(json_extractor_error))
            .app_data(directory.clone())
            .app_data(relations.clone())
            .app_data(membership.clone())
            .app_data(verifier.clone())
            .wrap(setup_logging_mw(LoggingMiddlewareConfig::default()))
            .wrap(Compress::default())
            .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, handle_not_found))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
            .service(version)
            .service(
                scope("/api/v1")
                    .wrap(TokenRequired)
                    .service(get_me)
                    .service(update_me)
                    .service(search_users)
                    .service(create_friend_request)
                    .service(get_friend_requests)
                    .service(accept_friend_request)
                    .service(decline_friend_request)
                    .service(get_friends)
                    .service(delete_friend)
                    .service(create_group)
                    .service(join_group)
                    .service(get_group)
                    .service(get_group_messages),
            )
    })
    .bind(s_addr)?
    .run()
    .await?;

    Ok(())
}
