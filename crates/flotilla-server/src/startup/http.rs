//! HTTP server setup

use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::api::route;
use crate::model::AppState;

/// Creates and binds the operator API server. A bind failure is fatal at
/// startup.
pub fn api_server(
    app_state: Arc<AppState>,
    address: String,
    port: u16,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .service(route::server_routes())
            .service(route::application_routes())
            .service(route::tag_routes())
            .service(route::haproxy_routes())
            .service(route::task_routes())
            .service(route::internal_routes())
    })
    .bind((address, port))?
    .run())
}
