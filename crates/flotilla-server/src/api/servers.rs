//! Server (host) endpoints

use actix_web::{Responder, delete, get, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use flotilla_common::{DEFAULT_AGENT_PORT, FlotillaError, Source};
use flotilla_persistence::entity::server;

use crate::model::{AppState, failure, ok, ok_empty};

/// Agent fetch-status attached to a server view
#[derive(Debug, Serialize)]
struct FetchStatusView {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    attempted_at: i64,
    consecutive_failures: u32,
}

#[derive(Debug, Serialize)]
struct ServerView {
    #[serde(flatten)]
    server: server::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_fetch: Option<FetchStatusView>,
}

fn view(state: &AppState, server: server::Model) -> ServerView {
    let agent_fetch = state
        .fetch_status
        .get(Source::Agent, server.id)
        .map(|status| FetchStatusView {
            status: status.state.as_str(),
            error: status.error,
            attempted_at: status.attempted_at,
            consecutive_failures: status.consecutive_failures,
        });
    ServerView {
        server,
        agent_fetch,
    }
}

#[get("")]
async fn list_servers(state: web::Data<AppState>) -> impl Responder {
    match state.persistence.server_find_all().await {
        Ok(servers) => {
            let views: Vec<ServerView> = servers
                .into_iter()
                .map(|server| view(&state, server))
                .collect();
            ok(views)
        }
        Err(err) => failure(err),
    }
}

#[get("/{id}")]
async fn get_server(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.server_find_by_id(id).await {
        Ok(Some(server)) => ok(view(&state, server)),
        Ok(None) => failure(FlotillaError::NotFound(format!("server {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterServerForm {
    name: String,
    ip: String,
    #[serde(default)]
    agent_port: Option<i32>,
    #[serde(default)]
    is_haproxy_node: bool,
    #[serde(default)]
    is_eureka_node: bool,
    #[serde(default)]
    eureka_url: Option<String>,
}

#[post("")]
async fn register_server(
    state: web::Data<AppState>,
    form: web::Json<RegisterServerForm>,
) -> impl Responder {
    let form = form.into_inner();
    match state
        .persistence
        .server_create(
            &form.name,
            &form.ip,
            form.agent_port.unwrap_or(DEFAULT_AGENT_PORT),
            form.is_haproxy_node,
            form.is_eureka_node,
            form.eureka_url.as_deref(),
        )
        .await
    {
        Ok(server) => {
            info!(server = %server.name, "server registered");
            ok(server)
        }
        Err(err) => failure(err),
    }
}

#[post("/{id}/refresh")]
async fn refresh_server(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.server_find_by_id(id).await {
        Ok(Some(_)) => {
            if state.agent_refresh.try_send(id).is_err() {
                return failure(
                    FlotillaError::RemoteUnavailable("refresh queue is full".into()).into(),
                );
            }
            ok_empty()
        }
        Ok(None) => failure(FlotillaError::NotFound(format!("server {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[delete("/{id}")]
async fn delete_server(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.server_delete(id).await {
        Ok(true) => {
            state.fetch_status.forget(Source::Agent, id);
            state.fetch_status.forget(Source::Haproxy, id);
            ok_empty()
        }
        Ok(false) => failure(FlotillaError::NotFound(format!("server {}", id)).into()),
        Err(err) => failure(err),
    }
}
