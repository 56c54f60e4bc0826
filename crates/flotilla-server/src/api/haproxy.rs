//! HAProxy topology and mapping endpoints

use actix_web::{HttpRequest, Responder, delete, get, post, web};
use tracing::info;

use flotilla_api::operator::MapRequest;
use flotilla_common::FlotillaError;
use flotilla_persistence::model::MappingEntityType;

use crate::api::actor;
use crate::model::{AppState, failure, ok, ok_empty};

#[get("/instances")]
async fn list_instances(state: web::Data<AppState>) -> impl Responder {
    match state.persistence.haproxy_list_instances().await {
        Ok(instances) => ok(instances),
        Err(err) => failure(err),
    }
}

#[get("/instances/{id}/backends")]
async fn list_backends(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.haproxy_backends_with_counts(id).await {
        Ok(backends) => ok(backends),
        Err(err) => failure(err),
    }
}

#[get("/backends/{id}/servers")]
async fn list_backend_servers(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.haproxy_servers_for_backend(id).await {
        Ok(servers) => ok(servers),
        Err(err) => failure(err),
    }
}

/// Re-poll the HAProxy view of the process's host immediately
#[post("/instances/{id}/sync")]
async fn sync_instance(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.haproxy_instance_find_by_id(id).await {
        Ok(Some(process)) => {
            if state.haproxy_sync.try_send(process.server_id).is_err() {
                return failure(
                    FlotillaError::RemoteUnavailable("sync queue is full".into()).into(),
                );
            }
            ok_empty()
        }
        Ok(None) => failure(FlotillaError::NotFound(format!("haproxy instance {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[post("/servers/{id}/map")]
async fn map_server(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    form: web::Json<MapRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let form = form.into_inner();
    let actor = actor(&req);
    match state.persistence.haproxy_server_find_by_id(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return failure(FlotillaError::NotFound(format!("haproxy server {}", id)).into());
        }
        Err(err) => return failure(err),
    }
    match state
        .mapping
        .map_manual(
            MappingEntityType::HaproxyServer,
            id,
            form.application_id,
            &actor,
            form.notes.as_deref(),
        )
        .await
    {
        Ok(()) => {
            info!(
                haproxy_server_id = id,
                application_id = form.application_id,
                actor = %actor,
                "manual mapping created"
            );
            ok_empty()
        }
        Err(err) => failure(err),
    }
}

#[delete("/servers/{id}/map")]
async fn unmap_server(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let id = path.into_inner();
    let actor = actor(&req);
    match state
        .mapping
        .unmap_manual(MappingEntityType::HaproxyServer, id, &actor)
        .await
    {
        Ok(true) => ok_empty(),
        Ok(false) => {
            failure(FlotillaError::NotFound(format!("haproxy server {} has no mapping", id)).into())
        }
        Err(err) => failure(err),
    }
}
