//! Application instance endpoints: search, detail, playbook override,
//! batch lifecycle actions, batch update, artifact listing.

use actix_web::{HttpRequest, Responder, get, post, put, web};
use serde::Deserialize;
use tracing::info;

use flotilla_api::operator::{
    BatchActionRequest, BatchTaskResponse, BatchUpdateRequest, UpdatePlaybookRequest,
};
use flotilla_common::FlotillaError;
use flotilla_persistence::model::InstanceSearchFilter;

use crate::api::actor;
use crate::model::{AppState, failure, ok, ok_empty};

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    server_id: Option<i64>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    include_deleted: bool,
}

#[get("")]
async fn search_applications(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let query = query.into_inner();
    let filter = InstanceSearchFilter {
        server_id: query.server_id,
        tag: query.tag,
        q: query.q,
        include_deleted: query.include_deleted,
    };
    match state.persistence.instance_search(&filter).await {
        Ok(instances) => ok(instances),
        Err(err) => failure(err),
    }
}

#[get("/{id}")]
async fn get_application(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    let event_limit = state.configuration.event_retention();
    match state.persistence.instance_detail(id, event_limit).await {
        Ok(Some(detail)) => ok(detail),
        Ok(None) => failure(FlotillaError::NotFound(format!("application {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[put("/{id}/update_playbook")]
async fn update_playbook(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    form: web::Json<UpdatePlaybookRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let playbook = form
        .into_inner()
        .playbook
        .filter(|playbook| !playbook.is_empty());
    match state
        .persistence
        .instance_update_playbook(id, playbook.as_deref())
        .await
    {
        Ok(true) => ok_empty(),
        Ok(false) => failure(FlotillaError::NotFound(format!("application {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[post("/batch_action")]
async fn batch_action(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Json<BatchActionRequest>,
) -> impl Responder {
    let form = form.into_inner();
    let actor = actor(&req);
    info!(
        action = form.action.as_str(),
        targets = form.app_ids.len(),
        actor = %actor,
        "batch action submitted"
    );
    match state
        .orchestrator
        .submit_action(form.action, &form.app_ids, form.idempotency_key, &actor)
        .await
    {
        Ok(outcome) => ok(BatchTaskResponse {
            task_ids: outcome.task_ids,
            groups_count: outcome.groups_count,
            results: outcome.results,
        }),
        Err(err) => failure(err),
    }
}

#[post("/batch_update")]
async fn batch_update(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Json<BatchUpdateRequest>,
) -> impl Responder {
    let form = form.into_inner();
    let actor = actor(&req);
    info!(
        mode = form.mode.as_str(),
        targets = form.app_ids.len(),
        actor = %actor,
        "batch update submitted"
    );
    match state.orchestrator.submit_update(&form, &actor).await {
        Ok(outcome) => ok(BatchTaskResponse {
            task_ids: outcome.task_ids,
            groups_count: outcome.groups_count,
            results: outcome.results,
        }),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactQuery {
    #[serde(default)]
    limit: Option<u64>,
}

#[get("/{id}/artifacts")]
async fn list_artifacts(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<ArtifactQuery>,
) -> impl Responder {
    let id = path.into_inner();
    let instance = match state.persistence.instance_find_by_id(id).await {
        Ok(Some(instance)) => instance,
        Ok(None) => {
            return failure(FlotillaError::NotFound(format!("application {}", id)).into());
        }
        Err(err) => return failure(err),
    };
    let catalog = match instance.catalog_id {
        Some(catalog_id) => match state.persistence.catalog_find_by_id(catalog_id).await {
            Ok(catalog) => catalog,
            Err(err) => return failure(err),
        },
        None => None,
    };
    let app_name = catalog
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or(instance.instance_name.as_str());
    let extension = catalog.as_ref().and_then(|c| c.artifact_extension.as_deref());
    match state
        .artifacts
        .list(app_name, extension, query.limit)
        .await
    {
        Ok(artifacts) => ok(artifacts),
        Err(err) => failure(err.into()),
    }
}
