//! Task query and cancel endpoints

use std::str::FromStr;

use actix_web::{Responder, get, post, web};
use serde::Deserialize;

use flotilla_common::FlotillaError;
use flotilla_persistence::model::{TaskFilter, TaskStatus, TaskType};

use crate::model::{AppState, failure, ok, ok_empty};

#[derive(Debug, Deserialize)]
struct TaskQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "type")]
    task_type: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
}

#[get("")]
async fn list_tasks(state: web::Data<AppState>, query: web::Query<TaskQuery>) -> impl Responder {
    let query = query.into_inner();
    // Unknown kind strings are rejected here, not passed to the store
    let status = match query.status.as_deref() {
        Some(raw) => match TaskStatus::from_str(raw) {
            Ok(status) => Some(status),
            Err(err) => return failure(FlotillaError::PreconditionFailed(err).into()),
        },
        None => None,
    };
    let task_type = match query.task_type.as_deref() {
        Some(raw) => match TaskType::from_str(raw) {
            Ok(task_type) => Some(task_type),
            Err(err) => return failure(FlotillaError::PreconditionFailed(err).into()),
        },
        None => None,
    };
    let filter = TaskFilter {
        status,
        task_type,
        limit: query.limit,
    };
    match state.persistence.task_query(&filter).await {
        Ok(tasks) => ok(tasks),
        Err(err) => failure(err),
    }
}

#[get("/{id}")]
async fn get_task(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.persistence.task_find_by_id(id).await {
        Ok(Some(task)) => ok(task),
        Ok(None) => failure(FlotillaError::NotFound(format!("task {}", id)).into()),
        Err(err) => failure(err),
    }
}

#[post("/{id}/cancel")]
async fn cancel_task(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let id = path.into_inner();
    match state.orchestrator.cancel(id).await {
        Ok(true) => ok_empty(),
        Ok(false) => failure(
            FlotillaError::PreconditionFailed(format!("task {} already finished", id)).into(),
        ),
        Err(err) => failure(err),
    }
}
