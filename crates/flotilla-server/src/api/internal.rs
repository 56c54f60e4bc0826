//! Playbook runner callback endpoints
//!
//! The runner posts progress events and one final completion per task.
//! Events for tasks that are no longer running are acknowledged and
//! dropped.

use actix_web::{Responder, post, web};
use tracing::debug;

use flotilla_api::progress::{RunnerCompletion, RunnerEvent};
use flotilla_orchestrator::RunnerMessage;

use crate::model::{AppState, ok_empty};

#[post("/tasks/{id}/progress")]
async fn post_progress(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<RunnerEvent>,
) -> impl Responder {
    let task_id = path.into_inner();
    let delivered = state
        .progress
        .route(task_id, RunnerMessage::Progress(body.into_inner()));
    if !delivered {
        debug!(task_id, "progress event for inactive task dropped");
    }
    ok_empty()
}

#[post("/tasks/{id}/complete")]
async fn post_complete(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<RunnerCompletion>,
) -> impl Responder {
    let task_id = path.into_inner();
    let delivered = state
        .progress
        .route(task_id, RunnerMessage::Complete(body.into_inner()));
    if !delivered {
        debug!(task_id, "completion for inactive task dropped");
    }
    ok_empty()
}
