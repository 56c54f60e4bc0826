//! Tag endpoints

use actix_web::{HttpRequest, Responder, get, post, web};
use serde::Serialize;

use flotilla_api::operator::{BulkTagRequest, TagAction, TargetOutcome};
use flotilla_common::FlotillaError;

use crate::api::actor;
use crate::model::{AppState, failure, ok};

#[get("")]
async fn list_tags(state: web::Data<AppState>) -> impl Responder {
    match state.persistence.tag_find_all().await {
        Ok(tags) => ok(tags),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Serialize)]
struct BulkAssignResponse {
    results: Vec<TargetOutcome>,
}

/// Bulk add/remove tags. The envelope always succeeds; each target reports
/// its own outcome.
#[post("/bulk-assign")]
async fn bulk_assign(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Json<BulkTagRequest>,
) -> impl Responder {
    let form = form.into_inner();
    let actor = actor(&req);
    let mut results = Vec::with_capacity(form.app_ids.len());
    for app_id in &form.app_ids {
        let mut outcome = TargetOutcome::accepted(*app_id);
        for tag_name in &form.tag_names {
            let attempt = match form.action {
                TagAction::Add => state.persistence.tag_assign(*app_id, tag_name, &actor).await,
                TagAction::Remove => {
                    state
                        .persistence
                        .tag_unassign(*app_id, tag_name, &actor)
                        .await
                }
            };
            if let Err(err) = attempt {
                let typed = FlotillaError::from_anyhow(err);
                outcome = TargetOutcome::rejected(
                    *app_id,
                    format!("{}({})", typed.kind().as_str(), tag_name),
                );
                break;
            }
        }
        results.push(outcome);
    }
    ok(BulkAssignResponse { results })
}
