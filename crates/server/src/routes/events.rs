// crates/server/src/routes/events.rs
//! Server-Sent Events transport for a project's job events.
//!
//! Opening the stream joins the project's scope; dropping it leaves.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use game_builder_jobs::{ResourceId, Subscriber, SubscriberId, SubscriptionRouter};

use crate::error::ApiResult;
use crate::state::AppState;

/// Leaves the scope when the SSE stream is dropped.
struct ScopeGuard {
    router: Arc<SubscriptionRouter>,
    resource_id: ResourceId,
    subscriber: SubscriberId,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.router.leave(&self.resource_id, self.subscriber);
        tracing::debug!(subscriber_id = %self.subscriber, resource_id = %self.resource_id, "SSE subscriber left");
    }
}

/// GET /api/projects/{id}/events - SSE stream of the project's job events.
///
/// Emits a `joined` event first, then one event per job transition, named
/// after the job kind's channel (`ai_progress`, `generation_progress`,
/// `build_progress`).
pub async fn project_events(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let resource_id = ResourceId::new(project_id)?;
    let (subscriber, mut rx) = Subscriber::channel();
    let router = Arc::clone(state.jobs.router());
    router.join(&resource_id, subscriber.clone());

    let guard = ScopeGuard {
        router,
        resource_id: resource_id.clone(),
        subscriber: subscriber.id(),
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        let joined = serde_json::json!({ "resourceId": resource_id });
        yield Ok(Event::default().event("joined").data(joined.to_string()));

        while let Some(job_event) = rx.recv().await {
            match Event::default().event(job_event.channel.as_str()).json_data(&job_event) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!(error = %e, "failed to encode job event"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/projects/{id}/events", get(project_events))
}
