//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{BreakerAccepted, BreakerRequest, ErrorResponse, NotificationQuery};
use crate::network::{EquipmentId, NetworkDirectory};
use crate::sim::LoggedNotification;

/// Returns a snapshot of the network directory.
///
/// `GET /network` → 200 + `NetworkDirectory` JSON
pub async fn get_network(State(state): State<Arc<AppState>>) -> Json<NetworkDirectory> {
    Json(state.network.snapshot())
}

/// Returns delivered notifications, optionally filtered by sequence range.
///
/// `GET /notifications` → 200 + `Vec<LoggedNotification>` JSON
/// `GET /notifications?from=N&to=M` → filtered range (inclusive)
/// `GET /notifications?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<LoggedNotification>>, (StatusCode, Json<ErrorResponse>)> {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(u64::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    Ok(Json(state.log.range(from, to)))
}

/// Queues a breaker command for the active (or next) run.
///
/// `POST /breakers/{id}` + `{"closed": bool}` → 202 + `BreakerAccepted`
/// Unknown equipment → 404 + `ErrorResponse`
pub async fn post_breaker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EquipmentId>,
    Json(body): Json<BreakerRequest>,
) -> impl IntoResponse {
    if state.network.read().equipment(id).is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("equipment {id} not found"),
            }),
        ));
    }

    state.commands.set_breaker(id, body.closed);
    Ok((
        StatusCode::ACCEPTED,
        Json(BreakerAccepted {
            equipment_id: id,
            closed: body.closed,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::network::{Equipment, EquipmentState, Line, SharedNetwork};
    use crate::sim::{Event, NotificationLog, Notifier, RunState, Scheduler};

    fn make_test_state() -> (Arc<AppState>, Scheduler) {
        let log = NotificationLog::new();
        let network = SharedNetwork::new(NetworkDirectory::new(
            vec![Line::new(1, 1, 2, 2.0)],
            vec![Equipment::recloser(1, 2, EquipmentState::Closed)],
        ));
        let scheduler = Scheduler::new(network.clone(), Notifier::new(log.clone()));
        let events = vec![
            Event::line_failure(0.0, 1),
            Event::recloser_open(0.0, 1),
            Event::recloser_restore(0.0, 1),
        ];
        let report = scheduler.run_scenario(events, false).unwrap();
        assert_eq!(report.state, RunState::Completed);

        let state = Arc::new(AppState {
            network,
            log,
            commands: scheduler.commands(),
        });
        (state, scheduler)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn network_reflects_applied_events() {
        let (state, _scheduler) = make_test_state();
        let app = router(state);

        let req = Request::builder()
            .uri("/network")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["lines"][0]["out_of_service"], true);
        assert_eq!(json["equipment"][0]["state"], "closed");
    }

    #[tokio::test]
    async fn notifications_returns_all_entries() {
        let (state, _scheduler) = make_test_state();
        let app = router(state);

        let req = Request::builder()
            .uri("/notifications")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["notification"]["event"], "line_failure");
    }

    #[tokio::test]
    async fn notifications_range_query() {
        let (state, _scheduler) = make_test_state();
        let app = router(state);

        let req = Request::builder()
            .uri("/notifications?from=1&to=2")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["seq"], 1);
        assert_eq!(rows[1]["notification"]["fields"]["reason"], "restoration");
    }

    #[tokio::test]
    async fn notifications_invalid_range_returns_400() {
        let (state, _scheduler) = make_test_state();
        let app = router(state);

        let req = Request::builder()
            .uri("/notifications?from=10&to=5")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("must be <="));
    }

    #[tokio::test]
    async fn breaker_command_is_queued_not_applied() {
        let (state, scheduler) = make_test_state();
        let app = router(Arc::clone(&state));

        let req = Request::builder()
            .method("POST")
            .uri("/breakers/1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"closed": false}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        // nothing changes until a run drains the command
        let before = state.network.read().equipment(1).and_then(|e| e.state);
        assert_eq!(before, Some(EquipmentState::Closed));

        let report = scheduler.run_scenario(Vec::new(), false).unwrap();
        assert_eq!(report.commands, 1);
        let after = state.network.read().equipment(1).and_then(|e| e.state);
        assert_eq!(after, Some(EquipmentState::Open));
    }

    #[tokio::test]
    async fn breaker_unknown_equipment_returns_404() {
        let (state, _scheduler) = make_test_state();
        let app = router(state);

        let req = Request::builder()
            .method("POST")
            .uri("/breakers/77")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"closed": true}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
