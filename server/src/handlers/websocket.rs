use std::collections::HashMap;

use anyhow::{Context, Result};
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use shared::types::admin::{AdminAction, AdminDispatch, AdminError, DispatchResponse};
use shared::types::notification::Order;

use crate::AppState;
use crate::handlers::json_response::{JsonResponse, json_error, json_response};

// ---------------------------------------------------------------------------
// GET /websocket — diagnostics
// ---------------------------------------------------------------------------

/// Serve the hub's connection statistics.
///
/// `user` echoes the identity the surrounding auth layer injected via the
/// `x-authenticated-user` header (authentication itself is not this
/// service's job). An optional `?store_id=` narrows the snapshot to one
/// store.
pub async fn handle_stats(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse> {
    let params: HashMap<String, String> =
        form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
            .into_owned()
            .collect();

    let stats = state.manager.get_stats().await;
    let stats = match params.get("store_id") {
        Some(store_id) => stats.for_store(store_id),
        None => stats,
    };

    let user = req
        .headers()
        .get("x-authenticated-user")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    info!("Serving websocket stats ({} connections)", stats.total_connections);

    json_response(
        &json!({
            "message": "WebSocket notification hub running",
            "stats": stats,
            "user": user,
        }),
        StatusCode::OK,
    )
}

// ---------------------------------------------------------------------------
// POST /websocket — administrative dispatch
// ---------------------------------------------------------------------------

/// Map an administrative action onto the matching manager method.
/// Validation failures return 400 and make no manager call at all.
pub async fn handle_dispatch(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse> {
    let body = req
        .into_body()
        .collect()
        .await
        .context("Failed to read request body")?
        .to_bytes();

    match dispatch_action(&state, &body).await {
        Ok(delivered) => {
            info!("Admin dispatch delivered to {} subscribers", delivered);
            json_response(&DispatchResponse { success: true }, StatusCode::OK)
        }
        Err(e) => json_error(e.to_code(), &e.to_message(), StatusCode::BAD_REQUEST),
    }
}

#[derive(Deserialize)]
struct DeletePayload {
    id: String,
}

#[derive(Deserialize)]
struct CountPayload {
    count: u64,
}

/// Validate then dispatch. Separated from the hyper plumbing so tests can
/// drive it with raw bytes and assert no delivery happened on bad input.
pub async fn dispatch_action(state: &AppState, body: &[u8]) -> Result<usize, AdminError> {
    let dispatch: AdminDispatch =
        serde_json::from_slice(body).map_err(|e| AdminError::InvalidBody(e.to_string()))?;

    let action = AdminAction::parse(&dispatch.action)
        .ok_or_else(|| AdminError::UnknownAction(dispatch.action.clone()))?;

    // Required-field checks run before any manager method is touched.
    let store_id = dispatch
        .store_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(AdminError::MissingField("storeId"))?;
    let data = dispatch.data.ok_or(AdminError::MissingField("data"))?;

    let delivered = match action {
        AdminAction::NotifyNewOrder => {
            let order: Order =
                serde_json::from_value(data).map_err(|e| AdminError::InvalidData(e.to_string()))?;
            state.manager.notify_new_order(store_id, order).await
        }
        AdminAction::NotifyOrderUpdate => {
            let order: Order =
                serde_json::from_value(data).map_err(|e| AdminError::InvalidData(e.to_string()))?;
            state.manager.notify_order_update(store_id, order).await
        }
        AdminAction::NotifyOrderDelete => {
            let payload: DeletePayload =
                serde_json::from_value(data).map_err(|e| AdminError::InvalidData(e.to_string()))?;
            state.manager.notify_order_delete(store_id, &payload.id).await
        }
        AdminAction::NotifyPendingCount => {
            let payload: CountPayload =
                serde_json::from_value(data).map_err(|e| AdminError::InvalidData(e.to_string()))?;
            state
                .manager
                .notify_pending_orders_count(store_id, payload.count)
                .await
        }
    };

    Ok(delivered)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
