use std::convert::Infallible;

use hyper::{Method, Request, StatusCode};
use serde_json::json;
use tracing::{debug, error};

use crate::AppState;
use crate::handlers::json_response::{JsonResponse, internal_error, json_error, json_response};
use crate::handlers::{upgrade, websocket};

/// Route an incoming request.
///
/// Deliberately small: the storefront's pages, catalog, and checkout REST
/// API live in a separate service. This process exposes only the
/// notification hub's surface.
pub async fn dispatch(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/ws") => upgrade::handle_ws_upgrade(req, state).await,
        (&Method::GET, "/websocket") => websocket::handle_stats(req, state).await,
        (&Method::POST, "/websocket") => websocket::handle_dispatch(req, state).await,
        (&Method::GET, "/health") => json_response(&json!({"status": "ok"}), StatusCode::OK),
        _ => json_error(
            "NOT_FOUND",
            &format!("No route for {} {}", method, path),
            StatusCode::NOT_FOUND,
        ),
    };

    // A handler error must never crash the connection task.
    Ok(result.unwrap_or_else(|err| {
        error!("Handler failed for {} {}: {:#}", method, path, err);
        internal_error()
    }))
}
