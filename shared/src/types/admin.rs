use serde::{Deserialize, Serialize};

/// Body of `POST /websocket` — the administrative dispatch surface the
/// storefront's REST handlers call after persisting an order change.
///
/// `action` stays a raw string here so an unrecognized value can be rejected
/// with a descriptive 400 instead of a generic parse failure.
#[derive(Debug, Deserialize)]
pub struct AdminDispatch {
    pub action: String,
    #[serde(rename = "storeId")]
    pub store_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The closed set of administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    NotifyNewOrder,
    NotifyOrderUpdate,
    NotifyOrderDelete,
    NotifyPendingCount,
}

impl AdminAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "notify_new_order" => Some(Self::NotifyNewOrder),
            "notify_order_update" => Some(Self::NotifyOrderUpdate),
            "notify_order_delete" => Some(Self::NotifyOrderDelete),
            "notify_pending_count" => Some(Self::NotifyPendingCount),
            _ => None,
        }
    }
}

/// Dispatch response
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
}

/// Admin surface error codes
#[derive(Debug, PartialEq)]
pub enum AdminError {
    UnknownAction(String),
    MissingField(&'static str),
    InvalidData(String),
    InvalidBody(String),
}

impl AdminError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::InvalidBody(_) => "INVALID_BODY",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::UnknownAction(action) => format!("Unrecognized action: {}", action),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::InvalidData(detail) => format!("Invalid data payload: {}", detail),
            Self::InvalidBody(detail) => format!("Invalid request body: {}", detail),
        }
    }
}
