pub mod admin;
pub mod hub_config;
pub mod json_error;
pub mod notification;
pub mod stats;

pub use self::admin::{AdminAction, AdminDispatch, AdminError, DispatchResponse};
pub use self::json_error::ErrorResponse;
pub use self::notification::{ClientCommand, NotificationMessage, NotificationPayload, Order};
pub use self::stats::WsStats;
