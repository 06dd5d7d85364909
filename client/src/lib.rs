pub mod connector;
pub mod events;

pub use self::connector::{ConnectionState, ConnectorConfig, StoreConnector};
pub use self::events::NotificationHandler;
