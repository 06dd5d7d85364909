pub mod manager;
pub mod registry;

pub use self::manager::{NotificationManager, OutboundSender};
pub use self::registry::ConnectionRegistry;
