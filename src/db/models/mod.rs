//! Database models split into separate files.

pub mod admin_broadcast;
pub mod feed;
pub mod template;
pub mod user_notification;

pub use self::admin_broadcast::*;
pub use self::feed::*;
pub use self::template::*;
pub use self::user_notification::*;
