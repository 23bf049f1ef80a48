pub mod admin_broadcast;
pub mod feed;
pub mod template;
pub mod user_notification;

pub use admin_broadcast::AdminBroadcastRepository;
pub use feed::FeedRepository;
pub use template::TemplateRepository;
pub use user_notification::UserNotificationRepository;
