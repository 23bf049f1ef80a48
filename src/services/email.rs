use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::services::channels::{Channel, NotificationPayload};

/// Email delivery channel. The outbound transport is an external
/// collaborator; this channel renders the message and hands it off via
/// logging only, which keeps the fan-out path honest without a mail server.
pub struct EmailChannel {
    from_address: String,
}

impl EmailChannel {
    pub fn new(from_address: String) -> Self {
        Self { from_address }
    }

    fn render_subject(payload: &NotificationPayload) -> String {
        format!("[{}] {}", payload.module, payload.title.primary)
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, payload: &NotificationPayload) -> AppResult<()> {
        // Mail needs a concrete recipient; broadcasts never reach this channel.
        let Some(user_id) = payload.user_id.as_deref() else {
            return Err(AppError::Channel(
                "email channel requires a target user".to_string(),
            ));
        };

        let subject = Self::render_subject(payload);
        tracing::info!(
            notification_id = %payload.id,
            user_id,
            from = %self.from_address,
            subject = %subject,
            "Email notification handed off"
        );
        Ok(())
    }
}
