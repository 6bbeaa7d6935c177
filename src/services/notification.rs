//! Outbound notification service
//!
//! The `Notifier` trait is the seam between the core flows and the Telegram
//! transport: the state machine and matching engine talk to it, the bot
//! implementation renders the actual chat messages. Tests substitute a
//! recording implementation.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::debug;

use crate::texts;
use crate::utils::errors::Result;

/// A driver application forwarded to the operator for manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub car_info: String,
    /// Opaque reference to the uploaded passport/licence image
    pub passport: String,
    /// Opaque reference to the uploaded payment receipt image
    pub payment: String,
}

/// Downstream notifications emitted by the core flows
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Forward a completed driver application to the operator.
    async fn approval_requested(&self, request: &ApprovalRequest) -> Result<()>;

    /// Tell a driver that a passenger has arranged a ride with them.
    async fn booking_confirmed(
        &self,
        driver_id: i64,
        passenger_name: &str,
        passenger_phone: &str,
    ) -> Result<()>;

    /// Tell a user their stalled registration was cancelled.
    async fn flow_timed_out(&self, user_id: i64) -> Result<()>;
}

/// Production notifier backed by the Telegram bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin_id: i64,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_id: i64) -> Self {
        Self { bot, admin_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn approval_requested(&self, request: &ApprovalRequest) -> Result<()> {
        debug!(user_id = request.user_id, "Forwarding driver application to operator");

        let keyboard = InlineKeyboardMarkup::new(vec![
            vec![InlineKeyboardButton::callback(
                "✅ Approve",
                format!("approve:{}", request.user_id),
            )],
            vec![InlineKeyboardButton::callback(
                "❌ Reject",
                format!("reject:{}", request.user_id),
            )],
        ]);

        self.bot
            .send_message(ChatId(self.admin_id), texts::approval_request(request))
            .reply_markup(keyboard)
            .await?;

        Ok(())
    }

    async fn booking_confirmed(
        &self,
        driver_id: i64,
        passenger_name: &str,
        passenger_phone: &str,
    ) -> Result<()> {
        debug!(driver_id = driver_id, "Notifying driver of a booking");

        self.bot
            .send_message(
                ChatId(driver_id),
                texts::booking_notice(passenger_name, passenger_phone),
            )
            .await?;

        Ok(())
    }

    async fn flow_timed_out(&self, user_id: i64) -> Result<()> {
        debug!(user_id = user_id, "Notifying user of registration timeout");

        self.bot
            .send_message(ChatId(user_id), texts::TIMEOUT)
            .await?;

        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("admin_id", &self.admin_id)
            .finish_non_exhaustive()
    }
}
