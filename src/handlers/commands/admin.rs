//! Admin command handler
//!
//! Opens the operator panel; restricted to the configured operator account.

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::warn;

use crate::handlers::keyboards;
use crate::services::ServiceFactory;
use crate::texts;
use crate::utils::errors::{Result, RideMateError};

pub async fn handle_admin_panel(bot: Bot, msg: Message, services: ServiceFactory) -> Result<()> {
    let user = msg
        .from
        .as_ref()
        .ok_or_else(|| RideMateError::InvalidInput("No user in message".to_string()))?;
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    if !services.is_admin(user_id) {
        warn!(user_id = user_id, "Non-operator tried /admin");
        bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
        return Ok(());
    }

    bot.send_message(chat_id, texts::ADMIN_MENU)
        .reply_markup(keyboards::admin_menu())
        .await?;
    Ok(())
}
