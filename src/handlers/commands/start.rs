//! Start command handler
//!
//! Entry point: new users pick a role, returning users get their menu.
//! /start also discards any half-finished conversation.

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::{debug, info};

use crate::handlers::{keyboards, refuse_if_banned};
use crate::models::user::Role;
use crate::services::ServiceFactory;
use crate::texts;
use crate::utils::errors::{Result, RideMateError};

pub async fn handle_start(bot: Bot, msg: Message, services: ServiceFactory) -> Result<()> {
    let user = msg
        .from
        .as_ref()
        .ok_or_else(|| RideMateError::InvalidInput("No user in message".to_string()))?;
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    debug!(user_id = user_id, "Processing /start command");

    if !chat_id.is_user() {
        return Ok(());
    }
    if refuse_if_banned(&bot, &services, chat_id, user_id).await? {
        return Ok(());
    }

    // Restarting always abandons the in-flight conversation.
    {
        let _guard = services.storage.lock_user(user_id).await;
        services.storage.delete(user_id).await;
    }

    match services.users.find(user_id).await? {
        Some(record) => {
            let text = match record.role {
                Role::Driver => texts::driver_status(&record),
                Role::Passenger => texts::passenger_status(&record),
            };
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::menu_for(record.role, &record))
                .await?;
            info!(user_id = user_id, "Returning user started bot");
        }
        None => {
            bot.send_message(chat_id, texts::WELCOME).await?;
            bot.send_message(chat_id, texts::CHOOSE_ROLE)
                .reply_markup(keyboards::role_keyboard())
                .await?;
            info!(user_id = user_id, "New user started bot");
        }
    }

    Ok(())
}
