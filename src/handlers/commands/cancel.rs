//! Cancel command handler
//!
//! Aborts the in-flight conversation from any step. Incomplete registration
//! records are removed along with the context.

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::handlers::deliver_prompt;
use crate::services::ServiceFactory;
use crate::state::Action;
use crate::texts;
use crate::utils::errors::{Result, RideMateError};

pub async fn handle_cancel(bot: Bot, msg: Message, services: ServiceFactory) -> Result<()> {
    let user = msg
        .from
        .as_ref()
        .ok_or_else(|| RideMateError::InvalidInput("No user in message".to_string()))?;
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    let _guard = services.storage.lock_user(user_id).await;

    let mut ctx = match services.storage.load(user_id).await {
        Some(ctx) => ctx,
        None => {
            bot.send_message(chat_id, texts::NOTHING_TO_CANCEL).await?;
            return Ok(());
        }
    };

    let applied = services.engine.apply(&mut ctx, Action::Cancel).await?;
    services.storage.delete(user_id).await;

    deliver_prompt(&bot, chat_id, &applied.prompt).await
}
