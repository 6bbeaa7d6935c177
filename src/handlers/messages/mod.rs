//! Message handlers
//!
//! Shapes incoming private messages into flow actions and runs them through
//! the engine under the per-user lock. Messages from users with no
//! conversation in flight get their role menu or a pointer to /start.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::debug;

use crate::handlers::{deliver_prompt, keyboards, refuse_if_banned, settle};
use crate::models::user::Role;
use crate::services::ServiceFactory;
use crate::state::Action;
use crate::texts;
use crate::utils::errors::Result;

pub async fn handle_message(bot: Bot, msg: Message, services: Arc<ServiceFactory>) -> Result<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    // One-on-one flows only; group chatter is ignored.
    if !chat_id.is_user() {
        return Ok(());
    }
    if refuse_if_banned(&bot, &services, chat_id, user_id).await? {
        return Ok(());
    }

    let action = match shape_action(&msg) {
        Some(action) => action,
        None => return Ok(()),
    };

    let _guard = services.storage.lock_user(user_id).await;

    let mut ctx = match services.storage.load(user_id).await {
        Some(ctx) => ctx,
        None => {
            debug!(user_id = user_id, "Message outside any conversation");
            return idle_reply(&bot, chat_id, user_id, &services).await;
        }
    };

    ctx.touch();
    let applied = services.engine.apply(&mut ctx, action).await?;
    let prompt = applied.prompt.clone();
    settle(&services, ctx, applied.done).await;

    deliver_prompt(&bot, chat_id, &prompt).await
}

/// Map message content onto a flow action. Contact and photo payloads take
/// precedence over any caption text.
fn shape_action(msg: &Message) -> Option<Action> {
    if let Some(contact) = msg.contact() {
        return Some(Action::ContactShared {
            phone_number: contact.phone_number.clone(),
        });
    }
    if let Some(photos) = msg.photo() {
        // Telegram sends multiple resolutions; the last one is the largest.
        let photo = photos.last()?;
        return Some(Action::ImageUploaded {
            file_id: photo.file.id.to_string(),
        });
    }
    msg.text().map(|text| Action::Text(text.to_string()))
}

/// Reply for registered users chatting outside a flow; everyone else gets
/// pointed at /start.
async fn idle_reply(
    bot: &Bot,
    chat_id: teloxide::types::ChatId,
    user_id: i64,
    services: &ServiceFactory,
) -> Result<()> {
    match services.users.find(user_id).await? {
        Some(record) => {
            let text = match record.role {
                Role::Driver => texts::driver_status(&record),
                Role::Passenger => texts::passenger_status(&record),
            };
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::menu_for(record.role, &record))
                .await?;
        }
        None => {
            bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
        }
    }
    Ok(())
}
