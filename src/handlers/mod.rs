//! Handlers module
//!
//! Transport layer: turns Telegram updates into flow actions, delivers the
//! engine's prompts back as chat messages and keeps the conversation storage
//! and inactivity supervisor in step.

pub mod callbacks;
pub mod commands;
pub mod keyboards;
pub mod messages;

pub use callbacks::handle_callback_query;
pub use messages::handle_message;

use teloxide::prelude::*;
use teloxide::types::{ChatId, ReplyMarkup};
use tracing::debug;

use crate::services::ServiceFactory;
use crate::state::{ConversationContext, Prompt};
use crate::texts;
use crate::utils::errors::Result;

/// Send a rendered prompt with the keyboard it calls for.
pub(crate) async fn deliver_prompt(bot: &Bot, chat_id: ChatId, prompt: &Prompt) -> Result<()> {
    let text = texts::render_prompt(prompt);
    let send = bot.send_message(chat_id, text);

    match prompt {
        Prompt::AskPhone => {
            send.reply_markup(keyboards::contact_keyboard()).await?;
        }
        // Contact step left a reply keyboard behind; clear it here.
        Prompt::AskPassportPhoto => {
            send.reply_markup(ReplyMarkup::kb_remove()).await?;
        }
        Prompt::AskRoute(_) => {
            send.reply_markup(keyboards::route_keyboard()).await?;
        }
        Prompt::ConfirmRoute(_) => {
            send.reply_markup(keyboards::route_confirm_keyboard()).await?;
        }
        Prompt::DriverReady { .. } => {
            send.reply_markup(keyboards::driver_menu(true)).await?;
        }
        Prompt::PassengerReady { .. } => {
            send.reply_markup(keyboards::passenger_menu()).await?;
        }
        _ => {
            send.await?;
        }
    }

    Ok(())
}

/// Persist the context after an applied action: completed flows drop it,
/// ongoing ones are saved and re-armed with an idle check.
pub(crate) async fn settle(services: &ServiceFactory, ctx: ConversationContext, done: bool) {
    let user_id = ctx.user_id;
    if done {
        services.storage.delete(user_id).await;
    } else {
        let seq = ctx.activity_seq;
        services.storage.save(ctx).await;
        services.supervisor.watch(user_id, seq);
    }
}

/// Store a fresh context and arm its first idle check.
pub(crate) async fn begin(services: &ServiceFactory, ctx: ConversationContext) {
    let user_id = ctx.user_id;
    let seq = ctx.activity_seq;
    services.storage.save(ctx).await;
    services.supervisor.watch(user_id, seq);
}

/// Banned users get a refusal instead of any handling. Returns true when the
/// update was swallowed.
pub(crate) async fn refuse_if_banned(
    bot: &Bot,
    services: &ServiceFactory,
    chat_id: ChatId,
    user_id: i64,
) -> Result<bool> {
    match services.users.find(user_id).await? {
        Some(record) if record.banned => {
            debug!(user_id = user_id, "Refusing update from banned user");
            bot.send_message(chat_id, texts::BANNED).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
