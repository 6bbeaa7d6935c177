//! Help command handler

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::texts;
use crate::utils::errors::Result;

pub async fn handle_help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, texts::HELP_TEXT).await?;
    Ok(())
}
