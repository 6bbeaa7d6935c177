//! RideMate Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Update;
use teloxide::utils::command::BotCommands as TeloxideBotCommands;
use tracing::{error, info, warn};

use RideMate::{
    config::Settings,
    database::connection::{create_pool, run_migrations, DatabaseConfig},
    handlers::{
        callbacks::handle_callback_query,
        commands::{admin, cancel, help, start},
        messages::handle_message,
    },
    services::{ServiceFactory, TelegramNotifier},
    utils::logging,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging
    logging::init_logging(&settings.logging)?;

    info!("Starting RideMate Telegram Bot...");

    // Initialize database connection
    info!("Connecting to database...");
    let db_config = DatabaseConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        ..DatabaseConfig::default()
    };
    let db_pool = create_pool(&db_config).await?;

    info!("Running database migrations...");
    run_migrations(&db_pool).await?;

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);

    // Initialize services
    info!("Initializing services...");
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), settings.bot.admin_id));
    let services = Arc::new(ServiceFactory::new(db_pool, settings, notifier));

    info!("RideMate bot is ready!");

    let handler = create_handler();
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![services])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("RideMate bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<BotCommands>()
                        .endpoint(handle_commands),
                )
                .branch(dptree::endpoint(handle_messages)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callbacks))
}

#[derive(TeloxideBotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "RideMate Bot Commands")]
enum BotCommands {
    #[command(description = "Start the bot and pick your role")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Abort the current registration")]
    Cancel,
    #[command(description = "Operator panel (operator only)")]
    Admin,
}

/// Handle bot commands
async fn handle_commands(
    bot: Bot,
    msg: Message,
    cmd: BotCommands,
    services: Arc<ServiceFactory>,
) -> HandlerResult {
    let services = (*services).clone();

    let result = match cmd {
        BotCommands::Start => start::handle_start(bot, msg, services).await,
        BotCommands::Help => help::handle_help(bot, msg).await,
        BotCommands::Cancel => cancel::handle_cancel(bot, msg, services).await,
        BotCommands::Admin => admin::handle_admin_panel(bot, msg, services).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Error handling command");
        return Err(e.into());
    }
    Ok(())
}

/// Handle regular messages
async fn handle_messages(bot: Bot, msg: Message, services: Arc<ServiceFactory>) -> HandlerResult {
    if let Err(e) = handle_message(bot, msg, services).await {
        error!(error = %e, "Error handling message");
        return Err(e.into());
    }
    Ok(())
}

/// Handle callback queries
async fn handle_callbacks(
    bot: Bot,
    query: CallbackQuery,
    services: Arc<ServiceFactory>,
) -> HandlerResult {
    if let Err(e) = handle_callback_query(bot, query, services).await {
        error!(error = %e, "Error handling callback query");
        return Err(e.into());
    }
    Ok(())
}
