//! Callback query handlers
//!
//! Dispatches inline keyboard presses. Callback data uses the
//! "prefix:argument" convention; unknown prefixes are logged and dropped.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId};
use tracing::{debug, info, warn};

use crate::handlers::{begin, deliver_prompt, keyboards, refuse_if_banned, settle};
use crate::models::user::{Role, Route};
use crate::services::ServiceFactory;
use crate::state::{Action, AdminStep, FlowState, ConversationContext, Step};
use crate::texts;
use crate::utils::errors::{Result, RideMateError};

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    services: Arc<ServiceFactory>,
) -> Result<()> {
    let user_id = query.from.id.0 as i64;
    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(user_id));

    let data = match query.data {
        Some(data) => data,
        None => return Ok(()),
    };
    debug!(user_id = user_id, callback_data = %data, "Processing callback query");

    // Clear the client-side loading state before doing anything slow.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    if refuse_if_banned(&bot, &services, chat_id, user_id).await? {
        return Ok(());
    }

    let (prefix, arg) = match data.split_once(':') {
        Some((prefix, arg)) => (prefix, Some(arg)),
        None => (data.as_str(), None),
    };

    match (prefix, arg) {
        ("role", Some(role)) => handle_role(&bot, chat_id, user_id, role, &services).await,
        ("route", Some(route)) => handle_route(&bot, chat_id, user_id, route, &services).await,
        ("route_confirm", None) => {
            apply_in_context(&bot, chat_id, user_id, Action::ConfirmRoute, &services).await
        }
        ("route_change", None) => {
            apply_in_context(&bot, chat_id, user_id, Action::ChangeRoute, &services).await
        }
        ("find_drivers", None) => handle_find_drivers(&bot, chat_id, user_id, &services).await,
        ("menu", None) => show_menu(&bot, chat_id, user_id, &services).await,
        ("book", Some(driver)) => handle_book(&bot, chat_id, user_id, driver, &services).await,
        ("driver", Some(cmd)) => handle_driver_menu(&bot, chat_id, user_id, cmd, &services).await,
        ("passenger", Some("route")) => {
            start_route_edit(&bot, chat_id, user_id, Role::Passenger, &services).await
        }
        ("approve", Some(target)) => {
            handle_approve(&bot, chat_id, user_id, target, &services).await
        }
        ("reject", Some(target)) => handle_reject(&bot, chat_id, user_id, target, &services).await,
        ("admin", Some(cmd)) => handle_admin_menu(&bot, chat_id, user_id, cmd, &services).await,
        _ => {
            warn!(user_id = user_id, callback_data = %data, "Unknown callback data");
            Ok(())
        }
    }
}

/// Role picked on the welcome screen: start the registration flow.
async fn handle_role(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    role: &str,
    services: &ServiceFactory,
) -> Result<()> {
    let role: Role = role
        .parse()
        .map_err(|e: String| RideMateError::InvalidInput(e))?;

    let _guard = services.storage.lock_user(user_id).await;
    let (ctx, prompt) = services.engine.start_registration(user_id, role);
    begin(services, ctx).await;

    deliver_prompt(bot, chat_id, &prompt).await
}

/// Route button: feeds the in-flight flow, or starts a route edit for an
/// already registered user.
async fn handle_route(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    route: &str,
    services: &ServiceFactory,
) -> Result<()> {
    let route: Route = route
        .parse()
        .map_err(|e: String| RideMateError::InvalidInput(e))?;

    let _guard = services.storage.lock_user(user_id).await;

    let mut ctx = match services.storage.load(user_id).await {
        Some(ctx) => ctx,
        None => match services.users.find(user_id).await? {
            // Registered user re-picking a route outside any flow.
            Some(record) => ConversationContext::new(
                user_id,
                FlowState::Registration {
                    role: record.role,
                    step: Step::AwaitingRoute,
                },
            ),
            None => {
                bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
                return Ok(());
            }
        },
    };

    ctx.touch();
    let applied = services
        .engine
        .apply(&mut ctx, Action::RouteChosen(route))
        .await?;
    let prompt = applied.prompt.clone();
    settle(services, ctx, applied.done).await;

    deliver_prompt(bot, chat_id, &prompt).await
}

/// Run an action against the user's existing conversation, if any.
async fn apply_in_context(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    action: Action,
    services: &ServiceFactory,
) -> Result<()> {
    let _guard = services.storage.lock_user(user_id).await;

    let mut ctx = match services.storage.load(user_id).await {
        Some(ctx) => ctx,
        None => {
            bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
            return Ok(());
        }
    };

    ctx.touch();
    let applied = services.engine.apply(&mut ctx, action).await?;
    let prompt = applied.prompt.clone();
    settle(services, ctx, applied.done).await;

    deliver_prompt(bot, chat_id, &prompt).await
}

/// Back-to-menu button: show the role menu for a registered user.
async fn show_menu(
    bot: &Bot,
    chat_id: ChatId,
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

/// Passenger asked for the driver listing on their stored route.
async fn handle_find_drivers(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    services: &ServiceFactory,
) -> Result<()> {
    let drivers = match services.matching.find_drivers(user_id).await {
        Ok(drivers) => drivers,
        Err(RideMateError::NoRouteSet { .. }) => {
            return deliver_prompt(bot, chat_id, &crate::state::Prompt::AskRoute(Role::Passenger))
                .await;
        }
        Err(RideMateError::UserNotFound { .. }) => {
            bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if drivers.is_empty() {
        bot.send_message(chat_id, texts::NO_DRIVERS).await?;
        return Ok(());
    }

    for driver in &drivers {
        bot.send_message(chat_id, texts::driver_card(driver))
            .reply_markup(keyboards::book_keyboard(driver))
            .await?;
    }
    Ok(())
}

/// Book button under a driver card.
async fn handle_book(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    driver: &str,
    services: &ServiceFactory,
) -> Result<()> {
    let driver_id: i64 = match driver.parse() {
        Ok(id) => id,
        Err(_) => return Ok(()),
    };

    match services.matching.book(user_id, driver_id).await {
        Ok(driver_name) => {
            bot.send_message(chat_id, texts::booking_done(&driver_name))
                .await?;
        }
        Err(RideMateError::UserNotFound { user_id: missing }) if missing == driver_id => {
            bot.send_message(chat_id, texts::DRIVER_GONE).await?;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Driver self-service menu: availability toggle and route edit.
async fn handle_driver_menu(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    cmd: &str,
    services: &ServiceFactory,
) -> Result<()> {
    let record = match services.users.find(user_id).await? {
        Some(record) if record.role == Role::Driver => record,
        _ => {
            bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
            return Ok(());
        }
    };

    match cmd {
        "available" | "busy" => {
            let available = cmd == "available";
            services.users.set_availability(user_id, available).await?;
            let mut record = record;
            record.available = available;
            bot.send_message(chat_id, texts::driver_status(&record))
                .reply_markup(keyboards::driver_menu(available))
                .await?;
            Ok(())
        }
        "edit" => start_route_edit(bot, chat_id, user_id, Role::Driver, services).await,
        other => {
            warn!(user_id = user_id, cmd = other, "Unknown driver menu command");
            Ok(())
        }
    }
}

/// Open a short flow that re-runs the route (and, for drivers, price) steps.
async fn start_route_edit(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    role: Role,
    services: &ServiceFactory,
) -> Result<()> {
    if services.users.find(user_id).await?.is_none() {
        bot.send_message(chat_id, texts::NOT_REGISTERED).await?;
        return Ok(());
    }

    let _guard = services.storage.lock_user(user_id).await;
    let ctx = ConversationContext::new(
        user_id,
        FlowState::Registration {
            role,
            step: Step::AwaitingRoute,
        },
    );
    begin(services, ctx).await;

    deliver_prompt(bot, chat_id, &crate::state::Prompt::AskRoute(role)).await
}

/// Operator approval button under an application card.
async fn handle_approve(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    target: &str,
    services: &ServiceFactory,
) -> Result<()> {
    if !services.is_admin(user_id) {
        bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
        return Ok(());
    }
    let target: i64 = match target.parse() {
        Ok(id) => id,
        Err(_) => return Ok(()),
    };

    let _guard = services.storage.lock_user(target).await;
    let ctx = services.storage.load(target).await;

    match services.engine.approve(target, ctx).await? {
        Some((mut ctx, prompt)) => {
            ctx.touch();
            settle(services, ctx, false).await;

            if let Err(e) = deliver_prompt(bot, ChatId(target), &prompt).await {
                warn!(user_id = target, error = %e, "Failed to deliver approval to driver");
            }
            bot.send_message(chat_id, texts::APPROVED_ACK).await?;
            info!(user_id = target, admin_id = user_id, "Application approved by operator");
        }
        None => {
            bot.send_message(chat_id, texts::NOTHING_TO_APPROVE).await?;
        }
    }
    Ok(())
}

/// Operator rejection button: removes the record and clears the context.
async fn handle_reject(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    target: &str,
    services: &ServiceFactory,
) -> Result<()> {
    if !services.is_admin(user_id) {
        bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
        return Ok(());
    }
    let target: i64 = match target.parse() {
        Ok(id) => id,
        Err(_) => return Ok(()),
    };

    let _guard = services.storage.lock_user(target).await;
    let prompt = services.engine.reject(target).await?;
    services.storage.delete(target).await;

    if let Err(e) = deliver_prompt(bot, ChatId(target), &prompt).await {
        warn!(user_id = target, error = %e, "Failed to deliver rejection to applicant");
    }
    bot.send_message(chat_id, texts::REJECTED_ACK).await?;
    info!(user_id = target, admin_id = user_id, "Application rejected by operator");
    Ok(())
}

/// Operator panel buttons.
async fn handle_admin_menu(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    cmd: &str,
    services: &ServiceFactory,
) -> Result<()> {
    if !services.is_admin(user_id) {
        bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
        return Ok(());
    }

    match cmd {
        "list_drivers" => list_users(bot, chat_id, Role::Driver, services).await,
        "list_passengers" => list_users(bot, chat_id, Role::Passenger, services).await,
        "ban" => start_admin_input(bot, chat_id, user_id, AdminStep::AwaitingBanUserId, services)
            .await,
        "toggle" => {
            start_admin_input(
                bot,
                chat_id,
                user_id,
                AdminStep::AwaitingToggleDriverId,
                services,
            )
            .await
        }
        other => {
            warn!(user_id = user_id, cmd = other, "Unknown admin menu command");
            Ok(())
        }
    }
}

async fn list_users(
    bot: &Bot,
    chat_id: ChatId,
    role: Role,
    services: &ServiceFactory,
) -> Result<()> {
    let users = services.users.list_by_role(role).await?;
    let text = if users.is_empty() {
        texts::NO_USERS.to_string()
    } else {
        users
            .iter()
            .map(texts::admin_user_line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

async fn start_admin_input(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    step: AdminStep,
    services: &ServiceFactory,
) -> Result<()> {
    let _guard = services.storage.lock_user(user_id).await;
    let ctx = services.engine.start_admin(user_id, step);
    begin(services, ctx).await;

    let text = match step {
        AdminStep::AwaitingBanUserId => texts::ASK_BAN_USER_ID,
        AdminStep::AwaitingToggleDriverId => texts::ASK_TOGGLE_DRIVER_ID,
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}
