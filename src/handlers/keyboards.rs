//! Keyboard builders
//!
//! All inline/reply keyboards in one place. Callback data follows the
//! "prefix:argument" convention parsed by the callback dispatcher.

use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

use crate::models::user::{Role, Route, UserRecord};

pub fn role_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🧍 I'm a passenger", "role:passenger"),
        InlineKeyboardButton::callback("🚗 I'm a driver", "role:driver"),
    ]])
}

pub fn route_keyboard() -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = Route::all()
        .into_iter()
        .map(|route| {
            vec![InlineKeyboardButton::callback(
                route.label(),
                format!("route:{}", route.as_str()),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub fn route_confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Confirm", "route_confirm"),
        InlineKeyboardButton::callback("🔁 Change", "route_change"),
    ]])
}

/// Reply keyboard with the structured contact-share button; free text is
/// rejected at the phone step.
pub fn contact_keyboard() -> KeyboardMarkup {
    let button = KeyboardButton::new("📱 Share phone number").request(ButtonRequest::Contact);
    KeyboardMarkup::new(vec![vec![button]])
        .resize_keyboard()
        .one_time_keyboard()
}

pub fn passenger_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔎 Find drivers", "find_drivers")],
        vec![InlineKeyboardButton::callback("🛣 Change route", "passenger:route")],
    ])
}

pub fn driver_menu(available: bool) -> InlineKeyboardMarkup {
    let toggle = if available {
        InlineKeyboardButton::callback("🔴 Go busy", "driver:busy")
    } else {
        InlineKeyboardButton::callback("🟢 Go available", "driver:available")
    };
    InlineKeyboardMarkup::new(vec![
        vec![toggle],
        vec![InlineKeyboardButton::callback("🛣 Change route", "driver:edit")],
    ])
}

pub fn menu_for(role: Role, record: &UserRecord) -> InlineKeyboardMarkup {
    match role {
        Role::Driver => driver_menu(record.available),
        Role::Passenger => passenger_menu(),
    }
}

pub fn book_keyboard(driver: &UserRecord) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("🤝 Agreed with {}", driver.name),
            format!("book:{}", driver.user_id),
        )],
        vec![InlineKeyboardButton::callback("⬅️ Menu", "menu")],
    ])
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🚗 Drivers", "admin:list_drivers"),
            InlineKeyboardButton::callback("🧍 Passengers", "admin:list_passengers"),
        ],
        vec![
            InlineKeyboardButton::callback("🚫 Ban user", "admin:ban"),
            InlineKeyboardButton::callback("🔁 Toggle driver", "admin:toggle"),
        ],
    ])
}
