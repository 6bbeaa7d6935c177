//! User-facing message texts
//!
//! All chat copy lives here so the flow engine can stay semantic: it emits
//! `Prompt` values and the transport renders them through this module.

use crate::models::user::{Role, UserRecord};
use crate::services::notification::ApprovalRequest;
use crate::state::machine::{Prompt, Rejection};

pub const WELCOME: &str = "Welcome to RideMate! 🚕\n\nI connect passengers with intercity drivers.\nChoose who you are to get started.";

pub const HELP_TEXT: &str = "Available commands:\n\
/start — main menu\n\
/help — this message\n\
/cancel — abort the current registration\n\n\
Passengers: register once, pick a route and I will show you available drivers.\n\
Drivers: register, get approved and set your route and price to appear in searches.";

pub const TIMEOUT: &str =
    "Your registration was cancelled due to inactivity. Send /start to begin again.";

pub const CANCELLED: &str = "Cancelled. Send /start whenever you are ready.";

pub const BANNED: &str = "Your access to this service has been suspended.";

pub const NOT_REGISTERED: &str = "You are not registered yet. Send /start to begin.";

pub const CHOOSE_ROLE: &str = "Who are you?";

pub const ADMIN_MENU: &str = "Operator panel:";

pub const ADMIN_ONLY: &str = "This command is available to the operator only.";

pub const APPLICATION_REJECTED: &str =
    "Unfortunately your application was declined. You can send /start to apply again.";

pub const ASK_BAN_USER_ID: &str = "Send the numeric id of the user to ban.";

pub const ASK_TOGGLE_DRIVER_ID: &str =
    "Send the numeric id of the driver whose availability should be flipped.";

pub const NO_DRIVERS: &str =
    "No drivers are available on your route right now. Try again a bit later.";

pub const DRIVER_GONE: &str = "That driver is no longer available.";

pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

pub const APPROVED_ACK: &str = "Application approved, the driver has been notified.";

pub const REJECTED_ACK: &str = "Application rejected, the record was removed.";

pub const NOTHING_TO_APPROVE: &str = "That user is not awaiting approval.";

pub const NO_USERS: &str = "Nobody here yet.";

/// Passenger status summary for the passenger menu.
pub fn passenger_status(record: &UserRecord) -> String {
    format!(
        "Your route: {}",
        record
            .route
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| "not set".to_string())
    )
}

/// Render a flow engine prompt as chat copy.
pub fn render_prompt(prompt: &Prompt) -> String {
    match prompt {
        Prompt::AskName(Role::Driver) => "Let's register you as a driver. What is your name?".to_string(),
        Prompt::AskName(Role::Passenger) => "Great! What is your name?".to_string(),
        Prompt::AskPhone => {
            "Share your phone number using the button below.".to_string()
        }
        Prompt::AskPassportPhoto => {
            "Send a photo of your passport or driving licence.".to_string()
        }
        Prompt::AskCarInfo => {
            "Describe your car: make, model and colour.".to_string()
        }
        Prompt::AskPaymentProof => {
            "Almost done. Send a photo of your subscription payment receipt.".to_string()
        }
        Prompt::ApprovalPending => {
            "Your application has been sent for review. I will let you know once it is approved."
                .to_string()
        }
        Prompt::AskRoute(Role::Driver) => {
            "You are approved! 🎉 Which route do you drive?".to_string()
        }
        Prompt::AskRoute(Role::Passenger) => "Which route do you need?".to_string(),
        Prompt::ConfirmRoute(route) => {
            format!("You picked {}. Confirm?", route.label())
        }
        Prompt::AskPrice(route) => {
            format!("Route {} set. What is your price per seat (in sums)?", route.label())
        }
        Prompt::DriverReady { route, price } => format!(
            "You are all set! Route: {}, price: {} sums per seat.\nPassengers can now find you.",
            route.map(|r| r.label().to_string()).unwrap_or_else(|| "not set".to_string()),
            price
        ),
        Prompt::PassengerReady { route } => format!(
            "Registration complete! Route: {}.\nTap \"Find drivers\" to see who is available.",
            route.label()
        ),
        Prompt::Cancelled => CANCELLED.to_string(),
        Prompt::ApplicationRejected => APPLICATION_REJECTED.to_string(),
        Prompt::AdminUserBanned(user_id) => format!("User {} has been banned.", user_id),
        Prompt::AdminTargetNotFound(user_id) => {
            format!("No user with id {} found. Send another id or /cancel.", user_id)
        }
        Prompt::AdminDriverToggled { user_id, available } => format!(
            "Driver {} is now {}.",
            user_id,
            if *available { "available" } else { "busy" }
        ),
        Prompt::Invalid(rejection) => render_rejection(rejection),
    }
}

fn render_rejection(rejection: &Rejection) -> String {
    match rejection {
        Rejection::InvalidName(Role::Driver) => {
            "Please send your name using letters only.".to_string()
        }
        Rejection::InvalidName(Role::Passenger) => {
            "Please send your name: letters only, at least two characters.".to_string()
        }
        Rejection::ContactRequired => {
            "Please use the \"Share phone number\" button rather than typing.".to_string()
        }
        Rejection::PhotoRequired => "Please send a photo.".to_string(),
        Rejection::InvalidCarInfo => {
            "Please describe your car in a few words, e.g. \"White Chevrolet Cobalt\".".to_string()
        }
        Rejection::InvalidPrice => {
            "Please send the price as a positive whole number, e.g. 150000.".to_string()
        }
        Rejection::InvalidUserId => "Please send a numeric user id.".to_string(),
        Rejection::Unexpected => "Please use the buttons above.".to_string(),
    }
}

/// Operator-facing application card.
pub fn approval_request(request: &ApprovalRequest) -> String {
    format!(
        "🚖 New driver application\n\n\
         Id: {}\n\
         Name: {}\n\
         Phone: {}\n\
         Car: {}\n\
         Passport photo: {}\n\
         Payment photo: {}",
        request.user_id,
        request.name,
        request.phone,
        request.car_info,
        request.passport,
        request.payment
    )
}

/// Notice sent to a driver when a passenger books a seat.
pub fn booking_notice(passenger_name: &str, passenger_phone: &str) -> String {
    format!(
        "🎉 New passenger!\n\nName: {}\nPhone: {}\n\nPlease get in touch to arrange the ride.",
        passenger_name, passenger_phone
    )
}

/// One entry in the passenger's driver listing.
pub fn driver_card(record: &UserRecord) -> String {
    format!(
        "🚗 {}\nCar: {}\nPrice: {} sums\nRides: {}",
        record.name,
        record.car_info.as_deref().unwrap_or("—"),
        record
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string()),
        record.rides_count
    )
}

/// Confirmation shown to the passenger after booking.
pub fn booking_done(driver_name: &str) -> String {
    format!(
        "Done! {} has been notified and will contact you shortly.",
        driver_name
    )
}

/// Driver status summary for the driver menu.
pub fn driver_status(record: &UserRecord) -> String {
    format!(
        "Your profile:\nRoute: {}\nPrice: {}\nStatus: {}\nRides: {}",
        record
            .route
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| "not set".to_string()),
        record
            .price
            .map(|p| format!("{} sums", p))
            .unwrap_or_else(|| "not set".to_string()),
        if record.available { "available" } else { "busy" },
        record.rides_count
    )
}

/// Operator listing line for one user.
pub fn admin_user_line(record: &UserRecord) -> String {
    format!(
        "{} | {} | {} | {}{}",
        record.user_id,
        record.name,
        record.phone,
        record
            .route
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| "no route".to_string()),
        if record.banned { " | BANNED" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Route;

    #[test]
    fn test_prompt_rendering_mentions_route() {
        let text = render_prompt(&Prompt::ConfirmRoute(Route::TashkentNukus));
        assert!(text.contains(Route::TashkentNukus.label()));
    }

    #[test]
    fn test_driver_ready_without_route() {
        let text = render_prompt(&Prompt::DriverReady { route: None, price: 100 });
        assert!(text.contains("not set"));
        assert!(text.contains("100"));
    }
}
