//! Registration flow engine
//!
//! One engine drives both role flows. Each flow is an ordered table of
//! shared steps; the engine validates the incoming action against the
//! current step, commits to the record store at the flow's commit points and
//! answers with a semantic `Prompt` that the transport layer renders.
//!
//! Validation failures never escape: they become re-prompts and the state
//! does not advance. Persistence failures propagate as errors before any
//! state mutation, so the user can simply resend the triggering input.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::models::user::{Role, Route};
use crate::services::notification::{ApprovalRequest, Notifier};
use crate::services::user::UserService;
use crate::utils::errors::Result;
use super::context::{AdminStep, ConversationContext, FlowState, Step};

/// Ordered driver flow; the approval gate sits between the document commit
/// and the route/price setup.
const DRIVER_STEPS: &[Step] = &[
    Step::AwaitingName,
    Step::AwaitingPhone,
    Step::AwaitingPassportPhoto,
    Step::AwaitingCarInfo,
    Step::AwaitingPaymentProof,
    Step::AwaitingApproval,
    Step::AwaitingRoute,
    Step::AwaitingPrice,
];

const PASSENGER_STEPS: &[Step] = &[
    Step::AwaitingName,
    Step::AwaitingPhone,
    Step::AwaitingRoute,
    Step::AwaitingRouteConfirm,
];

fn flow_table(role: Role) -> &'static [Step] {
    match role {
        Role::Driver => DRIVER_STEPS,
        Role::Passenger => PASSENGER_STEPS,
    }
}

fn next_step(role: Role, current: Step) -> Option<Step> {
    let table = flow_table(role);
    let idx = table.iter().position(|s| *s == current)?;
    table.get(idx + 1).copied()
}

/// One inbound user action, already shaped by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Free-text input (name, car info, price, admin user ids)
    Text(String),
    /// Structured contact share; not free text
    ContactShared { phone_number: String },
    /// Opaque reference to an uploaded image
    ImageUploaded { file_id: String },
    RouteChosen(Route),
    ConfirmRoute,
    ChangeRoute,
    Cancel,
}

/// Why an input was rejected; rendered as a re-prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidName(Role),
    ContactRequired,
    PhotoRequired,
    InvalidCarInfo,
    InvalidPrice,
    InvalidUserId,
    /// Action does not belong to the current step at all
    Unexpected,
}

/// Semantic reply from the engine; the transport layer turns it into a chat
/// message plus keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    AskName(Role),
    AskPhone,
    AskPassportPhoto,
    AskCarInfo,
    AskPaymentProof,
    /// Application forwarded, waiting for the operator
    ApprovalPending,
    AskRoute(Role),
    ConfirmRoute(Route),
    AskPrice(Route),
    DriverReady { route: Option<Route>, price: i64 },
    PassengerReady { route: Route },
    Invalid(Rejection),
    Cancelled,
    ApplicationRejected,
    AdminUserBanned(i64),
    AdminTargetNotFound(i64),
    AdminDriverToggled { user_id: i64, available: bool },
}

/// Result of applying one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub prompt: Prompt,
    /// The flow is finished; the caller drops the conversation context
    pub done: bool,
}

impl Applied {
    fn next(prompt: Prompt) -> Self {
        Self { prompt, done: false }
    }

    fn done(prompt: Prompt) -> Self {
        Self { prompt, done: true }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self { prompt: Prompt::Invalid(rejection), done: false }
    }
}

/// The conversation state machine for both registration flows plus the small
/// operator input flow.
#[derive(Clone)]
pub struct FlowEngine {
    users: UserService,
    notifier: Arc<dyn Notifier>,
}

impl FlowEngine {
    pub fn new(users: UserService, notifier: Arc<dyn Notifier>) -> Self {
        Self { users, notifier }
    }

    /// Begin a registration flow for the chosen role.
    pub fn start_registration(&self, user_id: i64, role: Role) -> (ConversationContext, Prompt) {
        info!(user_id = user_id, role = %role, "Starting registration flow");
        let ctx = ConversationContext::new(
            user_id,
            FlowState::Registration { role, step: Step::AwaitingName },
        );
        (ctx, Prompt::AskName(role))
    }

    /// Begin an operator input flow (ban / toggle).
    pub fn start_admin(&self, user_id: i64, step: AdminStep) -> ConversationContext {
        ConversationContext::new(user_id, FlowState::Admin(step))
    }

    /// Apply one action to the user's conversation. Commits happen before
    /// any context mutation, so a failed commit leaves the step unchanged.
    pub async fn apply(&self, ctx: &mut ConversationContext, action: Action) -> Result<Applied> {
        debug!(
            user_id = ctx.user_id,
            flow = %ctx.flow.describe(),
            "Applying action to conversation"
        );

        if action == Action::Cancel {
            return self.cancel(ctx).await;
        }

        match ctx.flow {
            FlowState::Registration { role, step } => {
                self.apply_registration(ctx, role, step, action).await
            }
            FlowState::Admin(step) => self.apply_admin(ctx, step, action).await,
        }
    }

    async fn apply_registration(
        &self,
        ctx: &mut ConversationContext,
        role: Role,
        step: Step,
        action: Action,
    ) -> Result<Applied> {
        match (step, action) {
            (Step::AwaitingName, Action::Text(text)) => {
                let name = text.trim();
                if !valid_name(role, name) {
                    return Ok(Applied::rejected(Rejection::InvalidName(role)));
                }
                ctx.collected.name = Some(name.to_string());
                ctx.set_step(next_step(role, step).unwrap_or(step));
                Ok(Applied::next(Prompt::AskPhone))
            }
            (Step::AwaitingName, _) => Ok(Applied::rejected(Rejection::InvalidName(role))),

            (Step::AwaitingPhone, Action::ContactShared { phone_number }) => {
                ctx.collected.phone = Some(phone_number.clone());
                if role == Role::Passenger {
                    // Passenger record is committed as soon as contact arrives
                    let name = ctx.collected.name.clone().unwrap_or_default();
                    self.users
                        .register_passenger(ctx.user_id, &name, &phone_number)
                        .await?;
                }
                ctx.set_step(next_step(role, step).unwrap_or(step));
                let prompt = match role {
                    Role::Driver => Prompt::AskPassportPhoto,
                    Role::Passenger => Prompt::AskRoute(role),
                };
                Ok(Applied::next(prompt))
            }
            (Step::AwaitingPhone, _) => Ok(Applied::rejected(Rejection::ContactRequired)),

            (Step::AwaitingPassportPhoto, Action::ImageUploaded { file_id }) => {
                ctx.collected.passport = Some(file_id);
                ctx.set_step(next_step(role, step).unwrap_or(step));
                Ok(Applied::next(Prompt::AskCarInfo))
            }
            (Step::AwaitingPassportPhoto, _) => Ok(Applied::rejected(Rejection::PhotoRequired)),

            (Step::AwaitingCarInfo, Action::Text(text)) => {
                let car = text.trim();
                if car.chars().count() < 2 {
                    return Ok(Applied::rejected(Rejection::InvalidCarInfo));
                }
                ctx.collected.car_info = Some(car.to_string());
                ctx.set_step(next_step(role, step).unwrap_or(step));
                Ok(Applied::next(Prompt::AskPaymentProof))
            }
            (Step::AwaitingCarInfo, _) => Ok(Applied::rejected(Rejection::InvalidCarInfo)),

            (Step::AwaitingPaymentProof, Action::ImageUploaded { file_id }) => {
                self.commit_driver_application(ctx, file_id).await
            }
            (Step::AwaitingPaymentProof, _) => Ok(Applied::rejected(Rejection::PhotoRequired)),

            // Terminal until the operator decides; remind the user.
            (Step::AwaitingApproval, _) => Ok(Applied::next(Prompt::ApprovalPending)),

            (Step::AwaitingRoute, Action::RouteChosen(route)) => match role {
                Role::Driver => {
                    // Drivers commit the route immediately; the arrival-time
                    // rule is applied by the user service.
                    self.users.set_route(ctx.user_id, route).await?;
                    ctx.collected.pending_route = Some(route);
                    ctx.set_step(Step::AwaitingPrice);
                    Ok(Applied::next(Prompt::AskPrice(route)))
                }
                Role::Passenger => {
                    ctx.collected.pending_route = Some(route);
                    ctx.set_step(Step::AwaitingRouteConfirm);
                    Ok(Applied::next(Prompt::ConfirmRoute(route)))
                }
            },
            (Step::AwaitingRoute, _) => Ok(Applied::rejected(Rejection::Unexpected)),

            (Step::AwaitingRouteConfirm, Action::ConfirmRoute) => {
                match ctx.collected.pending_route {
                    Some(route) => {
                        self.users.set_route(ctx.user_id, route).await?;
                        info!(user_id = ctx.user_id, route = route.as_str(), "Passenger route confirmed");
                        Ok(Applied::done(Prompt::PassengerReady { route }))
                    }
                    // No pending choice to confirm; ask again.
                    None => {
                        ctx.set_step(Step::AwaitingRoute);
                        Ok(Applied::next(Prompt::AskRoute(role)))
                    }
                }
            }
            (Step::AwaitingRouteConfirm, Action::ChangeRoute) => {
                ctx.collected.pending_route = None;
                ctx.set_step(Step::AwaitingRoute);
                Ok(Applied::next(Prompt::AskRoute(role)))
            }
            (Step::AwaitingRouteConfirm, Action::RouteChosen(route)) => {
                // Picking another route mid-confirmation replaces the pending one
                ctx.collected.pending_route = Some(route);
                Ok(Applied::next(Prompt::ConfirmRoute(route)))
            }
            (Step::AwaitingRouteConfirm, _) => Ok(Applied::rejected(Rejection::Unexpected)),

            (Step::AwaitingPrice, Action::Text(text)) => {
                let price = match text.trim().parse::<i64>() {
                    Ok(p) if p > 0 => p,
                    _ => return Ok(Applied::rejected(Rejection::InvalidPrice)),
                };
                self.users.set_price(ctx.user_id, price).await?;
                info!(user_id = ctx.user_id, price = price, "Driver price committed");
                Ok(Applied::done(Prompt::DriverReady {
                    route: ctx.collected.pending_route,
                    price,
                }))
            }
            (Step::AwaitingPrice, _) => Ok(Applied::rejected(Rejection::InvalidPrice)),
        }
    }

    /// Commit point at the end of the driver's document phase: persist the
    /// partial record (unavailable pending approval) and hand the application
    /// to the operator.
    async fn commit_driver_application(
        &self,
        ctx: &mut ConversationContext,
        payment: String,
    ) -> Result<Applied> {
        let name = ctx.collected.name.clone().unwrap_or_default();
        let phone = ctx.collected.phone.clone().unwrap_or_default();
        let car_info = ctx.collected.car_info.clone().unwrap_or_default();
        let passport = ctx.collected.passport.clone().unwrap_or_default();

        self.users
            .register_driver(ctx.user_id, &name, &phone, &car_info, &passport, &payment)
            .await?;

        let request = ApprovalRequest {
            user_id: ctx.user_id,
            name,
            phone,
            car_info,
            passport,
            payment: payment.clone(),
        };
        // The record is committed; a failed hand-off is advisory only.
        if let Err(e) = self.notifier.approval_requested(&request).await {
            warn!(user_id = ctx.user_id, error = %e, "Failed to forward application to operator");
        }

        ctx.collected.payment = Some(payment);
        ctx.set_step(Step::AwaitingApproval);
        Ok(Applied::next(Prompt::ApprovalPending))
    }

    /// Operator approval. Gated on the durable record, not the volatile
    /// conversation: a driver application is pending as long as the committed
    /// record is an unavailable driver with documents attached. The
    /// conversation may have expired (or the process restarted) while the
    /// operator got around to it; in that case a fresh context is created at
    /// the route step. Anything else is a no-op.
    pub async fn approve(
        &self,
        user_id: i64,
        ctx: Option<ConversationContext>,
    ) -> Result<Option<(ConversationContext, Prompt)>> {
        match self.users.find(user_id).await? {
            Some(record)
                if record.role == Role::Driver
                    && !record.available
                    && record.passport.is_some()
                    && record.payment.is_some() => {}
            _ => {
                debug!(user_id = user_id, "Approve without a pending driver application; ignoring");
                return Ok(None);
            }
        }

        self.users.set_availability(user_id, true).await?;

        let ctx = match ctx {
            Some(mut ctx) if ctx.is_at(Role::Driver, Step::AwaitingApproval) => {
                ctx.set_step(Step::AwaitingRoute);
                ctx
            }
            _ => ConversationContext::new(
                user_id,
                FlowState::Registration {
                    role: Role::Driver,
                    step: Step::AwaitingRoute,
                },
            ),
        };

        info!(user_id = user_id, "Driver application approved");
        Ok(Some((ctx, Prompt::AskRoute(Role::Driver))))
    }

    /// Operator rejection: the application record is removed entirely.
    /// The caller clears the conversation context.
    pub async fn reject(&self, user_id: i64) -> Result<Prompt> {
        self.users.delete(user_id).await?;
        info!(user_id = user_id, "Driver application rejected");
        Ok(Prompt::ApplicationRejected)
    }

    /// Global cancel: valid from any state. Incomplete registrations leave
    /// no durable trace; completed records are kept and only the transient
    /// conversation state is dropped.
    async fn cancel(&self, ctx: &mut ConversationContext) -> Result<Applied> {
        if let FlowState::Registration { .. } = ctx.flow {
            let keep = match self.users.find(ctx.user_id).await? {
                Some(record) => UserService::is_registration_complete(&record),
                None => true,
            };
            if !keep {
                self.users.delete(ctx.user_id).await?;
                info!(user_id = ctx.user_id, "Cancelled mid-registration, record deleted");
            }
        }
        Ok(Applied::done(Prompt::Cancelled))
    }

    async fn apply_admin(
        &self,
        ctx: &mut ConversationContext,
        step: AdminStep,
        action: Action,
    ) -> Result<Applied> {
        let text = match action {
            Action::Text(text) => text,
            _ => return Ok(Applied::rejected(Rejection::InvalidUserId)),
        };
        let target: i64 = match text.trim().parse() {
            Ok(id) => id,
            Err(_) => return Ok(Applied::rejected(Rejection::InvalidUserId)),
        };

        match step {
            AdminStep::AwaitingBanUserId => match self.users.ban(target, ctx.user_id).await {
                Ok(()) => Ok(Applied::done(Prompt::AdminUserBanned(target))),
                Err(crate::utils::errors::RideMateError::UserNotFound { .. }) => {
                    Ok(Applied::next(Prompt::AdminTargetNotFound(target)))
                }
                Err(e) => Err(e),
            },
            AdminStep::AwaitingToggleDriverId => {
                match self.users.toggle_driver_availability(target).await {
                    Ok(available) => Ok(Applied::done(Prompt::AdminDriverToggled {
                        user_id: target,
                        available,
                    })),
                    Err(crate::utils::errors::RideMateError::UserNotFound { .. }) => {
                        Ok(Applied::next(Prompt::AdminTargetNotFound(target)))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

impl std::fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngine").finish_non_exhaustive()
    }
}

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}+$").expect("static pattern"));

/// Names are letters only. Drivers need any non-empty name, passengers at
/// least two characters.
fn valid_name(role: Role, name: &str) -> bool {
    let min_len = match role {
        Role::Driver => 1,
        Role::Passenger => 2,
    };
    if name.chars().count() < min_len {
        return false;
    }
    NAME_PATTERN.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_rules() {
        assert!(valid_name(Role::Driver, "Ivan"));
        assert!(valid_name(Role::Driver, "И"));
        assert!(!valid_name(Role::Driver, ""));
        assert!(!valid_name(Role::Driver, "Ivan42"));
        assert!(!valid_name(Role::Driver, "Ivan Petrov"));

        assert!(valid_name(Role::Passenger, "Aziz"));
        assert!(!valid_name(Role::Passenger, "A"));
    }

    #[test]
    fn test_flow_tables_are_ordered() {
        assert_eq!(next_step(Role::Driver, Step::AwaitingName), Some(Step::AwaitingPhone));
        assert_eq!(
            next_step(Role::Driver, Step::AwaitingPaymentProof),
            Some(Step::AwaitingApproval)
        );
        assert_eq!(next_step(Role::Driver, Step::AwaitingPrice), None);

        assert_eq!(
            next_step(Role::Passenger, Step::AwaitingPhone),
            Some(Step::AwaitingRoute)
        );
        assert_eq!(next_step(Role::Passenger, Step::AwaitingRouteConfirm), None);
    }
}
