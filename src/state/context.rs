//! Conversation context management
//!
//! Tracks each user's position in a registration (or admin) flow together
//! with the fields collected so far. Contexts are volatile: they live only in
//! the in-memory state storage and are lost on restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::{Role, Route};

/// A step within a registration flow. Both role flows draw from this shared
/// set; the per-role ordering lives in the flow tables in `machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    AwaitingName,
    AwaitingPhone,
    AwaitingPassportPhoto,
    AwaitingCarInfo,
    AwaitingPaymentProof,
    AwaitingApproval,
    AwaitingRoute,
    AwaitingRouteConfirm,
    AwaitingPrice,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::AwaitingName => "awaiting_name",
            Step::AwaitingPhone => "awaiting_phone",
            Step::AwaitingPassportPhoto => "awaiting_passport_photo",
            Step::AwaitingCarInfo => "awaiting_car_info",
            Step::AwaitingPaymentProof => "awaiting_payment_proof",
            Step::AwaitingApproval => "awaiting_approval",
            Step::AwaitingRoute => "awaiting_route",
            Step::AwaitingRouteConfirm => "awaiting_route_confirm",
            Step::AwaitingPrice => "awaiting_price",
        }
    }
}

/// Operator panel input steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminStep {
    AwaitingBanUserId,
    AwaitingToggleDriverId,
}

/// Which flow the user is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Registration { role: Role, step: Step },
    Admin(AdminStep),
}

impl FlowState {
    pub fn describe(&self) -> String {
        match self {
            FlowState::Registration { role, step } => format!("{}:{}", role, step.as_str()),
            FlowState::Admin(AdminStep::AwaitingBanUserId) => "admin:ban_user_id".to_string(),
            FlowState::Admin(AdminStep::AwaitingToggleDriverId) => {
                "admin:toggle_driver_id".to_string()
            }
        }
    }
}

/// Attributes gathered step by step, committed to the record store at the
/// flow's commit points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub passport: Option<String>,
    pub car_info: Option<String>,
    pub payment: Option<String>,
    /// Route proposed but not yet confirmed (passenger flow)
    pub pending_route: Option<Route>,
}

/// Per-user conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: i64,
    pub flow: FlowState,
    pub collected: CollectedFields,
    /// Monotonic counter bumped on every state-advancing action; the
    /// inactivity supervisor compares it at fire time.
    pub activity_seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(user_id: i64, flow: FlowState) -> Self {
        Self {
            user_id,
            flow,
            collected: CollectedFields::default(),
            activity_seq: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record user activity; stale supervisor checks see the old seq and back off.
    pub fn touch(&mut self) {
        self.activity_seq += 1;
        self.updated_at = Utc::now();
    }

    pub fn set_step(&mut self, step: Step) {
        if let FlowState::Registration { role, .. } = self.flow {
            self.flow = FlowState::Registration { role, step };
        }
    }

    pub fn registration_step(&self) -> Option<(Role, Step)> {
        match self.flow {
            FlowState::Registration { role, step } => Some((role, step)),
            FlowState::Admin(_) => None,
        }
    }

    pub fn is_at(&self, role: Role, step: Step) -> bool {
        self.registration_step() == Some((role, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_advances_seq() {
        let mut ctx = ConversationContext::new(
            1,
            FlowState::Registration {
                role: Role::Driver,
                step: Step::AwaitingName,
            },
        );
        assert_eq!(ctx.activity_seq, 0);
        ctx.touch();
        ctx.touch();
        assert_eq!(ctx.activity_seq, 2);
    }

    #[test]
    fn test_set_step_keeps_role() {
        let mut ctx = ConversationContext::new(
            1,
            FlowState::Registration {
                role: Role::Passenger,
                step: Step::AwaitingName,
            },
        );
        ctx.set_step(Step::AwaitingPhone);
        assert!(ctx.is_at(Role::Passenger, Step::AwaitingPhone));
    }
}
