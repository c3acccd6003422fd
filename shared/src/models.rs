//! Domain enums shared between the bot, the background jobs and the tests.
//!
//! The persistence layer stores these as plain text (or, for signal outcomes,
//! the original integer encoding); the conversions here are the single place
//! where the column values are interpreted.

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Long => "long",
            SignalDirection::Short => "short",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Some(SignalDirection::Long),
            "short" => Some(SignalDirection::Short),
            _ => None,
        }
    }
}

/// Signal lifecycle state. The `signals.hit_target` column keeps the
/// original integer encoding: 0 = open, 1 = hit target, -1 = hit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Open,
    HitTarget,
    HitStop,
}

impl SignalOutcome {
    pub fn from_column(value: i32) -> Self {
        match value {
            1 => SignalOutcome::HitTarget,
            -1 => SignalOutcome::HitStop,
            _ => SignalOutcome::Open,
        }
    }

    pub fn to_column(self) -> i32 {
        match self {
            SignalOutcome::Open => 0,
            SignalOutcome::HitTarget => 1,
            SignalOutcome::HitStop => -1,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SignalOutcome::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDirection {
    Above,
    Below,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertDirection::Above => "above",
            AlertDirection::Below => "below",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "above" => Some(AlertDirection::Above),
            "below" => Some(AlertDirection::Below),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTier {
    Free,
    Vip,
}

impl UserTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Free => "free",
            UserTier::Vip => "vip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPlan {
    Monthly,
    Quarterly,
    Yearly,
}

impl SubscriptionPlan {
    pub fn all() -> [SubscriptionPlan; 3] {
        [
            SubscriptionPlan::Monthly,
            SubscriptionPlan::Quarterly,
            SubscriptionPlan::Yearly,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Monthly => "monthly",
            SubscriptionPlan::Quarterly => "quarterly",
            SubscriptionPlan::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Some(SubscriptionPlan::Monthly),
            "quarterly" => Some(SubscriptionPlan::Quarterly),
            "yearly" => Some(SubscriptionPlan::Yearly),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionPlan::Monthly => "1 month",
            SubscriptionPlan::Quarterly => "3 months",
            SubscriptionPlan::Yearly => "12 months",
        }
    }

    pub fn price_usdt(&self) -> f64 {
        match self {
            SubscriptionPlan::Monthly => 29.99,
            SubscriptionPlan::Quarterly => 74.99,
            SubscriptionPlan::Yearly => 249.99,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            SubscriptionPlan::Monthly => Duration::days(30),
            SubscriptionPlan::Quarterly => Duration::days(90),
            SubscriptionPlan::Yearly => Duration::days(365),
        }
    }
}

/// How a renewal interacts with time remaining on the current term.
///
/// `FromNow` restarts the clock at confirmation time and discards any
/// remainder; it is the behavior the bot shipped with and stays the default.
/// `ExtendExpiry` stacks the new term onto the current end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewalPolicy {
    #[default]
    FromNow,
    ExtendExpiry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_outcome_roundtrips_column_encoding() {
        for outcome in [
            SignalOutcome::Open,
            SignalOutcome::HitTarget,
            SignalOutcome::HitStop,
        ] {
            assert_eq!(SignalOutcome::from_column(outcome.to_column()), outcome);
        }
        // Anything unrecognized reads as open rather than inventing a terminal state.
        assert_eq!(SignalOutcome::from_column(99), SignalOutcome::Open);
    }

    #[test]
    fn directions_parse_case_insensitively() {
        assert_eq!(SignalDirection::parse("LONG"), Some(SignalDirection::Long));
        assert_eq!(AlertDirection::parse("Below"), Some(AlertDirection::Below));
        assert_eq!(SignalDirection::parse("sideways"), None);
        assert_eq!(AlertDirection::parse(""), None);
    }

    #[test]
    fn plans_have_positive_prices_and_durations() {
        for plan in SubscriptionPlan::all() {
            assert!(plan.price_usdt() > 0.0);
            assert!(plan.duration() > Duration::zero());
            assert_eq!(SubscriptionPlan::parse(plan.as_str()), Some(plan));
        }
    }
}
