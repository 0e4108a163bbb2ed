// User subscription models
// Path: users/{uid} (field: subscription)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free tier, capped on active notebooks
    #[default]
    Basic,
    Smart,
    Pro,
}

/// Subscription attached to the user document
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserPlan {
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserPlan {
    pub fn basic() -> Self {
        Self::default()
    }

    /// Plan in force at `now`; a lapsed paid plan falls back to basic
    pub fn effective_tier(&self, now: DateTime<Utc>) -> PlanTier {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => PlanTier::Basic,
            _ => self.plan,
        }
    }

    pub fn is_free_tier(&self, now: DateTime<Utc>) -> bool {
        self.effective_tier(now) == PlanTier::Basic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expired_plan_is_basic() {
        let now = Utc::now();
        let plan = UserPlan {
            plan: PlanTier::Pro,
            expires_at: Some(now - Duration::days(1)),
        };
        assert!(plan.is_free_tier(now));
    }

    #[test]
    fn test_active_plan_keeps_tier() {
        let now = Utc::now();
        let plan = UserPlan {
            plan: PlanTier::Smart,
            expires_at: Some(now + Duration::days(30)),
        };
        assert_eq!(plan.effective_tier(now), PlanTier::Smart);

        let lifetime = UserPlan {
            plan: PlanTier::Pro,
            expires_at: None,
        };
        assert!(!lifetime.is_free_tier(now));
    }
}
