//! Usage-limits snapshot returned by the upstream usage endpoint
//!
//! Only the fields the pool's availability model reads are modelled; unknown
//! fields are ignored so upstream additions do not break deserialization.

use serde::{Deserialize, Serialize};

use crate::constants::FREE_TRIAL_ACTIVE;

/// Per-token quota snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    #[serde(default)]
    pub usage_breakdown_list: Vec<UsageBreakdown>,
}

impl UsageLimits {
    /// First breakdown for the given resource type.
    pub fn breakdown(&self, resource_type: &str) -> Option<&UsageBreakdown> {
        self.usage_breakdown_list
            .iter()
            .find(|b| b.resource_type == resource_type)
    }
}

/// Usage of one metered resource.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBreakdown {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub usage_limit_with_precision: f64,
    #[serde(default)]
    pub current_usage_with_precision: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_trial_info: Option<FreeTrialInfo>,
}

/// Free-trial allowance layered on top of the base limit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTrialInfo {
    #[serde(default)]
    pub free_trial_status: String,
    #[serde(default)]
    pub usage_limit_with_precision: f64,
    #[serde(default)]
    pub current_usage_with_precision: f64,
}

impl FreeTrialInfo {
    pub fn is_active(&self) -> bool {
        self.free_trial_status == FREE_TRIAL_ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_upstream_shape() {
        let json = r#"{
            "daysUntilReset": 12,
            "usageBreakdownList": [
                {"resourceType":"AGENTIC_REQUEST","usageLimitWithPrecision":10.0,"currentUsageWithPrecision":1.0},
                {"resourceType":"CREDIT","usageLimitWithPrecision":50.0,"currentUsageWithPrecision":12.5,
                 "freeTrialInfo":{"freeTrialStatus":"ACTIVE","usageLimitWithPrecision":500.0,"currentUsageWithPrecision":0.25}}
            ]
        }"#;
        let usage: UsageLimits = serde_json::from_str(json).unwrap();
        assert_eq!(usage.usage_breakdown_list.len(), 2);

        let credit = usage.breakdown("CREDIT").unwrap();
        assert_eq!(credit.usage_limit_with_precision, 50.0);
        assert_eq!(credit.current_usage_with_precision, 12.5);
        let trial = credit.free_trial_info.as_ref().unwrap();
        assert!(trial.is_active());
        assert_eq!(trial.current_usage_with_precision, 0.25);
    }

    #[test]
    fn missing_list_defaults_to_empty() {
        let usage: UsageLimits = serde_json::from_str("{}").unwrap();
        assert!(usage.usage_breakdown_list.is_empty());
        assert!(usage.breakdown("CREDIT").is_none());
    }

    #[test]
    fn expired_trial_is_not_active() {
        let trial = FreeTrialInfo {
            free_trial_status: "EXPIRED".into(),
            ..Default::default()
        };
        assert!(!trial.is_active());
    }
}
