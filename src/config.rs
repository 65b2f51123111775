//! Tunable budgets and thresholds (spec §5/§9), overridable from the
//! environment the way the teacher's `ReconConfig` is parsed-then-validated
//! rather than silently clamped.

use std::env;

use crate::error::ReconError;

/// Last N digits of an account number kept as `acc_tail` (spec §3).
pub const ACC_TAIL_DIGITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Per distinct cents value, the cap on items kept before a KSUM
    /// search (spec §4.4).
    pub cap_per_value: usize,
    /// Hard ceiling on items handed to a subset-sum call after capping.
    pub ksum_max_items: usize,
    /// MITM splits until `2^(n/2) <= mitm_state_budget`.
    pub mitm_state_budget: usize,
    /// DP fallback only runs when `|target| <= dp_max_target_cents`.
    pub dp_max_target_cents: i64,
    /// DP fallback only runs when `items.len() <= dp_max_items_dp`.
    pub dp_max_items_dp: usize,
    /// Same-day partitions larger than this are trimmed before KSUM
    /// (spec §4.5 M2, §7 OversizedPartition).
    pub max_group_guard: usize,
    /// Keyword extractor: max tokens kept per description (spec §4.3).
    pub max_keywords: usize,
    /// Description-stage anchor amount floor, in cents (spec §4.5 "≥ 2,
    /// 100,000.00").
    pub desc_min_amount_cents: i64,
    /// Description-stage branch-and-bound subset-sum: max recursion depth.
    pub branch_max_depth: usize,
    /// Description-stage branch-and-bound subset-sum: max visited nodes.
    pub branch_max_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            cap_per_value: 32,
            ksum_max_items: 48,
            mitm_state_budget: 200_000,
            dp_max_target_cents: 200_000,
            dp_max_items_dp: 24,
            max_group_guard: 2_000,
            max_keywords: 8,
            desc_min_amount_cents: 100_000_00,
            branch_max_depth: 25,
            branch_max_nodes: 200_000,
        }
    }
}

macro_rules! override_from_env {
    ($limits:ident, $field:ident, $var:literal, $parse:ty) => {
        if let Ok(raw) = env::var($var) {
            let parsed: $parse = raw.parse().map_err(|_| ReconError::ConfigValidation {
                var: $var.to_string(),
                value: raw.clone(),
                reason: format!("not a valid {}", stringify!($parse)),
            })?;
            if parsed <= 0 as $parse {
                return Err(ReconError::ConfigValidation {
                    var: $var.to_string(),
                    value: raw,
                    reason: "must be positive".into(),
                });
            }
            $limits.$field = parsed as _;
        }
    };
}

impl Limits {
    /// Start from defaults, then apply any of the named environment
    /// variables present. Unset variables keep the default; a present
    /// but unparseable/invalid variable is a hard error, never a
    /// silently-ignored override.
    pub fn from_env() -> Result<Self, ReconError> {
        let mut limits = Self::default();
        override_from_env!(limits, cap_per_value, "CAP_PER_VALUE", i64);
        override_from_env!(limits, ksum_max_items, "KSUM_MAX_ITEMS", i64);
        override_from_env!(limits, mitm_state_budget, "MITM_STATE_BUDGET", i64);
        override_from_env!(limits, dp_max_target_cents, "DP_MAX_TARGET_CENTS", i64);
        override_from_env!(limits, dp_max_items_dp, "DP_MAX_ITEMS_DP", i64);
        override_from_env!(limits, max_group_guard, "MAX_GROUP_GUARD", i64);
        override_from_env!(limits, max_keywords, "MAX_KEYWORDS", i64);
        override_from_env!(limits, desc_min_amount_cents, "DESC_MIN_AMOUNT_CENTS", i64);
        override_from_env!(limits, branch_max_depth, "BRANCH_MAX_DEPTH", i64);
        override_from_env!(limits, branch_max_nodes, "BRANCH_MAX_NODES", i64);
        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec() {
        let limits = Limits::default();
        assert_eq!(limits.cap_per_value, 32);
        assert_eq!(limits.ksum_max_items, 48);
        assert_eq!(limits.mitm_state_budget, 200_000);
        assert_eq!(limits.dp_max_target_cents, 200_000);
        assert_eq!(limits.dp_max_items_dp, 24);
        assert_eq!(limits.max_group_guard, 2_000);
    }

    #[test]
    fn env_override_applies() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("KSUM_MAX_ITEMS", "64");
        let limits = Limits::from_env().unwrap();
        assert_eq!(limits.ksum_max_items, 64);
        env::remove_var("KSUM_MAX_ITEMS");
    }

    #[test]
    fn env_override_rejects_garbage() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("KSUM_MAX_ITEMS", "not-a-number");
        let err = Limits::from_env().unwrap_err();
        assert!(err.to_string().contains("KSUM_MAX_ITEMS"));
        env::remove_var("KSUM_MAX_ITEMS");
    }

    #[test]
    fn env_override_rejects_non_positive() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("MAX_GROUP_GUARD", "0");
        let err = Limits::from_env().unwrap_err();
        assert!(err.to_string().contains("must be positive"));
        env::remove_var("MAX_GROUP_GUARD");
    }
}
