//! Financial gating decisions
//!
//! Pure functions with no I/O: whether an over-indebted cleaner may
//! receive new work, and how much commission a completed job carries.
//! The service layer consults these at booking creation, reassignment,
//! and completion; the wallet itself is debited elsewhere.

use serde::{Deserialize, Serialize};

/// Tunables for the gate, with the platform defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancePolicy {
    /// Most-negative wallet balance (minor units) before new work is refused.
    pub debt_limit: i64,
    /// Number of commission-exempt completed jobs per cleaner.
    pub free_jobs_quota: u32,
    /// Platform cut applied once the quota is exhausted.
    pub commission_rate: f64,
}

impl Default for FinancePolicy {
    fn default() -> Self {
        Self {
            debt_limit: -200,
            free_jobs_quota: 20,
            commission_rate: 0.07,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionDecision {
    pub commission_amount: u64,
    pub is_free_job: bool,
}

/// A cleaner is blocked once their balance sinks strictly below the
/// debt limit; sitting exactly at the limit still passes.
pub fn should_block_cleaner(balance: i64, debt_limit: i64) -> bool {
    balance < debt_limit
}

/// The first `free_jobs_quota` completed jobs carry no commission;
/// afterwards the platform takes `commission_rate` of the job price,
/// rounded to the nearest minor unit.
pub fn calculate_commission(
    job_price: u64,
    completed_jobs: u32,
    free_jobs_quota: u32,
    commission_rate: f64,
) -> CommissionDecision {
    if completed_jobs < free_jobs_quota {
        return CommissionDecision {
            commission_amount: 0,
            is_free_job: true,
        };
    }

    CommissionDecision {
        commission_amount: (job_price as f64 * commission_rate).round() as u64,
        is_free_job: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debt_limit_boundary_is_exclusive() {
        assert!(should_block_cleaner(-201, -200));
        assert!(!should_block_cleaner(-200, -200));
        assert!(!should_block_cleaner(0, -200));
        assert!(!should_block_cleaner(5_000, -200));
    }

    #[test]
    fn last_job_inside_quota_is_free() {
        let decision = calculate_commission(10_000, 19, 20, 0.07);

        assert!(decision.is_free_job);
        assert_eq!(decision.commission_amount, 0);
    }

    #[test]
    fn first_job_past_quota_pays_commission() {
        let decision = calculate_commission(10_000, 20, 20, 0.07);

        assert!(!decision.is_free_job);
        assert_eq!(decision.commission_amount, 700);
    }

    #[test]
    fn commission_rounds_to_nearest_minor_unit() {
        // 0.07 * 9995 = 699.65
        let decision = calculate_commission(9_995, 30, 20, 0.07);

        assert_eq!(decision.commission_amount, 700);
    }

    #[test]
    fn default_policy_matches_platform_terms() {
        let policy = FinancePolicy::default();

        assert_eq!(policy.debt_limit, -200);
        assert_eq!(policy.free_jobs_quota, 20);
        assert!((policy.commission_rate - 0.07).abs() < f64::EPSILON);
    }
}
