//! Query cost estimate before and after partitioning.

use serde::{Deserialize, Serialize};

use crate::config::CostConfig;

/// Estimated daily on-demand query cost for one table, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub size_gb: f64,
    /// Every query scans the whole table.
    pub before_per_day: f64,
    /// Every query scans a single partition.
    pub after_per_day: f64,
}

impl CostEstimate {
    pub fn estimate(size_gb: f64, cost: &CostConfig) -> Self {
        let scanned_tb = size_gb / 1000.0;
        let before_per_day = cost.queries_per_day * scanned_tb * cost.price_per_tb;
        let after_per_day =
            cost.queries_per_day * (scanned_tb / cost.partition_days) * cost.price_per_tb;
        Self {
            size_gb,
            before_per_day,
            after_per_day,
        }
    }

    pub fn daily_savings(&self) -> f64 {
        self.before_per_day - self.after_per_day
    }

    pub fn annual_savings(&self) -> f64 {
        self.daily_savings() * 365.0
    }

    /// Sum of several estimates.
    pub fn total<'a>(estimates: impl IntoIterator<Item = &'a CostEstimate>) -> Self {
        estimates
            .into_iter()
            .fold(CostEstimate::default(), |acc, e| CostEstimate {
                size_gb: acc.size_gb + e.size_gb,
                before_per_day: acc.before_per_day + e.before_per_day,
                after_per_day: acc.after_per_day + e.after_per_day,
            })
    }
}
