//! Per-source summary: how many runs a data source holds, what range they
//! span, and which run numbers within that range are missing.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSummary {
    pub total: usize,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub gaps: Vec<u32>,
}

impl SourceSummary {
    pub fn from_runs(runs: &BTreeSet<u32>) -> Self {
        let Some(&min) = runs.iter().next() else {
            return SourceSummary::default();
        };
        let max = *runs.iter().next_back().unwrap();
        let gaps = (min..=max).filter(|run| !runs.contains(run)).collect();
        SourceSummary { total: runs.len(), min: Some(min), max: Some(max), gaps }
    }
}

/// Run numbers present in `from` but not in `to`, in ascending order.
pub fn differential(from: &BTreeSet<u32>, to: &BTreeSet<u32>) -> Vec<u32> {
    from.difference(to).copied().collect()
}
