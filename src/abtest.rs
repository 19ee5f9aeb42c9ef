//! A/B test aggregation engine
//!
//! A per-test accounting state machine keyed by block id. A test is created
//! by [`AbTestStore::start_test`] and stays active for the life of the store;
//! calling `start_test` again for the same block id resets it to zeroed
//! metrics (documented overwrite semantics, not a merge).
//!
//! Ingestion never errors: records for unknown block ids are dropped on
//! purpose, and results for unknown block ids are `None`, which keeps
//! "no such test" distinguishable from a tie or a zero score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{InteractionRecord, Variant};

/// A conversion counts this many times a raw click in the variant score
const CONVERSION_WEIGHT: f64 = 10.0;

/// Accumulated engagement metrics for one variant. All fields are
/// monotonically non-decreasing for the life of the test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub clicks: u64,
    pub conversions: u64,
    pub total_engagement: f64,
}

impl VariantMetrics {
    /// Combined score: (clicks + conversions * 10 + engagement) / 3
    pub fn score(&self) -> f64 {
        (self.clicks as f64 + self.conversions as f64 * CONVERSION_WEIGHT + self.total_engagement)
            / 3.0
    }
}

/// One active A/B test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbTest {
    /// Display label for variant A
    pub variant_a_label: String,
    /// Display label for variant B
    pub variant_b_label: String,
    /// When the test was started (or last reset)
    pub started_at: DateTime<Utc>,
    metrics_a: VariantMetrics,
    metrics_b: VariantMetrics,
}

impl AbTest {
    fn new(variant_a_label: String, variant_b_label: String) -> Self {
        Self {
            variant_a_label,
            variant_b_label,
            started_at: Utc::now(),
            metrics_a: VariantMetrics::default(),
            metrics_b: VariantMetrics::default(),
        }
    }

    pub fn metrics(&self, variant: Variant) -> &VariantMetrics {
        match variant {
            Variant::A => &self.metrics_a,
            Variant::B => &self.metrics_b,
        }
    }

    fn metrics_mut(&mut self, variant: Variant) -> &mut VariantMetrics {
        match variant {
            Variant::A => &mut self.metrics_a,
            Variant::B => &mut self.metrics_b,
        }
    }
}

/// Decision computed from a test's accumulated metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    /// Winning variant; A wins exact ties
    pub winner: Variant,
    pub score_a: f64,
    pub score_b: f64,
    pub computed_at: DateTime<Utc>,
}

/// Registry of active tests, owned by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbTestStore {
    tests: HashMap<String, AbTest>,
}

impl AbTestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test for a block. Always succeeds; an existing test for
    /// the same block id is replaced with zeroed metrics.
    pub fn start_test(
        &mut self,
        block_id: impl Into<String>,
        variant_a_label: impl Into<String>,
        variant_b_label: impl Into<String>,
    ) {
        self.tests.insert(
            block_id.into(),
            AbTest::new(variant_a_label.into(), variant_b_label.into()),
        );
    }

    /// Accumulate a record into its test's variant metrics.
    ///
    /// Records for block ids with no registered test are ignored. Negative
    /// or non-finite engagement durations are normalized to zero so the
    /// accumulators never decrease or go NaN.
    pub fn record_engagement(&mut self, record: &InteractionRecord) {
        let Some(test) = self.tests.get_mut(&record.block_id) else {
            return;
        };

        let engagement = if record.engagement_duration.is_finite() {
            record.engagement_duration.max(0.0)
        } else {
            0.0
        };

        let metrics = test.metrics_mut(record.variant);
        metrics.clicks += u64::from(record.click_count);
        metrics.conversions += u64::from(record.conversions);
        metrics.total_engagement += engagement;
    }

    /// Compute the winner for a block's test, or `None` if no test exists
    pub fn test_results(&self, block_id: &str) -> Option<TestResults> {
        let test = self.tests.get(block_id)?;

        let score_a = test.metrics_a.score();
        let score_b = test.metrics_b.score();
        let winner = if score_a >= score_b {
            Variant::A
        } else {
            Variant::B
        };

        Some(TestResults {
            winner,
            score_a,
            score_b,
            computed_at: Utc::now(),
        })
    }

    /// Look up an active test
    pub fn test(&self, block_id: &str) -> Option<&AbTest> {
        self.tests.get(block_id)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Load store state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize store state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClickTarget;
    use pretty_assertions::assert_eq;

    fn make_record(
        block_id: &str,
        variant: Variant,
        clicks: u32,
        conversions: u32,
        engagement: f64,
    ) -> InteractionRecord {
        InteractionRecord {
            block_id: block_id.to_string(),
            title: "Title".to_string(),
            content: "Content".to_string(),
            click_count: clicks,
            hover_time: 1.0,
            engagement_duration: engagement,
            click_target: ClickTarget::Button,
            variant,
            ab_test_group: variant,
            conversions,
        }
    }

    #[test]
    fn test_worked_scenario() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "T-A", "T-B");
        store.record_engagement(&make_record("b1", Variant::A, 10, 2, 5.0));
        store.record_engagement(&make_record("b1", Variant::B, 5, 0, 1.0));

        let results = store.test_results("b1").unwrap();
        // A: (10 + 20 + 5) / 3, B: (5 + 0 + 1) / 3
        assert!((results.score_a - 35.0 / 3.0).abs() < 1e-9);
        assert!((results.score_b - 2.0).abs() < 1e-9);
        assert_eq!(results.winner, Variant::A);
    }

    #[test]
    fn test_unknown_test_returns_none() {
        let store = AbTestStore::new();
        assert!(store.test_results("never-started").is_none());
    }

    #[test]
    fn test_unknown_record_is_ignored() {
        let mut store = AbTestStore::new();
        store.record_engagement(&make_record("ghost", Variant::A, 10, 1, 5.0));

        assert!(store.is_empty());
        assert!(store.test_results("ghost").is_none());
    }

    #[test]
    fn test_tie_break_prefers_a() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "A", "B");
        store.record_engagement(&make_record("b1", Variant::A, 3, 0, 0.0));
        store.record_engagement(&make_record("b1", Variant::B, 3, 0, 0.0));

        let results = store.test_results("b1").unwrap();
        assert_eq!(results.score_a, results.score_b);
        assert_eq!(results.winner, Variant::A);
    }

    #[test]
    fn test_zero_metrics_tie_prefers_a() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "A", "B");

        let results = store.test_results("b1").unwrap();
        assert_eq!(results.score_a, 0.0);
        assert_eq!(results.score_b, 0.0);
        assert_eq!(results.winner, Variant::A);
    }

    #[test]
    fn test_accumulation_is_monotone() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "A", "B");

        let mut previous = VariantMetrics::default();
        for i in 0..20 {
            store.record_engagement(&make_record("b1", Variant::A, i % 3, i % 2, 0.5));
            let current = store.test("b1").unwrap().metrics(Variant::A).clone();
            assert!(current.clicks >= previous.clicks);
            assert!(current.conversions >= previous.conversions);
            assert!(current.total_engagement >= previous.total_engagement);
            previous = current;
        }
    }

    #[test]
    fn test_restart_resets_metrics() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "old-A", "old-B");
        store.record_engagement(&make_record("b1", Variant::A, 100, 10, 50.0));

        store.start_test("b1", "new-A", "new-B");
        let test = store.test("b1").unwrap();
        assert_eq!(test.variant_a_label, "new-A");
        assert_eq!(*test.metrics(Variant::A), VariantMetrics::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_non_finite_engagement_normalized() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "A", "B");

        let mut record = make_record("b1", Variant::A, 1, 0, 5.0);
        record.engagement_duration = f64::NAN;
        store.record_engagement(&record);
        record.engagement_duration = -3.0;
        store.record_engagement(&record);

        let metrics = store.test("b1").unwrap().metrics(Variant::A);
        assert_eq!(metrics.total_engagement, 0.0);
        assert_eq!(metrics.clicks, 2);
    }

    #[test]
    fn test_tests_are_independent() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "A", "B");
        store.start_test("b2", "A", "B");
        store.record_engagement(&make_record("b1", Variant::B, 50, 5, 25.0));

        let untouched = store.test_results("b2").unwrap();
        assert_eq!(untouched.score_a, 0.0);
        assert_eq!(untouched.score_b, 0.0);
        assert_eq!(store.test_results("b1").unwrap().winner, Variant::B);
    }

    #[test]
    fn test_store_serialization_round_trip() {
        let mut store = AbTestStore::new();
        store.start_test("b1", "T-A", "T-B");
        store.record_engagement(&make_record("b1", Variant::A, 10, 2, 5.0));

        let json = store.to_json().unwrap();
        let loaded = AbTestStore::from_json(&json).unwrap();

        assert_eq!(
            loaded.test("b1").unwrap().metrics(Variant::A),
            store.test("b1").unwrap().metrics(Variant::A)
        );
        assert_eq!(loaded.test_results("b1").unwrap().winner, Variant::A);
    }
}
