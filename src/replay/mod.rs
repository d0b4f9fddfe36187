//! Scenario replay sources: where the ordered sample records come from.
//!
//! Fetch and decode failures surface here as `anyhow` errors. The
//! evaluator only ever sees a record list, possibly empty.

pub mod file;
pub mod http;

pub use self::file::FileSource;
pub use self::http::HttpSource;

use crate::detect::{SampleRecord, ScenarioClass};
use anyhow::Result;

/// Anything that can deliver the records of one scenario replay.
#[async_trait::async_trait]
pub trait ScenarioSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> String;

    /// Ordered records for `scenario`.
    async fn fetch(&self, scenario: ScenarioClass) -> Result<Vec<SampleRecord>>;
}

/// Keep the records that belong to `scenario`.
///
/// Records without a `fault_number` are assumed to already belong to it.
pub fn filter_scenario(records: Vec<SampleRecord>, scenario: ScenarioClass) -> Vec<SampleRecord> {
    records
        .into_iter()
        .filter(|r| r.fault_number.map_or(true, |f| scenario.matches(f)))
        .collect()
}
