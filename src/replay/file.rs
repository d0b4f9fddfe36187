use super::{filter_scenario, ScenarioSource};
use crate::detect::{SampleRecord, ScenarioClass};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Replay records stored on disk, either as one JSON array or as JSON lines.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Decode a JSON array, or one record per non-empty line.
pub fn parse_records(content: &str) -> Result<Vec<SampleRecord>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("failed to parse record array");
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("failed to parse record on line {}", n + 1))
        })
        .collect()
}

#[async_trait::async_trait]
impl ScenarioSource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch(&self, scenario: ScenarioClass) -> Result<Vec<SampleRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read replay file: {}", self.path.display()))?;
        let records = filter_scenario(parse_records(&content)?, scenario);
        info!(path = %self.path.display(), %scenario, records = records.len(), "loaded replay");
        Ok(records)
    }
}
