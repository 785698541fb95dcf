//! Default summary sink: one pretty-printed JSON file per run.

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use crate::PipelineRecord;
use crate::pipeline::SummarySink;

/// Writes `<dir>/<run id>_summary.json`, creating `dir` on first use.
pub struct JsonSummarySink {
    dir: PathBuf,
}

impl JsonSummarySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, record: &PipelineRecord) -> PathBuf {
        self.dir.join(format!("{}_summary.json", record.id))
    }
}

impl SummarySink for JsonSummarySink {
    fn emit(&self, record: &PipelineRecord) -> Result<Option<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.path_for(record);
        let json = serde_json::to_string_pretty(record).context("serialize pipeline record")?;
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        info!("Generated pipeline summary: {}", path.display());
        Ok(Some(path))
    }
}
