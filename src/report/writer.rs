use std::path::Path;

use anyhow::Result;
use serde_json as json;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::report::ReportEntry;
use crate::runner::ScenarioResult;

pub struct ReportWriter {
    report_file: File,
}

impl ReportWriter {
    pub async fn initialize(path: &Path) -> Result<Self> {
        log::info!("writing report to {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let report_file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(ReportWriter { report_file })
    }

    pub async fn write(&mut self, result: &ScenarioResult) -> Result<()> {
        for entry in ReportEntry::from_result(result) {
            self.report_file
                .write_all(json::to_string(&entry)?.as_bytes())
                .await?;
            self.report_file.write_u8(b'\n').await?;
        }
        self.report_file.flush().await?;
        Ok(())
    }
}
