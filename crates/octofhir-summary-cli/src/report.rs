//! Report file outputs
//!
//! Two artifacts per study run: a newline-formatted text report per
//! population, and one JSON array with every summary record.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use octofhir_summary_engine::Population;
use octofhir_summary_types::SummaryRecord;

/// Write one text report per population, named by its official identifier
pub fn write_text_reports(
    out_dir: &Path,
    populations: &[Population],
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating report directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    for population in populations {
        let path = out_dir.join(format!("{}.yaml", population.identifier.value.to_lowercase()));
        let contents = format!(
            "# Variable summaries for {}, generated {}\n{}",
            population.identifier.value,
            Utc::now().format("%Y-%m-%d"),
            population.text_report()
        );
        fs::write(&path, contents)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "text report written");
        written.push(path);
    }
    Ok(written)
}

/// Dump every record of the run as one JSON array, named by the study tag
pub fn write_record_dump(
    out_dir: &Path,
    study_tag: &str,
    records: &[SummaryRecord],
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating report directory {}", out_dir.display()))?;

    let path = out_dir.join(format!("{}.json", study_tag.to_lowercase()));
    let contents = serde_json::to_string_pretty(records).context("serializing summary records")?;
    fs::write(&path, contents).with_context(|| format!("writing dump {}", path.display()))?;
    info!(path = %path.display(), count = records.len(), "record dump written");
    Ok(path)
}
