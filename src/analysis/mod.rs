//! Aggregation of persisted artifacts into the final report

mod aggregator;
mod loader;
mod render;

use chrono::Utc;
use tracing::info;

pub use aggregator::aggregate;
pub use loader::load_corpus;
pub use render::render_markdown;

use crate::config::AnalysisSettings;
use crate::error::Result;
use crate::orchestrator::ArtifactStore;
use crate::stages::StageCatalog;
use crate::types::FinalReport;

/// Load, aggregate and write `final_report.json` (and the Markdown
/// rendering when enabled)
pub fn generate_report(
    store: &ArtifactStore,
    catalog: &StageCatalog,
    settings: &AnalysisSettings,
) -> Result<FinalReport> {
    let corpus = load_corpus(store, catalog.len())?;
    let report = aggregate(&corpus, catalog, settings, Utc::now());

    let json_path = store.write_report_json(&report)?;
    info!(
        path = %json_path.display(),
        personas = report.totals.personas,
        skipped = report.skipped_artifacts.len(),
        "Final report written"
    );

    if settings.write_markdown {
        let md_path = store.write_report_markdown(&render_markdown(&report))?;
        info!(path = %md_path.display(), "Markdown report written");
    }
    Ok(report)
}
