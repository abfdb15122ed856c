//! The `resizeflow ingest` command: feed a notification file to the trigger.
//!
//! One JSON report per started instance is written to stdout (JSONL).

use std::path::{Path, PathBuf};

use clap::Args;
use futures_util::future::join_all;
use tokio::io::AsyncReadExt;

use resizeflow_core::{Config, PipelineReport, PipelineState};

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Notification JSON file (`-` reads stdin)
    pub event: PathBuf,
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, config: Config) -> anyhow::Result<()> {
    let payload = read_payload(&args.event).await?;
    let flow = super::open_pipeline(config).await?;

    let handles = flow.trigger().on_payload(&payload).await?;
    for handle in &handles {
        if let Some(reason) = handle.coalesced() {
            tracing::info!("Skipping {}: {:?}", handle.identity(), reason);
        }
    }
    let started = handles.iter().filter(|h| h.is_started()).count();
    tracing::info!("Started {} of {} instances", started, handles.len());

    let waits = join_all(handles.into_iter().map(|h| h.wait()));
    tokio::pin!(waits);

    let reports = tokio::select! {
        reports = &mut waits => reports,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling running instances between stages");
            flow.shutdown();
            waits.await
        }
    };

    let reports: Vec<PipelineReport> = reports.into_iter().flatten().collect();
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let summary = Summary::of(&reports);
    tracing::info!(
        "Done: {} completed, {} invalid, {} failed, {} cancelled",
        summary.completed,
        summary.invalid,
        summary.failed,
        summary.cancelled
    );

    if summary.failed > 0 {
        anyhow::bail!("{} instances failed", summary.failed);
    }
    Ok(())
}

async fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        tokio::io::stdin().read_to_string(&mut payload).await?;
        return Ok(payload);
    }

    tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!(
            "Could not read notification file {}: {}\n\n  Hint: Check the file path and try again.",
            path.display(),
            e
        )
    })
}

#[derive(Debug, Default, PartialEq)]
struct Summary {
    completed: usize,
    invalid: usize,
    failed: usize,
    cancelled: usize,
}

impl Summary {
    fn of(reports: &[PipelineReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            if report.cancelled {
                summary.cancelled += 1;
                continue;
            }
            match report.state {
                PipelineState::Completed => summary.completed += 1,
                PipelineState::Invalid => summary.invalid += 1,
                PipelineState::Failed => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use resizeflow_core::metadata::MemoryMetadataStore;
    use resizeflow_core::storage::MemoryBlobStore;
    use resizeflow_core::Resizeflow;

    #[tokio::test]
    async fn test_summary_counts_terminal_states() {
        let flow = Resizeflow::new(
            Config::default(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryMetadataStore::new("meta")),
        );
        let invalid = flow.process("uploads", "notes.txt").await.unwrap().unwrap();
        let keyless = flow.process("uploads", "").await.unwrap().unwrap();

        let summary = Summary::of(&[invalid, keyless]);
        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_read_payload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"records":[]}"#).unwrap();

        assert_eq!(read_payload(&path).await.unwrap(), r#"{"records":[]}"#);
        assert!(read_payload(&dir.path().join("missing.json")).await.is_err());
    }
}
