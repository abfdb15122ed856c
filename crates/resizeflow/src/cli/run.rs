//! The `resizeflow run` command: one object through the whole pipeline.

use clap::Args;
use resizeflow_core::{Config, PipelineState};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source container (bucket) name
    pub bucket: String,

    /// Object key inside the container
    pub key: String,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: Config) -> anyhow::Result<()> {
    let flow = super::open_pipeline(config).await?;

    let Some(report) = flow.process(&args.bucket, &args.key).await? else {
        anyhow::bail!("{} is already being processed", args.key);
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    match report.state {
        PipelineState::Completed => Ok(()),
        state => anyhow::bail!(
            "{} ended {}: {}",
            report.identity,
            state,
            report.error.as_deref().unwrap_or("no detail")
        ),
    }
}
