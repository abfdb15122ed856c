//! The `resizeflow status` command: read the metadata record for an image.

use clap::Args;
use resizeflow_core::Config;

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Image key (the pipeline identity)
    pub key: String,
}

/// Execute the status command.
pub async fn execute(args: StatusArgs, config: Config) -> anyhow::Result<()> {
    let flow = super::open_pipeline(config).await?;

    match flow.status(&args.key).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!(
            "No record for {} in {}",
            args.key,
            flow.config().pipeline.metadata_table_name
        ),
    }
}
