use anyhow::{Context, Result};

use super::args::SummarizeCliArgs;
use crate::config::{expand_path, Config};
use crate::db;
use crate::summarize::{self, CommandSummarizer};

pub async fn handle_summarize_command(args: SummarizeCliArgs) -> Result<()> {
    let config = Config::load()?;
    let conn = db::init_db()?;
    let summarizer = CommandSummarizer::from_config(&config.summary);

    let template = match &config.summary.prompt_file {
        Some(path) => {
            let path = expand_path(path)?;
            Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt file {:?}", path))?,
            )
        }
        None => None,
    };

    let summary_path = summarize::summarize_transcript(
        &conn,
        &summarizer,
        &args.transcript,
        &args.title,
        &config.summaries_dir()?,
        template.as_deref(),
    )
    .await?;

    println!("Summary saved: {}", summary_path.display());
    Ok(())
}
