//! QuizForge CLI — turn a web page into a self-check quiz.
//!
//! Fetches a URL, distills its content into knowledge points with an LLM,
//! and packages generated quiz questions into a portable site artifact.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
