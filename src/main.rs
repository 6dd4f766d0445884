use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

mod analytics;
mod cli;
mod config;
mod ids;
mod intent;
mod model;
mod pack;
mod pipeline;
mod preferences;
mod profiles;
mod web;

use analytics::LogAnalyticsSink;
use config::Config;
use model::openai::OpenAiModelClient;
use pack::PackService;
use pipeline::{MatchPipeline, MatchRequest};
use preferences::InMemoryPreferenceStore;
use profiles::InMemoryProfileStore;

fn build_pipeline(config: &Config) -> anyhow::Result<Arc<MatchPipeline>> {
    let model = Arc::new(OpenAiModelClient::new(config.model.clone())?);

    let profiles = match &config.profiles_path {
        Some(path) => InMemoryProfileStore::from_json_file(Path::new(path))
            .with_context(|| format!("loading profiles from {}", path))?,
        None => InMemoryProfileStore::new(vec![]),
    };

    let preferences = match &config.preferences_path {
        Some(path) => InMemoryPreferenceStore::from_json_file(Path::new(path))
            .with_context(|| format!("loading preferences from {}", path))?,
        None => InMemoryPreferenceStore::default(),
    };

    Ok(Arc::new(MatchPipeline::new(
        model.clone(),
        model.clone(),
        model,
        Arc::new(profiles),
        Arc::new(preferences),
        Arc::new(LogAnalyticsSink),
        config.matching.clone(),
    )))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();
    let config = Config::load_with(Path::new(&args.config))?;

    match args.command {
        cli::Command::Daemon {} => {
            let pipeline = build_pipeline(&config)?;
            let pack = Arc::new(PackService::new(
                pipeline.clone(),
                Arc::new(LogAnalyticsSink),
            ));
            web::start_daemon(config, pipeline, pack);
        }

        cli::Command::Match {
            user_id,
            query,
            limit,
            offset,
        } => {
            let pipeline = build_pipeline(&config)?;

            let response = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(pipeline.run(MatchRequest {
                    user_id,
                    query_text: query,
                    prior_intent: None,
                    exclude_ids: vec![],
                    limit,
                    offset,
                }))?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        cli::Command::CompilePack { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading submissions from {}", file))?;
            let submissions: Vec<pack::PackSubmission> = serde_json::from_str(&raw)?;

            let summary = pack::compile(&submissions);
            let prompt = pack::wingman_prompt(&summary);

            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("{}", prompt);
        }
    }

    Ok(())
}
