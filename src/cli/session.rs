use console::style;
use impactlens::api::SdlcClient;
use impactlens::config::ClientConfig;
use impactlens::docpipe::DocPipelineClient;
use impactlens::errors::ImpactError;
use impactlens::pipeline::SdlcStore;
use impactlens::render::report::{render_doc_health, render_pipeline_summary, render_sdlc_health};
use crate::cli::commands::SummaryArgs;

pub async fn handle_summary(args: SummaryArgs, config: ClientConfig) -> Result<(), ImpactError> {
    let store = SdlcStore::new(SdlcClient::new(&config)?);
    store.load_session_by_id(&args.session_id).await?;
    let state = store.pipeline();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_pipeline_summary(&state));
    }
    Ok(())
}

/// Probe both backends and report each; fails if either is down.
pub async fn handle_health(config: ClientConfig) -> Result<(), ImpactError> {
    println!(
        "impactlens {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        env!("BUILD_TIMESTAMP"),
    );

    let sdlc = SdlcClient::new(&config)?;
    let docs = DocPipelineClient::new(&config)?;
    let (sdlc_health, doc_health) = tokio::join!(sdlc.health(), docs.health());

    let mut first_error = None;
    match sdlc_health {
        Ok(health) => println!("{} {}", style("✓").green(), render_sdlc_health(sdlc.base_url(), &health)),
        Err(e) => {
            println!("{} SDLC backend {}: {}", style("✗").red(), sdlc.base_url(), e);
            first_error.get_or_insert(e);
        }
    }
    match doc_health {
        Ok(health) => println!("{} {}", style("✓").green(), render_doc_health(docs.base_url(), &health)),
        Err(e) => {
            println!("{} Document pipeline {}: {}", style("✗").red(), docs.base_url(), e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub async fn handle_sample(config: ClientConfig) -> Result<(), ImpactError> {
    let sample = SdlcClient::new(&config)?.sample_requirement().await?;
    if let Some(epic) = &sample.jira_epic_id {
        println!("{} {}", style("Epic:").bold(), epic);
    }
    println!("{}", sample.requirement_text);
    Ok(())
}
