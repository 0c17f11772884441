use console::style;
use impactlens::api::{generate_session_id, validate_requirement, PipelineRequest, SdlcClient};
use impactlens::config::ClientConfig;
use impactlens::errors::ImpactError;
use impactlens::pipeline::{PipelineState, PipelineStatus, RunOutcome, SdlcStore};
use impactlens::render::report::render_pipeline_summary;
use impactlens::render::RunProgress;
use tracing::{info, warn};
use crate::cli::commands::RunArgs;

pub async fn handle_run(args: RunArgs, config: ClientConfig) -> Result<(), ImpactError> {
    let client = SdlcClient::new(&config)?;
    let (requirement, epic) = resolve_requirement(&args, &client).await?;
    let matches = (!args.matches.is_empty()).then(|| args.matches.clone());

    let state = if args.no_stream {
        run_blocking(&client, requirement, epic, matches).await?
    } else {
        run_streaming(client, &requirement, epic, matches, args.json).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_pipeline_summary(&state));
    }

    match (state.status, &state.error) {
        (Some(PipelineStatus::Error), error) => Err(ImpactError::Pipeline(
            error.clone().unwrap_or_else(|| "Pipeline error".to_string()),
        )),
        _ => Ok(()),
    }
}

async fn resolve_requirement(args: &RunArgs, client: &SdlcClient) -> Result<(String, Option<String>), ImpactError> {
    if let Some(text) = &args.text {
        return Ok((text.clone(), args.epic.clone()));
    }
    if let Some(path) = &args.file {
        let text = tokio::fs::read_to_string(path).await?;
        return Ok((text, args.epic.clone()));
    }
    let sample = client.sample_requirement().await?;
    info!(epic = ?sample.jira_epic_id, "Using sample requirement");
    Ok((sample.requirement_text, args.epic.clone().or(sample.jira_epic_id)))
}

async fn run_blocking(
    client: &SdlcClient,
    requirement: String,
    epic: Option<String>,
    matches: Option<Vec<String>>,
) -> Result<PipelineState, ImpactError> {
    validate_requirement(&requirement)?;
    let request = PipelineRequest {
        session_id: generate_session_id(),
        requirement_text: requirement,
        jira_epic_id: epic,
        selected_match_ids: matches,
    };
    eprintln!("{} Running assessment {}...", style("▶").green().bold(), style(&request.session_id).cyan());
    let response = client.run_pipeline(&request).await?;
    let mut state = PipelineState::from_response(response);
    state.jira_epic_id = request.jira_epic_id;
    Ok(state)
}

/// Stream a run, rendering each snapshot. Ctrl-C cancels the stream.
async fn run_streaming(
    client: SdlcClient,
    requirement: &str,
    epic: Option<String>,
    matches: Option<Vec<String>>,
    quiet: bool,
) -> Result<PipelineState, ImpactError> {
    let store = SdlcStore::new(client);
    let mut handle = store.start_run(requirement, epic, matches)?;
    let mut progress = (!quiet).then(RunProgress::new);

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Interrupted, cancelling stream"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };
    let outcome = store
        .follow(&mut handle, interrupt, |snapshot| {
            if let Some(progress) = progress.as_mut() {
                progress.update(snapshot);
            }
        })
        .await;

    let snapshot = store.snapshot();
    if let Some(progress) = progress {
        progress.finish(&snapshot);
    }
    match outcome {
        RunOutcome::Settled => {}
        RunOutcome::Interrupted => eprintln!("{}", style("Run cancelled; partial results below").yellow()),
        RunOutcome::StreamLost => eprintln!("{}", style("Stream ended unexpectedly; partial results below").yellow()),
    }
    Ok(snapshot.pipeline)
}
