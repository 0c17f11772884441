use std::collections::HashMap;
use console::style;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use impactlens::config::ClientConfig;
use impactlens::docpipe::types::ExtractRequest;
use impactlens::docpipe::{current_step_from_status, DocPipelineClient, DocumentKind, JobSession, JobStep, UploadBatch};
use impactlens::errors::ImpactError;
use impactlens::render::report::{
    render_export, render_extraction, render_job, render_job_list, render_preview, render_step_indicators,
    render_suggestions, render_sync, render_transform, render_validation,
};
use crate::cli::commands::{DocsArgs, DocsCommand, UploadArgs};

pub async fn handle_docs(args: DocsArgs, config: ClientConfig) -> Result<(), ImpactError> {
    let client = DocPipelineClient::new(&config)?;
    let json = args.json;

    match args.command {
        DocsCommand::Upload(upload) => {
            let batch = build_batch(upload).await?;
            let mut session = JobSession::new(client);
            let job_id = session.create_job(batch).await?;
            emit(json, &session.state().current_job, || {
                let job = session.state().current_job.as_ref().map(render_job).unwrap_or_default();
                format!("{} Created job {}\n{}", style("✓").green(), style(&job_id).cyan(), job)
            })
        }
        DocsCommand::Status(job) => {
            let mut session = JobSession::new(client);
            session.load_job(&job.job_id).await?;
            let current = &session.state().current_job;
            emit(json, current, || current.as_ref().map(render_job).unwrap_or_default())
        }
        DocsCommand::List { limit, offset } => {
            let list = client.list_jobs(limit, offset).await?;
            emit(json, &list, || render_job_list(&list))
        }
        DocsCommand::Extract { job_id, llm, confidence } => {
            let mut session = open_for(client, &job_id, JobStep::Extract).await?;
            let options = ExtractRequest {
                use_llm_enhancement: llm.then_some(true),
                llm_confidence_threshold: confidence,
            };
            session.start_extraction(&options).await?;
            let results = &session.state().extraction_results;
            emit(json, results, || render_extraction(results))
        }
        DocsCommand::Suggest { job_id, entity } => {
            let mut session = open_for(client, &job_id, JobStep::Map).await?;
            let suggestions = session.fetch_mapping_suggestions(entity).await?;
            emit(json, &suggestions, || render_suggestions(entity, suggestions))
        }
        DocsCommand::Map { job_id, entity, mapping } => {
            let raw = tokio::fs::read_to_string(&mapping).await?;
            let mappings: HashMap<String, String> = serde_json::from_str(&raw)?;
            let mut session = open_for(client, &job_id, JobStep::Map).await?;
            let count = mappings.len();
            session.apply_entity_mapping(entity, mappings).await?;
            let applied = &session.state().applied_mappings[&entity];
            emit(json, applied, || format!("{} Applied {} {} field mappings", style("✓").green(), count, entity))
        }
        DocsCommand::Transform(job) => {
            let mut session = open_for(client, &job.job_id, JobStep::Transform).await?;
            let response = session.start_transformation().await?;
            emit(json, &response, || render_transform(&response))
        }
        DocsCommand::Preview { job_id, entity, limit, offset } => {
            let preview = client.preview(&job_id, entity, limit, offset).await?;
            emit(json, &preview, || {
                format!("{}  ({} of {} rows)", render_preview(&preview.data), preview.data.len(), preview.total_count)
            })
        }
        DocsCommand::Validate(job) => {
            let mut session = open_for(client, &job.job_id, JobStep::Transform).await?;
            let response = session.fetch_validation().await?;
            emit(json, response, || render_validation(response))
        }
        DocsCommand::Export(job) => {
            let mut session = open_for(client, &job.job_id, JobStep::Export).await?;
            let response = session.start_export().await?;
            emit(json, response, || render_export(response))
        }
        DocsCommand::Download { job_id, entity, out } => {
            let mut session = JobSession::new(client);
            session.load_job(&job_id).await?;
            let path = session.download_entity_csv(entity, &out).await?;
            emit(json, &path, || format!("{} Saved {}", style("✓").green(), path.display()))
        }
        DocsCommand::Sync(job) => {
            let mut session = JobSession::new(client);
            session.load_job(&job.job_id).await?;
            let response = session.sync_to_vector_db().await?;
            emit(json, &response, || render_sync(&response))
        }
        DocsCommand::Watch(job) => watch(client, &job.job_id, config.poll_interval(), json).await,
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), ImpactError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

async fn build_batch(args: UploadArgs) -> Result<UploadBatch, ImpactError> {
    let mut batch = UploadBatch::from_paths(&args.files).await?;
    let explicit = [
        (args.epic, DocumentKind::Epic),
        (args.estimation, DocumentKind::Estimation),
        (args.tdd, DocumentKind::Tdd),
        (args.stories, DocumentKind::Stories),
    ];
    for (path, kind) in explicit {
        if let Some(path) = path {
            let size = tokio::fs::metadata(&path).await?.len();
            batch.add_as(path, size, kind)?;
        }
    }
    for file in batch.files() {
        eprintln!("  {} {} → {}", style("•").dim(), file.file_name, kind_label(file.kind));
    }
    batch.validate()?;
    Ok(batch)
}

fn kind_label(kind: DocumentKind) -> String {
    format!("{} ({})", kind.label(), kind.field_name())
}

/// Load a job and refuse to run `step` before the job can reach it.
async fn open_for(client: DocPipelineClient, job_id: &str, step: JobStep) -> Result<JobSession, ImpactError> {
    let mut session = JobSession::new(client);
    session.load_job(job_id).await?;
    if !session.can_proceed_to_step(step) {
        let current = session
            .state()
            .current_job
            .as_ref()
            .map(|job| current_step_from_status(job.status))
            .unwrap_or(JobStep::Upload);
        return Err(ImpactError::Validation(format!(
            "Job {} is at the {} step; {} is not available yet",
            job_id, current, step
        )));
    }
    Ok(session)
}

async fn watch(client: DocPipelineClient, job_id: &str, interval: std::time::Duration, json: bool) -> Result<(), ImpactError> {
    let mut session = JobSession::new(client);
    session.load_job(job_id).await?;

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut last = None;
    let outcome = session
        .wait_until_idle(interval, &token, |job| {
            if last != Some(job.status) {
                last = Some(job.status);
                if !json {
                    println!("  [{}] {}", job.status, render_step_indicators(Some(job)));
                }
            }
        })
        .await?;

    if outcome.is_none() {
        eprintln!("{}", style("Stopped watching").yellow());
    }
    let current = &session.state().current_job;
    emit(json, current, || current.as_ref().map(render_job).unwrap_or_default())
}
