use std::collections::HashMap;
use std::fmt::Write;
use console::{style, StyledObject};
use serde_json::{Map, Value};
use crate::api::types::{HealthResponse, Level};
use crate::docpipe::steps::{step_status, step_status_for_job, StepStatus, PIPELINE_STEPS};
use crate::docpipe::types::{
    DocHealthResponse, EntityType, ExportResponse, ExtractionResult, JobListResponse, JobStatus, MappingSuggestion,
    PipelineJob, SyncResponse, TransformResponse, ValidationResponse,
};
use crate::pipeline::{PipelineState, PipelineStatus, StageCompletion, STAGES};

const MAX_LISTED: usize = 5;

pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = ms / 3_600_000;
        let mins = (ms % 3_600_000) / 60_000;
        format!("{}h {}m", hours, mins)
    }
}

/// Binary units with one decimal, trailing `.0` dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}h", hours as i64)
    } else {
        format!("{:.1}h", hours)
    }
}

fn level_style(level: Level) -> StyledObject<&'static str> {
    match level {
        Level::High => style(level.as_str()).red().bold(),
        Level::Medium => style(level.as_str()).yellow(),
        Level::Low => style(level.as_str()).green(),
        Level::Unknown => style(level.as_str()).dim(),
    }
}

fn pipeline_status_style(status: Option<PipelineStatus>) -> StyledObject<String> {
    match status {
        None => style("not started".to_string()).dim(),
        Some(PipelineStatus::Completed) => style(status_label(status)).green().bold(),
        Some(PipelineStatus::Error) => style(status_label(status)).red().bold(),
        Some(_) => style(status_label(status)).cyan(),
    }
}

fn status_label(status: Option<PipelineStatus>) -> String {
    status.map(|s| s.to_string()).unwrap_or_default()
}

pub fn job_status_style(status: JobStatus) -> StyledObject<&'static str> {
    let s = status.as_str();
    match status {
        JobStatus::Created => style(s).dim(),
        JobStatus::Validating => style(s).yellow(),
        JobStatus::Validated | JobStatus::Completed => style(s).green(),
        JobStatus::Failed => style(s).red().bold(),
        _ => style(s).cyan(),
    }
}

/// One line per user-visible stage.
pub fn render_stage_checklist(completion: &StageCompletion) -> String {
    let mut out = String::new();
    for stage in STAGES {
        let marker = if completion.get(*stage) {
            style("✓").green()
        } else {
            style("○").dim()
        };
        let _ = writeln!(out, "  {} {}", marker, stage.display_name());
    }
    out
}

pub fn render_pipeline_summary(state: &PipelineState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{} {} [{}]",
        style("Impact assessment").bold(),
        style(state.session_id.as_deref().unwrap_or("-")).cyan(),
        pipeline_status_style(state.status),
    );
    if let Some(epic) = &state.jira_epic_id {
        let _ = writeln!(out, "  Epic: {}", epic);
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "  {} {}", style("✗").red(), style(error).red());
    }
    out.push_str(&render_stage_checklist(&state.stages));

    if !state.historical_matches.is_empty() {
        let _ = writeln!(out, "\n{}", style("Historical matches").cyan().bold());
        for m in state.historical_matches.iter().take(MAX_LISTED) {
            let _ = writeln!(
                out,
                "  {:>5.1}%  {} {}",
                m.match_score * 100.0,
                style(&m.epic_name).white().bold(),
                style(format!("({})", m.epic_id)).dim(),
            );
        }
        if state.historical_matches.len() > MAX_LISTED {
            let _ = writeln!(out, "  {} more", state.historical_matches.len() - MAX_LISTED);
        }
    }

    if let Some(modules) = &state.impacted_modules {
        let _ = writeln!(out, "\n{} ({})", style("Impacted modules").cyan().bold(), modules.total_modules);
        for module in modules.functional_modules.iter().chain(&modules.technical_modules) {
            let _ = writeln!(out, "  [{}] {}", level_style(module.impact), module.name);
        }
    }

    if let Some(effort) = &state.estimation_effort {
        let _ = writeln!(out, "\n{}", style("Estimation").cyan().bold());
        let _ = writeln!(
            out,
            "  Total {} (dev {}, QA {}) | {} story points | confidence {}",
            style(format_hours(effort.total_hours)).white().bold(),
            format_hours(effort.total_dev_hours),
            format_hours(effort.total_qa_hours),
            effort.story_points,
            level_style(effort.confidence),
        );
    }

    if let Some(tdd) = &state.design_doc {
        let _ = writeln!(out, "\n{}", style("Technical design").cyan().bold());
        let _ = writeln!(out, "  {}", style(&tdd.tdd_name).white().bold());
        if !tdd.architecture_pattern.is_empty() {
            let _ = writeln!(out, "  Pattern: {}", tdd.architecture_pattern);
        }
        if let Some(path) = &tdd.markdown_file_path {
            let _ = writeln!(out, "  File: {}", style(path).dim());
        }
    }

    if let Some(stories) = &state.stories {
        let _ = writeln!(
            out,
            "\n{} ({} stories, {} points)",
            style("Jira stories").cyan().bold(),
            stories.story_count,
            stories.total_story_points,
        );
        for story in stories.stories.iter().take(MAX_LISTED) {
            let _ = writeln!(out, "  [{}] {} ({} pts)", level_style(story.priority), story.title, story.story_points);
        }
    }

    if let Some(code) = &state.code_impact {
        let _ = writeln!(
            out,
            "\n{} {} files, ~{} lines across {} repositories",
            style("Code impact:").cyan().bold(),
            code.total_files,
            code.total_estimated_lines,
            code.repositories_affected.len(),
        );
    }

    if let Some(risks) = &state.risks {
        let _ = writeln!(
            out,
            "\n{} {} total, {} high severity",
            style("Risks:").cyan().bold(),
            risks.total_risks,
            risks.high_severity_count,
        );
        for risk in risks.risks.iter().take(MAX_LISTED) {
            let _ = writeln!(out, "  [{}] {}", level_style(risk.severity), risk.title);
        }
    }
    out
}

pub fn render_sdlc_health(base_url: &str, health: &HealthResponse) -> String {
    format!(
        "{} {} {} (version {}, ollama {})",
        style("SDLC backend").bold(),
        style(base_url).dim(),
        style(&health.status).green(),
        health.version,
        health.ollama,
    )
}

pub fn render_doc_health(base_url: &str, health: &DocHealthResponse) -> String {
    let disk = health
        .disk_space_mb
        .map(|mb| format!(", {:.0} MB free", mb))
        .unwrap_or_default();
    format!(
        "{} {} {} (version {}, ollama {}{})",
        style("Document pipeline").bold(),
        style(base_url).dim(),
        style(&health.status).green(),
        health.version,
        health.ollama_status,
        disk,
    )
}

fn step_marker(status: StepStatus) -> StyledObject<&'static str> {
    match status {
        StepStatus::Completed => style("✓").green(),
        StepStatus::Active => style("▶").cyan().bold(),
        StepStatus::Error => style("✗").red().bold(),
        StepStatus::Pending => style("○").dim(),
    }
}

/// `✓ Upload  ▶ Extract  ○ Map ...` for a job, or the initial view when
/// there is none.
pub fn render_step_indicators(job: Option<&PipelineJob>) -> String {
    PIPELINE_STEPS
        .iter()
        .map(|def| {
            let status = match job {
                Some(job) => step_status_for_job(job, def.step),
                None => step_status(JobStatus::Created, def.step),
            };
            format!("{} {}", step_marker(status), def.label)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn render_job(job: &PipelineJob) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} [{}]",
        style("Job").bold(),
        style(&job.job_id).cyan(),
        job_status_style(job.status),
    );
    let _ = writeln!(out, "  {}", render_step_indicators(Some(job)));
    if let Some(error) = &job.error_message {
        let _ = writeln!(out, "  {} {}", style("✗").red(), style(error).red());
    }
    for file in &job.files_uploaded {
        let _ = writeln!(
            out,
            "  {} {} ({}, {})",
            style("•").dim(),
            file.filename,
            file.document_type,
            format_file_size(file.file_size),
        );
    }
    for warning in &job.warnings {
        let _ = writeln!(out, "  {} {}", style("⚠").yellow(), warning);
    }
    out
}

pub fn render_job_list(list: &JobListResponse) -> String {
    if list.jobs.is_empty() {
        return "No jobs".to_string();
    }
    let mut out = String::new();
    for job in &list.jobs {
        let _ = writeln!(
            out,
            "  {:<38} {:<14} {:>3} files  {}",
            job.job_id,
            job_status_style(job.status).to_string(),
            job.files_count,
            style(&job.created_at).dim(),
        );
    }
    let _ = write!(out, "  {} of {} jobs", list.jobs.len(), list.total_count);
    out
}

fn sorted<'a, V>(map: &'a HashMap<String, V>) -> Vec<(&'a String, &'a V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

pub fn render_extraction(results: &HashMap<String, ExtractionResult>) -> String {
    let mut out = String::new();
    for (file, result) in sorted(results) {
        let _ = writeln!(
            out,
            "  {} [{}] {} fields, {} tables, {:.0}% confidence",
            style(file).white().bold(),
            result.document_type,
            result.fields_count,
            result.tables_count,
            result.confidence * 100.0,
        );
        if let Some(error) = &result.error {
            let _ = writeln!(out, "    {} {}", style("✗").red(), error);
        }
        for warning in &result.warnings {
            let _ = writeln!(out, "    {} {}", style("⚠").yellow(), warning);
        }
    }
    out
}

pub fn render_suggestions(entity: EntityType, suggestions: &[MappingSuggestion]) -> String {
    let mut out = format!("{} mapping suggestions for {}\n", suggestions.len(), style(entity).cyan());
    for s in suggestions {
        let _ = writeln!(
            out,
            "  {} → {} ({:.0}%)",
            s.source_field,
            style(&s.target_field).white().bold(),
            s.confidence * 100.0,
        );
    }
    out
}

pub fn render_transform(response: &TransformResponse) -> String {
    let mut out = format!("{}\n", response.message);
    for (entity, count) in sorted(&response.records_created) {
        let _ = writeln!(out, "  {:<12} {} records", entity, count);
    }
    for warning in &response.validation_warnings {
        let _ = writeln!(out, "  {} {}", style("⚠").yellow(), warning);
    }
    out
}

pub fn render_preview(rows: &[Map<String, Value>]) -> String {
    if rows.is_empty() {
        return "No rows".to_string();
    }
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let fields: Vec<String> = row
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect();
        let _ = writeln!(out, "  {:>3}  {}", i + 1, fields.join("  "));
    }
    out
}

pub fn render_validation(response: &ValidationResponse) -> String {
    let mut out = if response.valid {
        format!("{}\n", style("✓ Data is valid").green().bold())
    } else {
        format!("{}\n", style("✗ Validation failed").red().bold())
    };
    for issue in &response.errors {
        let _ = writeln!(out, "  {} {} row {} {}: {}", style("✗").red(), issue.entity, issue.row, issue.field, issue.message);
    }
    for issue in &response.warnings {
        let _ = writeln!(out, "  {} {} row {} {}: {}", style("⚠").yellow(), issue.entity, issue.row, issue.field, issue.message);
    }
    out
}

pub fn render_export(response: &ExportResponse) -> String {
    let mut out = format!(
        "Exported {} records to {}\n",
        response.total_records,
        style(&response.export_path).dim(),
    );
    for file in &response.files_exported {
        let _ = writeln!(out, "  {:<12} {:>6} records  {}", file.entity, file.record_count, style(&file.file_path).dim());
    }
    out
}

pub fn render_sync(response: &SyncResponse) -> String {
    let mut out = format!("{}\n", response.message);
    for file in &response.synced_files {
        let _ = writeln!(out, "  {:<12} +{} records  {}", file.entity, file.new_records, style(&file.target_path).dim());
    }
    if !response.next_step.is_empty() {
        let _ = writeln!(out, "  Next: {}", response.next_step);
    }
    out
}
