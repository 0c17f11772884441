use std::time::{Duration, Instant};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use crate::pipeline::agents::{display_name, AGENTS};
use crate::pipeline::{PipelineSnapshot, PipelineStatus};
use super::report::format_duration;

/// Live progress for one streaming run, driven by store snapshots.
pub struct RunProgress {
    multi: MultiProgress,
    bar: ProgressBar,
    status_bar: ProgressBar,
    announced: usize,
    start_time: Instant,
}

impl RunProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30.cyan/dark_gray} {pos:>3}% | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message("Waiting for backend...");

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            bar,
            status_bar,
            announced: 0,
            start_time: Instant::now(),
        }
    }

    /// Apply the latest snapshot. Newly completed agents are printed above
    /// the bars.
    pub fn update(&mut self, snapshot: &PipelineSnapshot) {
        let streaming = &snapshot.streaming;
        for name in streaming.completed_agent_names.iter().skip(self.announced) {
            self.println(&format!("  {} {}", style("✓").green(), style(display_name(name)).green()));
        }
        self.announced = self.announced.max(streaming.completed_agent_names.len());

        self.bar.set_position(u64::from(snapshot.display_progress()));
        match &streaming.current_agent_name {
            Some(name) => self.bar.set_message(display_name(name).to_string()),
            None if streaming.is_streaming => self.bar.set_message("Finishing up..."),
            None => {}
        }

        let status = snapshot
            .pipeline
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "pending".to_string());
        self.status_bar.set_message(format!(
            "{} | {} | {}/{} agents",
            format_duration(self.start_time.elapsed().as_millis() as u64),
            status,
            streaming.completed_agent_names.len(),
            AGENTS.len(),
        ));
    }

    /// Close the bars with a final line matching how the run ended.
    pub fn finish(self, snapshot: &PipelineSnapshot) {
        let elapsed = format_duration(self.start_time.elapsed().as_millis() as u64);
        match (snapshot.pipeline.status, &snapshot.pipeline.error) {
            (Some(PipelineStatus::Error), error) => {
                self.bar.abandon_with_message("Failed");
                self.status_bar.finish_with_message(format!(
                    "{} {}",
                    style("Pipeline failed:").red().bold(),
                    error.as_deref().unwrap_or("unknown error"),
                ));
            }
            _ if snapshot.pipeline.is_running => {
                self.bar.abandon_with_message("Cancelled");
                self.status_bar.finish_with_message(format!("Cancelled after {}", elapsed));
            }
            _ => {
                self.bar.finish_with_message("All agents complete");
                self.status_bar.finish_with_message(format!(
                    "{} {}",
                    style("✓ Assessment complete in").green().bold(),
                    elapsed,
                ));
            }
        }
    }

    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}
