use serde::{Deserialize, Serialize};

/// Backend milestone for an assessment session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    RequirementSubmitted,
    MatchesFound,
    MatchesSelected,
    ImpactedModulesGenerated,
    EstimationEffortCompleted,
    TddGenerated,
    JiraStoriesGenerated,
    CodeImpactGenerated,
    RisksGenerated,
    Completed,
    Error,
}

/// Forward order of every non-error status. Progress display, stage
/// completion and navigation gating all read positions from this table.
pub static STATUS_ORDER: &[PipelineStatus] = &[
    PipelineStatus::Created,
    PipelineStatus::RequirementSubmitted,
    PipelineStatus::MatchesFound,
    PipelineStatus::MatchesSelected,
    PipelineStatus::ImpactedModulesGenerated,
    PipelineStatus::EstimationEffortCompleted,
    PipelineStatus::TddGenerated,
    PipelineStatus::JiraStoriesGenerated,
    PipelineStatus::CodeImpactGenerated,
    PipelineStatus::RisksGenerated,
    PipelineStatus::Completed,
];

impl PipelineStatus {
    /// Position in [`STATUS_ORDER`]; `None` for `Error`.
    pub fn rank(&self) -> Option<usize> {
        STATUS_ORDER.iter().position(|s| s == self)
    }

    /// Whether moving from `self` to `next` keeps the forward-only invariant.
    pub fn allows_transition_to(&self, next: PipelineStatus) -> bool {
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(current), Some(incoming)) => incoming >= current,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::RequirementSubmitted => "requirement_submitted",
            Self::MatchesFound => "matches_found",
            Self::MatchesSelected => "matches_selected",
            Self::ImpactedModulesGenerated => "impacted_modules_generated",
            Self::EstimationEffortCompleted => "estimation_effort_completed",
            Self::TddGenerated => "tdd_generated",
            Self::JiraStoriesGenerated => "jira_stories_generated",
            Self::CodeImpactGenerated => "code_impact_generated",
            Self::RisksGenerated => "risks_generated",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible result stages of an assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    HistoricalMatches,
    EstimationSheet,
    TddGeneration,
    JiraStories,
}

pub static STAGES: &[Stage] = &[
    Stage::HistoricalMatches,
    Stage::EstimationSheet,
    Stage::TddGeneration,
    Stage::JiraStories,
];

impl Stage {
    /// The status at which this stage's output exists.
    pub fn milestone(&self) -> PipelineStatus {
        match self {
            Self::HistoricalMatches => PipelineStatus::MatchesFound,
            Self::EstimationSheet => PipelineStatus::EstimationEffortCompleted,
            Self::TddGeneration => PipelineStatus::TddGenerated,
            Self::JiraStories => PipelineStatus::JiraStoriesGenerated,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HistoricalMatches => "Historical Matches",
            Self::EstimationSheet => "Estimation Sheet",
            Self::TddGeneration => "TDD Generation",
            Self::JiraStories => "Jira Stories",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Total over every status, including `Error` and "no run yet" (`None`),
/// both of which complete nothing.
pub fn is_stage_complete(status: Option<PipelineStatus>, stage: Stage) -> bool {
    match (status.and_then(|s| s.rank()), stage.milestone().rank()) {
        (Some(current), Some(milestone)) => current >= milestone,
        _ => false,
    }
}

/// A stage page may be opened once the run has reached it.
pub fn can_open_stage(completion: &StageCompletion, stage: Stage) -> bool {
    completion.get(stage)
}

/// Progress implied by the status alone, for views that are not streaming.
pub fn status_progress_percent(status: Option<PipelineStatus>) -> u8 {
    let Some(rank) = status.and_then(|s| s.rank()) else {
        return 0;
    };
    let last = STATUS_ORDER.len() - 1;
    ((rank * 100) / last) as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCompletion {
    pub historical_matches: bool,
    pub estimation_sheet: bool,
    pub tdd_generation: bool,
    pub jira_stories: bool,
}

impl StageCompletion {
    pub fn from_status(status: Option<PipelineStatus>) -> Self {
        Self {
            historical_matches: is_stage_complete(status, Stage::HistoricalMatches),
            estimation_sheet: is_stage_complete(status, Stage::EstimationSheet),
            tdd_generation: is_stage_complete(status, Stage::TddGeneration),
            jira_stories: is_stage_complete(status, Stage::JiraStories),
        }
    }

    /// Mark every stage `status` has reached. Flags are never cleared, so
    /// a later `error` keeps what the run already produced.
    pub fn absorb(&mut self, status: Option<PipelineStatus>) {
        let reached = Self::from_status(status);
        self.historical_matches |= reached.historical_matches;
        self.estimation_sheet |= reached.estimation_sheet;
        self.tdd_generation |= reached.tdd_generation;
        self.jira_stories |= reached.jira_stories;
    }

    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::HistoricalMatches => self.historical_matches,
            Stage::EstimationSheet => self.estimation_sheet,
            Stage::TddGeneration => self.tdd_generation,
            Stage::JiraStories => self.jira_stories,
        }
    }
}
