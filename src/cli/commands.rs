use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};
use impactlens::docpipe::EntityType;

#[derive(Parser)]
#[command(name = "impactlens", version, about = "Requirement impact assessment and document pipeline client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SDLC backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub sdlc_url: Option<String>,

    /// Document pipeline base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub pipeline_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an impact assessment for a requirement
    Run(RunArgs),
    /// Show a previously completed session
    Summary(SummaryArgs),
    /// Check both backends
    Health,
    /// Print the backend's sample requirement
    Sample,
    /// Drive the document transformation pipeline
    Docs(DocsArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Requirement text
    #[arg(conflicts_with_all = ["file", "sample"], required_unless_present_any = ["file", "sample"])]
    pub text: Option<String>,

    /// Read the requirement from a file
    #[arg(short, long, conflicts_with = "sample")]
    pub file: Option<PathBuf>,

    /// Use the backend's sample requirement
    #[arg(long)]
    pub sample: bool,

    /// Jira epic to attach
    #[arg(long)]
    pub epic: Option<String>,

    /// Historical match to use (repeatable); omit to let the backend choose
    #[arg(long = "match", value_name = "MATCH_ID")]
    pub matches: Vec<String>,

    /// Wait for the full response instead of streaming progress
    #[arg(long)]
    pub no_stream: bool,

    /// Output the final state as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct SummaryArgs {
    /// Session ID
    pub session_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct DocsArgs {
    #[command(subcommand)]
    pub command: DocsCommand,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Clone)]
pub enum DocsCommand {
    /// Upload source documents and create a job
    Upload(UploadArgs),
    /// Show a job and its step indicators
    Status(JobArg),
    /// List jobs
    List {
        #[arg(long, default_value = "50")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Extract structured data from uploaded documents
    Extract {
        job_id: String,
        /// Enhance extraction with the LLM
        #[arg(long)]
        llm: bool,
        /// Minimum LLM confidence to accept a field
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Show suggested field mappings for an entity
    Suggest { job_id: String, entity: EntityType },
    /// Apply a field mapping read from a JSON object file
    Map {
        job_id: String,
        entity: EntityType,
        mapping: PathBuf,
    },
    /// Transform mapped data into entity records
    Transform(JobArg),
    /// Show transformed rows for an entity
    Preview {
        job_id: String,
        entity: EntityType,
        #[arg(long, default_value = "10")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Validate transformed data
    Validate(JobArg),
    /// Export CSV files
    Export(JobArg),
    /// Download one entity's CSV
    Download {
        job_id: String,
        entity: EntityType,
        /// Target directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Append exported records to the vector database
    Sync(JobArg),
    /// Poll a job until the backend is idle
    Watch(JobArg),
}

#[derive(Args, Clone)]
pub struct JobArg {
    pub job_id: String,
}

#[derive(Args, Clone)]
pub struct UploadArgs {
    /// Files to classify by name and extension
    pub files: Vec<PathBuf>,

    /// Epic / requirements document (.docx)
    #[arg(long)]
    pub epic: Option<PathBuf>,

    /// Estimation spreadsheet (.xlsx, .xls)
    #[arg(long)]
    pub estimation: Option<PathBuf>,

    /// Technical design document (.docx)
    #[arg(long)]
    pub tdd: Option<PathBuf>,

    /// User stories document (.docx)
    #[arg(long)]
    pub stories: Option<PathBuf>,
}
