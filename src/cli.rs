use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "storyteller",
    version,
    about = "Turns a child's behavioral problem into a narrated fairy tale",
    args_conflicts_with_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(value_name = "PROBLEM", help = "Description of the child's behavioral problem")]
    pub problem: Option<String>,

    #[arg(long, value_name = "DIR", help = "Directory for the generated story (default: ./output)")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Print the run summary as JSON")]
    pub json: bool,

    #[arg(long, help = "Warn when the story fails the length and wording check")]
    pub check_story: bool,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report which services are configured
    Check(CheckArgs),
    /// List remote and local voices
    Voices(VoicesArgs),
    /// Print two-voice speech markup for a Man:/Woman: narrative
    Ssml(SsmlArgs),
    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct VoicesArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SsmlArgs {
    #[arg(value_name = "FILE", help = "Narrative file, or - for stdin")]
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, help = "Show current config as JSON (secrets redacted)")]
    pub show: bool,

    #[arg(long, help = "Create default config file")]
    pub init: bool,

    #[arg(long, help = "Validate configuration")]
    pub validate: bool,
}
