pub mod analysis;
pub mod cli;
pub mod config;
pub mod events;
pub mod llm;
pub mod narration;
pub mod pipeline;
pub mod service;
pub mod story;
pub mod system;
pub mod testing;

use anyhow::Context;
use cli::{Cli, Commands};
use narration::local::{CommandEngine, LocalSpeechEngine};
use narration::ssml::{self, DialogueVoices};
use pipeline::StoryPipeline;
use service::ServiceStatus;
use std::io::Read;
use std::path::Path;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    setup_tracing(cli.verbose);
    load_dotenv();

    match cli.command {
        Some(Commands::Check(args)) => check(args),
        Some(Commands::Voices(args)) => voices(args),
        Some(Commands::Ssml(args)) => ssml_cmd(args),
        Some(Commands::Config(args)) => config_cmd(args),
        None => {
            let problem = cli
                .problem
                .context("a problem description is required")?;
            tell(&problem, cli.output_dir, cli.json, cli.check_story)
        }
    }
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "could not load .env; using process environment"),
    }
}

fn tell(
    problem: &str,
    output_dir: Option<std::path::PathBuf>,
    json: bool,
    check_story: bool,
) -> anyhow::Result<()> {
    let problem = problem.trim();
    if problem.is_empty() {
        anyhow::bail!("the problem description is empty");
    }

    let mut config = config::Config::load().context("load config")?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    config.validate().context("invalid configuration")?;

    tracing::info!(%problem, "starting story");
    let mut pipeline = StoryPipeline::from_config(&config);
    let summary = pipeline.run(problem)?;

    if check_story {
        for issue in story::validate_story(&summary.narrative.text) {
            tracing::warn!(%issue, "story quality check");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.artifact.path.display());
    }
    Ok(())
}

fn check(args: cli::CheckArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let info = system::detect(&config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("OS: {} ({})", info.os, info.arch);
    for service in &info.services {
        let status = if service.configured { "configured" } else { "not configured" };
        match &service.detail {
            Some(detail) => println!("- {}: {} ({})", service.name, status, detail),
            None => println!("- {}: {}", service.name, status),
        }
    }
    println!("Output dir: {}", info.output_dir.display());
    if !info.fully_configured() {
        println!("Missing services fall back to local templates, local speech or a text file.");
    }
    Ok(())
}

fn voices(args: cli::VoicesArgs) -> anyhow::Result<()> {
    let config = config::Config::load().context("load config")?;
    let local = match CommandEngine::probe(&config.local_voice.program) {
        ServiceStatus::Available(engine) => engine.voices().unwrap_or_else(|err| {
            tracing::warn!(error = ?err, "could not list local voices");
            Vec::new()
        }),
        ServiceStatus::Unconfigured { reason } => {
            tracing::info!(%reason, "local speech engine unavailable");
            Vec::new()
        }
    };

    if args.json {
        let remote: Vec<_> = narration::remote::RECOMMENDED_VOICES
            .iter()
            .map(|(name, description)| serde_json::json!({"name": name, "description": description}))
            .collect();
        let out = serde_json::json!({"remote": remote, "local": local});
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Remote voices (current: {}):", config.speech.voice);
    for (name, description) in narration::remote::RECOMMENDED_VOICES {
        println!("- {name}: {description}");
    }
    println!("Local voices ({}):", config.local_voice.program);
    for voice in local {
        let gender = voice.gender.as_deref().unwrap_or("?");
        println!("- {} [{}] {}", voice.id, gender, voice.name);
    }
    Ok(())
}

fn ssml_cmd(args: cli::SsmlArgs) -> anyhow::Result<()> {
    let text = read_input(&args.input)?;
    let config = config::Config::load().context("load config")?;
    let voices = DialogueVoices {
        male: config.speech.male_voice,
        female: config.speech.female_voice,
        narrator: config.speech.voice,
    };
    println!("{}", ssml::build_dialogue_ssml(&text, &voices));
    Ok(())
}

fn config_cmd(args: cli::ConfigArgs) -> anyhow::Result<()> {
    if args.init {
        let path = config::Config::init_default()?;
        println!("Initialized config at {}", path.display());
        return Ok(());
    }

    if args.show {
        let config = config::Config::load()?;
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    if args.validate {
        let config = config::Config::load()?;
        config.validate()?;
        println!("Config OK");
        return Ok(());
    }

    let path = config::Config::default_path()?;
    println!("{}", path.display());
    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("read narrative from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
