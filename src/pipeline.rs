use serde::Serialize;
use std::sync::Arc;

use crate::analysis::{Analyzer, ProblemReport};
use crate::config::Config;
use crate::events::{Provenance, Stage, StageEvent};
use crate::llm::{AzureOpenAiClient, LlmError, TextGenerator};
use crate::narration::{remote, Artifact, NarrationError, Narrator};
use crate::service::ServiceStatus;
use crate::story::{Composer, NarrativeText};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("text analysis failed")]
    Analysis(#[source] LlmError),

    #[error("story generation failed")]
    Composition(#[source] LlmError),

    #[error("narration failed")]
    Narration(#[from] NarrationError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Analysis(_) => Stage::Analysis,
            PipelineError::Composition(_) => Stage::Composition,
            PipelineError::Narration(_) => Stage::Narration,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub artifact: Artifact,
    pub tier: String,
    pub report: ProblemReport,
    pub narrative: NarrativeText,
    pub events: Vec<StageEvent>,
}

/// Analyzer, then composer, then narrator. The first fatal error stops the
/// run.
pub struct StoryPipeline {
    analyzer: Analyzer,
    composer: Composer,
    narrator: Narrator,
}

impl StoryPipeline {
    pub fn new(analyzer: Analyzer, composer: Composer, narrator: Narrator) -> Self {
        Self {
            analyzer,
            composer,
            narrator,
        }
    }

    /// One text client is shared by the analyzer and the composer.
    pub fn from_config(config: &Config) -> Self {
        let client = AzureOpenAiClient::from_config(&config.text)
            .map(|client| Arc::new(client) as Arc<dyn TextGenerator>);
        let composer_client = match &client {
            ServiceStatus::Available(client) => ServiceStatus::Available(Arc::clone(client)),
            ServiceStatus::Unconfigured { reason } => ServiceStatus::unconfigured(reason.clone()),
        };

        Self::new(
            Analyzer::new(client, &config.text),
            Composer::new(composer_client, &config.text, &config.story),
            Narrator::from_config(config),
        )
    }

    pub fn run(&mut self, problem_description: &str) -> Result<RunSummary, PipelineError> {
        let mut events = Vec::with_capacity(3);

        tracing::info!("analyzing the problem");
        let analysis = self
            .analyzer
            .analyze(problem_description)
            .map_err(PipelineError::Analysis)?;
        let report = analysis.value;
        tracing::info!(problem_type = %report.problem_type, moral = %report.moral, "analysis complete");
        events.push(StageEvent::new(
            Stage::Analysis,
            analysis.provenance,
            report.problem_type.clone(),
        ));

        tracing::info!("composing the story");
        let composition = self
            .composer
            .compose(&report)
            .map_err(PipelineError::Composition)?;
        let narrative = composition.value;
        let detail = match narrative.template {
            Some(template) => format!("template {template:?}").to_lowercase(),
            None => format!("{} characters", narrative.text.chars().count()),
        };
        tracing::info!(%detail, "story ready");
        events.push(StageEvent::new(Stage::Composition, composition.provenance, detail));

        tracing::info!("narrating the story");
        let narration = self.narrator.narrate(&narrative.text, None)?;
        let provenance = if narration.tier == remote::TIER_NAME {
            Provenance::Remote
        } else {
            Provenance::Fallback
        };
        events.push(StageEvent::new(Stage::Narration, provenance, narration.tier.clone()));

        Ok(RunSummary {
            artifact: narration.artifact,
            tier: narration.tier,
            report,
            narrative,
            events,
        })
    }
}
