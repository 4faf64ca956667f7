use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;
use crate::llm::AzureOpenAiClient;
use crate::narration::local::CommandEngine;
use crate::narration::remote::AzureSpeechClient;
use crate::service::ServiceStatus;

#[derive(Debug, Serialize)]
pub struct ServiceCheck {
    pub name: String,
    pub configured: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub services: Vec<ServiceCheck>,
    pub output_dir: PathBuf,
}

impl SystemInfo {
    pub fn fully_configured(&self) -> bool {
        self.services.iter().all(|service| service.configured)
    }
}

fn check<T>(name: &str, status: ServiceStatus<T>) -> ServiceCheck {
    match status {
        ServiceStatus::Available(_) => ServiceCheck {
            name: name.to_string(),
            configured: true,
            detail: None,
        },
        ServiceStatus::Unconfigured { reason } => ServiceCheck {
            name: name.to_string(),
            configured: false,
            detail: Some(reason),
        },
    }
}

/// Which collaborators a pipeline built from `config` would use.
pub fn detect(config: &Config) -> SystemInfo {
    let services = vec![
        check("text service", AzureOpenAiClient::from_config(&config.text)),
        check("speech service", AzureSpeechClient::from_config(&config.speech)),
        check(
            &format!("local speech engine ({})", config.local_voice.program),
            CommandEngine::probe(&config.local_voice.program),
        ),
    ];

    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        services,
        output_dir: config.output_dir.clone(),
    }
}
