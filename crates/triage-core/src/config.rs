//! Service configuration file.
//!
//! Every section is optional; an absent file yields the built-in lab inventory
//! and catalog with the rule-based classifier and simulated runner.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::command_catalog::{validate_command_catalog, CommandCatalog};
use crate::inventory::{validate_inventory, Inventory};
use crate::rbac::{validate_rbac_policy, RbacPolicy};

pub const TRIAGE_CONFIG_SCHEMA_VERSION: u32 = 1;
pub const REASONING_MODE_OLLAMA: &str = "ollama";
pub const REASONING_MODE_RULES: &str = "rules";
pub const RUNNER_MODE_SSH: &str = "ssh";
pub const RUNNER_MODE_SIMULATED: &str = "simulated";

fn triage_config_schema_version() -> u32 {
    TRIAGE_CONFIG_SCHEMA_VERSION
}

fn default_reasoning_mode() -> String {
    REASONING_MODE_RULES.to_string()
}

fn default_reasoning_api_base() -> String {
    "http://localhost:11434".to_string()
}

fn default_reasoning_model() -> String {
    "mistral".to_string()
}

fn default_reasoning_request_timeout_ms() -> u64 {
    60_000
}

fn default_runner_mode() -> String {
    RUNNER_MODE_SIMULATED.to_string()
}

fn default_runner_command_timeout_ms() -> u64 {
    30_000
}

fn default_runner_connect_timeout_secs() -> u64 {
    10
}

fn default_runner_ssh_user() -> String {
    "vagrant".to_string()
}

fn default_runner_max_output_bytes() -> usize {
    16_000
}

fn default_runner_ssh_program() -> String {
    "ssh".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_mode")]
    pub mode: String,
    #[serde(default = "default_reasoning_api_base")]
    pub api_base: String,
    #[serde(default = "default_reasoning_model")]
    pub model: String,
    #[serde(default = "default_reasoning_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            mode: default_reasoning_mode(),
            api_base: default_reasoning_api_base(),
            model: default_reasoning_model(),
            request_timeout_ms: default_reasoning_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    #[serde(default = "default_runner_mode")]
    pub mode: String,
    #[serde(default = "default_runner_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_runner_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_runner_ssh_user")]
    pub default_user: String,
    /// Vagrant project `.vagrant` directory used to discover private keys.
    #[serde(default)]
    pub vagrant_dir: Option<PathBuf>,
    #[serde(default = "default_runner_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_runner_ssh_program")]
    pub ssh_program: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: default_runner_mode(),
            command_timeout_ms: default_runner_command_timeout_ms(),
            connect_timeout_secs: default_runner_connect_timeout_secs(),
            default_user: default_runner_ssh_user(),
            vagrant_dir: None,
            max_output_bytes: default_runner_max_output_bytes(),
            ssh_program: default_runner_ssh_program(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriageConfig {
    #[serde(default = "triage_config_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub catalog: CommandCatalog,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub rbac: RbacPolicy,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            schema_version: TRIAGE_CONFIG_SCHEMA_VERSION,
            inventory: Inventory::default(),
            catalog: CommandCatalog::default(),
            reasoning: ReasoningConfig::default(),
            runner: RunnerConfig::default(),
            rbac: RbacPolicy::default(),
        }
    }
}

pub fn validate_triage_config(config: &TriageConfig) -> Result<()> {
    if config.schema_version != TRIAGE_CONFIG_SCHEMA_VERSION {
        bail!(
            "unsupported triage config schema version {} (expected {})",
            config.schema_version,
            TRIAGE_CONFIG_SCHEMA_VERSION
        );
    }
    validate_inventory(&config.inventory)?;
    validate_command_catalog(&config.catalog)?;
    validate_rbac_policy(&config.rbac)?;

    for (server, spec) in config.inventory.iter() {
        for service in &spec.services {
            if config.catalog.service(service).is_none() {
                bail!("inventory server '{server}' hosts service '{service}' missing from the command catalog");
            }
        }
    }

    match config.reasoning.mode.as_str() {
        REASONING_MODE_OLLAMA | REASONING_MODE_RULES => {}
        other => bail!("unsupported reasoning mode '{other}' (supported: ollama, rules)"),
    }
    if config.reasoning.mode == REASONING_MODE_OLLAMA {
        let api_base = config.reasoning.api_base.trim();
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            bail!("reasoning api_base must be an http(s) URL");
        }
        if config.reasoning.model.trim().is_empty() {
            bail!("reasoning model cannot be empty");
        }
    }
    if config.reasoning.request_timeout_ms == 0 {
        bail!("reasoning request_timeout_ms must be greater than 0");
    }

    match config.runner.mode.as_str() {
        RUNNER_MODE_SSH | RUNNER_MODE_SIMULATED => {}
        other => bail!("unsupported runner mode '{other}' (supported: ssh, simulated)"),
    }
    if config.runner.command_timeout_ms == 0 {
        bail!("runner command_timeout_ms must be greater than 0");
    }
    if config.runner.max_output_bytes == 0 {
        bail!("runner max_output_bytes must be greater than 0");
    }
    Ok(())
}

/// Loads and validates the config at `path`, or the built-in defaults when `None`.
pub fn load_triage_config(path: Option<&Path>) -> Result<TriageConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<TriageConfig>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => TriageConfig::default(),
    };
    validate_triage_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_default_config_is_valid() {
        let config = load_triage_config(None).expect("defaults");
        assert_eq!(config.runner.mode, RUNNER_MODE_SIMULATED);
        assert_eq!(config.reasoning.mode, REASONING_MODE_RULES);
        assert_eq!(config.inventory.len(), 5);
    }

    #[test]
    fn functional_partial_config_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("triage.json");
        std::fs::write(
            &path,
            r#"{
  "schema_version": 1,
  "reasoning": { "mode": "ollama", "model": "llama3" },
  "runner": { "command_timeout_ms": 500 }
}"#,
        )
        .expect("write config");
        let config = load_triage_config(Some(&path)).expect("load");
        assert_eq!(config.reasoning.model, "llama3");
        assert_eq!(config.reasoning.api_base, "http://localhost:11434");
        assert_eq!(config.runner.command_timeout_ms, 500);
        assert_eq!(config.runner.mode, RUNNER_MODE_SIMULATED);
    }

    #[test]
    fn unit_rejects_service_missing_from_catalog() {
        let mut config = TriageConfig::default();
        config.catalog.services.remove("tomcat");
        let error = validate_triage_config(&config).expect_err("missing service");
        assert!(error.to_string().contains("'tomcat' missing from the command catalog"));
    }

    #[test]
    fn unit_rejects_unknown_runner_mode() {
        let mut config = TriageConfig::default();
        config.runner.mode = "telnet".to_string();
        let error = validate_triage_config(&config).expect_err("bad mode");
        assert!(error.to_string().contains("unsupported runner mode 'telnet'"));
    }
}
