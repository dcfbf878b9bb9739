use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use triage_agents::{
    CatalogResolver, Classifier, KeywordClassifier, KnowledgeResponder, LlmClassifier,
    OllamaConfig, OllamaEngine, PolicyValidator, ReasoningEngine,
};
use triage_core::config::{
    validate_triage_config, REASONING_MODE_OLLAMA, REASONING_MODE_RULES, RUNNER_MODE_SIMULATED,
    RUNNER_MODE_SSH,
};
use triage_core::{load_triage_config, AllowList, TriageConfig};
use triage_orchestrator::{Executor, InfrastructureQuery, Orchestrator, OrchestratorComponents};
use triage_remote::{
    CommandTransport, GuardedRunner, GuardedRunnerConfig, SimulatedTransport, SshTransport,
    SshTransportConfig,
};
use triage_store::{
    CommandAuditLog, FeedbackLog, LogRotation, TicketStore, COMMAND_AUDIT_FILE_NAME,
    FEEDBACK_FILE_NAME, TICKETS_FILE_NAME,
};

use crate::cli_args::Cli;

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Loads the configuration file and applies command-line overrides.
pub(crate) fn resolve_config(cli: &Cli) -> Result<TriageConfig> {
    let mut config = load_triage_config(cli.config.as_deref())?;
    if let Some(mode) = &cli.reasoning_mode {
        config.reasoning.mode = mode.clone();
    }
    if let Some(api_base) = &cli.ollama_url {
        config.reasoning.api_base = api_base.clone();
    }
    if let Some(mode) = &cli.runner_mode {
        config.runner.mode = mode.clone();
    }
    validate_triage_config(&config).context("configuration invalid after overrides")?;
    Ok(config)
}

/// The wired service plus the handles the binary needs directly.
pub(crate) struct TriageRuntime {
    pub(crate) orchestrator: Arc<Orchestrator>,
    pub(crate) feedback: FeedbackLog,
    pub(crate) state_dir: PathBuf,
}

fn build_engine(config: &TriageConfig) -> Result<Option<Arc<dyn ReasoningEngine>>> {
    match config.reasoning.mode.as_str() {
        REASONING_MODE_OLLAMA => {
            let engine = OllamaEngine::new(OllamaConfig::from(&config.reasoning))
                .context("failed to build reasoning engine client")?;
            Ok(Some(Arc::new(engine)))
        }
        REASONING_MODE_RULES => Ok(None),
        other => bail!("unsupported reasoning mode '{other}'"),
    }
}

fn build_transport(config: &TriageConfig) -> Result<Arc<dyn CommandTransport>> {
    match config.runner.mode.as_str() {
        RUNNER_MODE_SSH => Ok(Arc::new(SshTransport::new(SshTransportConfig::from(
            &config.runner,
        )))),
        RUNNER_MODE_SIMULATED => Ok(Arc::new(SimulatedTransport::new())),
        other => bail!("unsupported runner mode '{other}'"),
    }
}

pub(crate) fn build_runtime(config: &TriageConfig, state_dir: &Path) -> Result<TriageRuntime> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create {}", state_dir.display()))?;
    let rotation = LogRotation::from_env();

    let inventory = Arc::new(config.inventory.clone());
    let catalog = Arc::new(config.catalog.clone());
    let allow_list = Arc::new(AllowList::build(&inventory, &catalog));

    let audit = CommandAuditLog::new(state_dir.join(COMMAND_AUDIT_FILE_NAME), rotation);
    let runner = Arc::new(
        GuardedRunner::new(
            inventory.clone(),
            allow_list.clone(),
            build_transport(config)?,
            GuardedRunnerConfig {
                command_timeout: Duration::from_millis(config.runner.command_timeout_ms.max(1)),
                max_output_bytes: config.runner.max_output_bytes,
            },
        )
        .with_audit_sink(Arc::new(audit)),
    );

    let engine = build_engine(config)?;
    let classifier: Arc<dyn Classifier> = match &engine {
        Some(engine) => Arc::new(LlmClassifier::new(
            engine.clone(),
            inventory.clone(),
            catalog.clone(),
        )),
        None => Arc::new(KeywordClassifier::new(inventory.clone(), catalog.clone())),
    };
    let resolver = match &engine {
        Some(engine) => CatalogResolver::new(allow_list.clone()).with_engine(engine.clone()),
        None => CatalogResolver::new(allow_list.clone()),
    };

    let store = TicketStore::open(state_dir.join(TICKETS_FILE_NAME))?;
    tracing::info!(
        state_dir = %state_dir.display(),
        servers = inventory.len(),
        reasoning = %config.reasoning.mode,
        runner = %config.runner.mode,
        "triage runtime ready"
    );

    let orchestrator = Orchestrator::new(OrchestratorComponents {
        store: Arc::new(store),
        inventory: inventory.clone(),
        classifier,
        resolver: Arc::new(resolver),
        validator: Arc::new(PolicyValidator::new(inventory.clone(), allow_list.clone())),
        knowledge: KnowledgeResponder::new(engine),
        infrastructure: InfrastructureQuery::new(inventory, allow_list, runner.clone()),
        executor: Executor::new(runner),
        rbac: Arc::new(config.rbac.clone()),
    });
    Ok(TriageRuntime {
        orchestrator: Arc::new(orchestrator),
        feedback: FeedbackLog::new(state_dir.join(FEEDBACK_FILE_NAME), rotation),
        state_dir: state_dir.to_path_buf(),
    })
}
