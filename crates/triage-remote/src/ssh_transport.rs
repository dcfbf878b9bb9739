use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use triage_core::{CommandFailureKind, CommandOutcome, RunnerConfig, ServerSpec};

use crate::output::combine_streams;
use crate::CommandTransport;

const SSH_TRANSPORT_FAILURE_EXIT_CODE: i32 = 255;
const VAGRANT_PRIVATE_KEY_FILE: &str = "private_key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTransportConfig {
    pub program: String,
    pub default_user: String,
    pub connect_timeout_secs: u64,
    pub vagrant_dir: Option<PathBuf>,
}

impl From<&RunnerConfig> for SshTransportConfig {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            program: config.ssh_program.clone(),
            default_user: config.default_user.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
            vagrant_dir: config.vagrant_dir.clone(),
        }
    }
}

/// Runs commands through the system `ssh` client in batch mode.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshTransportConfig,
}

fn sorted_dir_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    paths.sort();
    paths
}

fn first_key_under(machine_dir: &Path) -> Option<PathBuf> {
    sorted_dir_entries(machine_dir)
        .into_iter()
        .filter(|provider| provider.is_dir())
        .map(|provider| provider.join(VAGRANT_PRIVATE_KEY_FILE))
        .find(|candidate| candidate.is_file())
}

/// Finds `machines/<server>/<provider>/private_key` under a `.vagrant` directory,
/// falling back to any machine's key.
pub fn discover_vagrant_private_key(vagrant_dir: &Path, server: &str) -> Option<PathBuf> {
    let machines = vagrant_dir.join("machines");
    if let Some(key) = first_key_under(&machines.join(server)) {
        return Some(key);
    }
    let fallback = sorted_dir_entries(&machines)
        .into_iter()
        .filter(|machine| machine.is_dir())
        .find_map(|machine| first_key_under(&machine));
    if let Some(key) = &fallback {
        tracing::warn!(server, key = %key.display(), "using another machine's vagrant key");
    }
    fallback
}

impl SshTransport {
    pub fn new(config: SshTransportConfig) -> Self {
        Self { config }
    }

    fn identity_file(&self, server: &str, spec: &ServerSpec) -> Option<PathBuf> {
        spec.identity_file.clone().or_else(|| {
            self.config
                .vagrant_dir
                .as_deref()
                .and_then(|dir| discover_vagrant_private_key(dir, server))
        })
    }

    /// Arguments passed to the ssh program, ending with the remote command.
    pub fn ssh_arguments(&self, server: &str, spec: &ServerSpec, command: &str) -> Vec<String> {
        let user = spec
            .ssh_user
            .as_deref()
            .unwrap_or(self.config.default_user.as_str());
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs.max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            spec.ssh_port.to_string(),
        ];
        if let Some(identity) = self.identity_file(server, spec) {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        args.push(format!("{user}@{}", spec.ip));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl CommandTransport for SshTransport {
    async fn dispatch(&self, server: &str, spec: &ServerSpec, command: &str) -> CommandOutcome {
        let mut builder = Command::new(&self.config.program);
        builder
            .args(self.ssh_arguments(server, spec, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match builder.output().await {
            Ok(output) => output,
            Err(error) => {
                return CommandOutcome::failed(
                    command,
                    CommandFailureKind::Transport,
                    format!("failed to start {}: {error}", self.config.program),
                );
            }
        };

        let text = combine_streams(&output.stdout, &output.stderr);
        let exit_code = output.status.code();
        if output.status.success() {
            return CommandOutcome::succeeded(command, text);
        }
        let kind = if exit_code == Some(SSH_TRANSPORT_FAILURE_EXIT_CODE) {
            CommandFailureKind::Transport
        } else {
            CommandFailureKind::NonZeroExit
        };
        let text = if text.trim().is_empty() {
            format!("command exited with status {exit_code:?} on {server} ({})", spec.ip)
        } else {
            text
        };
        CommandOutcome::failed(command, kind, text).with_exit_code(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ServerSpec {
        ServerSpec {
            ip: "192.168.56.11".to_string(),
            os: "ubuntu/jammy64".to_string(),
            services: vec!["nginx".to_string()],
            aliases: Vec::new(),
            ssh_user: None,
            ssh_port: 2222,
            identity_file: None,
        }
    }

    fn transport(program: &str, vagrant_dir: Option<PathBuf>) -> SshTransport {
        SshTransport::new(SshTransportConfig {
            program: program.to_string(),
            default_user: "vagrant".to_string(),
            connect_timeout_secs: 7,
            vagrant_dir,
        })
    }

    #[test]
    fn unit_ssh_arguments_use_batch_mode_and_discovered_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let key_dir = temp.path().join("machines/web01/virtualbox");
        std::fs::create_dir_all(&key_dir).expect("mkdir");
        std::fs::write(key_dir.join("private_key"), "key").expect("write key");

        let args = transport("ssh", Some(temp.path().to_path_buf())).ssh_arguments(
            "web01",
            &spec(),
            "uptime",
        );
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=7".to_string()));
        let key_index = args.iter().position(|arg| arg == "-i").expect("identity flag");
        assert!(args[key_index + 1].ends_with("machines/web01/virtualbox/private_key"));
        assert_eq!(args[args.len() - 2], "vagrant@192.168.56.11");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn unit_vagrant_key_discovery_falls_back_to_any_machine() {
        let temp = tempfile::tempdir().expect("tempdir");
        let key_dir = temp.path().join("machines/db01/libvirt");
        std::fs::create_dir_all(&key_dir).expect("mkdir");
        std::fs::write(key_dir.join("private_key"), "key").expect("write key");

        let key = discover_vagrant_private_key(temp.path(), "web01").expect("fallback key");
        assert!(key.ends_with("machines/db01/libvirt/private_key"));
        assert!(discover_vagrant_private_key(&temp.path().join("missing"), "web01").is_none());
    }

    #[tokio::test]
    async fn functional_missing_ssh_program_is_a_transport_failure() {
        let outcome = transport("/nonexistent/ssh-binary", None)
            .dispatch("web01", &spec(), "uptime")
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(CommandFailureKind::Transport));
        assert!(outcome.output.contains("failed to start"));
    }
}
