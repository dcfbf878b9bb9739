use std::collections::HashMap;

use async_trait::async_trait;
use triage_core::{CommandFailureKind, CommandOutcome, ServerSpec};

use crate::CommandTransport;

const SIMULATED_UPTIME: &str = " 00:53:02 up 2:47,  1 user,  load average: 0.08, 0.12, 0.10\n";
const SIMULATED_FREE: &str = "               total        used        free      shared  buff/cache   available
Mem:            8032        1234        3854          22        2944        6540
Swap:           2048           0        2048
";
const SIMULATED_DF: &str = "Filesystem      Size  Used Avail Use% Mounted on
udev            3.9G     0  3.9G   0% /dev
tmpfs           795M  1.7M  793M   1% /run
/dev/sda1        98G   25G   69G  27% /
";
const SIMULATED_LOADAVG: &str = "0.08 0.12 0.10 2/345 1011\n";

/// Canned responses for demos and tests without reachable servers.
///
/// Every command succeeds unless a scripted outcome says otherwise.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    scripted: HashMap<(String, String), (bool, String)>,
}

fn unit_argument(command: &str, verb: &str) -> Option<String> {
    let mut words = command.split_whitespace();
    words.by_ref().find(|word| *word == verb)?;
    words.next().map(str::to_string)
}

fn canned_output(spec: &ServerSpec, command: &str) -> String {
    let command = command.trim();
    match command {
        "uptime" => return SIMULATED_UPTIME.to_string(),
        "free -m" => return SIMULATED_FREE.to_string(),
        "df -h" => return SIMULATED_DF.to_string(),
        "cat /proc/loadavg" => return SIMULATED_LOADAVG.to_string(),
        _ => {}
    }
    if let Some(unit) = unit_argument(command, "status") {
        if command.contains("systemctl") {
            return format!(
                "● {unit}.service\n   Loaded: loaded (/lib/systemd/system/{unit}.service; enabled)\n   Active: active (running) since Thu 2025-05-16 00:10:31 UTC; 2h 42min ago\n"
            );
        }
    }
    if unit_argument(command, "is-active").is_some() {
        return "active\n".to_string();
    }
    if unit_argument(command, "show").is_some() {
        return "ActiveState=active\nSubState=running\nLoadState=loaded\nNRestarts=0\n".to_string();
    }
    if command.starts_with("curl") {
        return "HTTP/1.1 200 OK\n".to_string();
    }
    if command == "mysqladmin ping" {
        return "mysqld is alive\n".to_string();
    }
    if command.contains("systemctl restart") || command.contains("systemctl reload") {
        return String::new();
    }
    format!("Simulated output for: {command}\nServer: {}\n", spec.ip)
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of `command` on `server`.
    pub fn with_response(
        mut self,
        server: impl Into<String>,
        command: impl Into<String>,
        success: bool,
        output: impl Into<String>,
    ) -> Self {
        self.scripted
            .insert((server.into(), command.into()), (success, output.into()));
        self
    }
}

#[async_trait]
impl CommandTransport for SimulatedTransport {
    async fn dispatch(&self, server: &str, spec: &ServerSpec, command: &str) -> CommandOutcome {
        tracing::debug!(server, command, "simulated dispatch");
        match self.scripted.get(&(server.to_string(), command.to_string())) {
            Some((true, output)) => CommandOutcome::succeeded(command, output.clone()),
            Some((false, output)) => {
                CommandOutcome::failed(command, CommandFailureKind::NonZeroExit, output.clone())
                    .with_exit_code(Some(1))
            }
            None => CommandOutcome::succeeded(command, canned_output(spec, command)),
        }
    }
}
