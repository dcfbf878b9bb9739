//! Command catalog and the per-server allow-list rendered from it.
//!
//! Every command that can reach a server originates here. Catalog entries are
//! templates over `{unit}`, `{host}` and `{server}`; rendering them against the
//! inventory yields the exact strings the runner will accept.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::inventory::{Inventory, ServerSpec};
use crate::plan::StepPhase;

pub const COMMAND_CATALOG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_UNIT_KEY: &str = "default";

const SUPPORTED_PLACEHOLDERS: [&str; 3] = ["unit", "host", "server"];
const SANITIZED_CHARACTERS: [char; 5] = [';', '`', '$', '<', '>'];

const READ_ONLY_EXECUTABLES: &[&str] = &[
    "cat",
    "curl",
    "df",
    "free",
    "grep",
    "head",
    "journalctl",
    "ls",
    "mysqladmin",
    "netstat",
    "nginx",
    "pgrep",
    "ps",
    "rabbitmqctl",
    "ss",
    "stat",
    "systemctl",
    "tail",
    "test",
    "top",
    "uptime",
    "wc",
];

const DESTRUCTIVE_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "mkfs",
    "dd if=",
    "shutdown",
    "reboot",
    "poweroff",
    ":(){",
    "drop database",
    "drop table",
    "truncate ",
    "chmod -r 777",
    "kill -9",
    "userdel",
    "iptables -f",
];

fn command_catalog_schema_version() -> u32 {
    COMMAND_CATALOG_SCHEMA_VERSION
}

fn default_idempotent() -> bool {
    true
}

fn default_service_status_template() -> String {
    "systemctl status {unit} --no-pager".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub intent: String,
    #[serde(default)]
    pub phase: StepPhase,
    pub purpose: String,
    pub action: String,
    pub validation: String,
    #[serde(default)]
    pub rollback: Option<String>,
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
    #[serde(default)]
    pub destructive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceCatalog {
    /// OS identifier to systemd unit, with an optional `default` entry.
    #[serde(default)]
    pub units: BTreeMap<String, String>,
    /// Extra words that identify this service in free text.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub playbook: Vec<CommandSpec>,
}

impl ServiceCatalog {
    pub fn unit_for(&self, os: &str, service: &str) -> String {
        self.units
            .get(os)
            .or_else(|| self.units.get(DEFAULT_UNIT_KEY))
            .cloned()
            .unwrap_or_else(|| service.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticCommand {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandCatalog {
    #[serde(default = "command_catalog_schema_version")]
    pub schema_version: u32,
    pub services: BTreeMap<String, ServiceCatalog>,
    /// Host diagnostics keyed by OS identifier, with an optional `default` entry.
    #[serde(default)]
    pub diagnostics: BTreeMap<String, Vec<DiagnosticCommand>>,
    #[serde(default = "default_service_status_template")]
    pub service_status: String,
}

/// A catalog entry rendered for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub service: String,
    pub intent: String,
    pub phase: StepPhase,
    pub purpose: String,
    pub action: String,
    pub validation: String,
    pub rollback: Option<String>,
    pub idempotent: bool,
    pub destructive: bool,
}

fn spec(
    intent: &str,
    phase: StepPhase,
    purpose: &str,
    action: &str,
    validation: &str,
    rollback: Option<&str>,
) -> CommandSpec {
    CommandSpec {
        intent: intent.to_string(),
        phase,
        purpose: purpose.to_string(),
        action: action.to_string(),
        validation: validation.to_string(),
        rollback: rollback.map(str::to_string),
        idempotent: true,
        destructive: false,
    }
}

fn standard_playbook(verify_action: &str, restart_rollback: Option<&str>) -> Vec<CommandSpec> {
    vec![
        spec(
            "check_status",
            StepPhase::Diagnose,
            "Inspect the current unit state",
            "systemctl show {unit} --property=ActiveState,SubState,NRestarts",
            "systemctl show {unit} --property=LoadState",
            None,
        ),
        spec(
            "restart",
            StepPhase::Remediate,
            "Restart the service",
            "sudo systemctl restart {unit}",
            "systemctl is-active {unit}",
            restart_rollback,
        ),
        spec(
            "verify",
            StepPhase::Verify,
            "Confirm the service answers requests",
            verify_action,
            "systemctl is-active {unit}",
            None,
        ),
    ]
}

fn service(units: &[(&str, &str)], keywords: &[&str], playbook: Vec<CommandSpec>) -> ServiceCatalog {
    ServiceCatalog {
        units: units
            .iter()
            .map(|(os, unit)| (os.to_string(), unit.to_string()))
            .collect(),
        keywords: keywords.iter().map(|word| word.to_string()).collect(),
        playbook,
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            "nginx".to_string(),
            service(
                &[(DEFAULT_UNIT_KEY, "nginx")],
                &["502", "504", "bad gateway", "web server"],
                standard_playbook(
                    "curl -fsS -I http://localhost/",
                    Some("sudo cp -p /etc/nginx/nginx.conf.bak /etc/nginx/nginx.conf && sudo systemctl restart {unit}"),
                ),
            ),
        );
        services.insert(
            "tomcat".to_string(),
            service(
                &[(DEFAULT_UNIT_KEY, "tomcat")],
                &["java", "application server", "8080"],
                standard_playbook("curl -fsS -I http://localhost:8080/", None),
            ),
        );
        services.insert(
            "mysql".to_string(),
            service(
                &[(DEFAULT_UNIT_KEY, "mysql"), ("centos/stream9", "mysqld")],
                &["database", "db", "sql", "mysqld", "mariadb"],
                standard_playbook("mysqladmin ping", None),
            ),
        );
        services.insert(
            "memcache".to_string(),
            service(
                &[(DEFAULT_UNIT_KEY, "memcached")],
                &["cache", "memcached"],
                standard_playbook("ss -tln sport = :11211", None),
            ),
        );
        services.insert(
            "rabbitmq".to_string(),
            service(
                &[(DEFAULT_UNIT_KEY, "rabbitmq-server")],
                &["queue", "amqp", "broker"],
                standard_playbook("sudo rabbitmqctl status", None),
            ),
        );

        let mut diagnostics = BTreeMap::new();
        diagnostics.insert(
            DEFAULT_UNIT_KEY.to_string(),
            vec![
                DiagnosticCommand {
                    name: "uptime".to_string(),
                    command: "uptime".to_string(),
                },
                DiagnosticCommand {
                    name: "memory".to_string(),
                    command: "free -m".to_string(),
                },
                DiagnosticCommand {
                    name: "disk".to_string(),
                    command: "df -h".to_string(),
                },
                DiagnosticCommand {
                    name: "load".to_string(),
                    command: "cat /proc/loadavg".to_string(),
                },
            ],
        );

        Self {
            schema_version: COMMAND_CATALOG_SCHEMA_VERSION,
            services,
            diagnostics,
            service_status: default_service_status_template(),
        }
    }
}

impl CommandCatalog {
    pub fn service(&self, name: &str) -> Option<&ServiceCatalog> {
        self.services.get(name)
    }

    /// Renders the ordered playbook of `service` for `server`.
    pub fn render_playbook(
        &self,
        server: &str,
        spec: &ServerSpec,
        service: &str,
    ) -> Option<Vec<RenderedCommand>> {
        let catalog = self.services.get(service)?;
        let unit = catalog.unit_for(&spec.os, service);
        let render = |template: &str| render_template(template, &unit, &spec.ip, server);
        Some(
            catalog
                .playbook
                .iter()
                .map(|entry| RenderedCommand {
                    service: service.to_string(),
                    intent: entry.intent.clone(),
                    phase: entry.phase,
                    purpose: entry.purpose.clone(),
                    action: render(&entry.action),
                    validation: render(&entry.validation),
                    rollback: entry.rollback.as_deref().map(render),
                    idempotent: entry.idempotent,
                    destructive: entry.destructive,
                })
                .collect(),
        )
    }

    /// Host diagnostics followed by one status command per hosted service.
    pub fn render_diagnostics(&self, server: &str, spec: &ServerSpec) -> Vec<DiagnosticCommand> {
        let mut commands: Vec<DiagnosticCommand> = self
            .diagnostics
            .get(&spec.os)
            .or_else(|| self.diagnostics.get(DEFAULT_UNIT_KEY))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|diagnostic| DiagnosticCommand {
                command: render_template(&diagnostic.command, "", &spec.ip, server),
                name: diagnostic.name,
            })
            .collect();
        for service in &spec.services {
            let unit = self
                .services
                .get(service)
                .map(|catalog| catalog.unit_for(&spec.os, service))
                .unwrap_or_else(|| service.clone());
            commands.push(DiagnosticCommand {
                name: service.clone(),
                command: render_template(&self.service_status, &unit, &spec.ip, server),
            });
        }
        commands
    }

    /// Finds a catalog service named in free text by name or keyword.
    pub fn service_mentioned_in(&self, text: &str) -> Option<&str> {
        let lowered = text.to_ascii_lowercase();
        let words: BTreeSet<&str> = lowered
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let mentions = |phrase: &str| {
            let phrase = phrase.to_ascii_lowercase();
            if phrase.contains(' ') {
                lowered.contains(&phrase)
            } else {
                words.contains(phrase.as_str())
            }
        };
        self.services
            .iter()
            .find(|(name, catalog)| {
                mentions(name.as_str())
                    || catalog
                        .keywords
                        .iter()
                        .any(|keyword| mentions(keyword.as_str()))
            })
            .map(|(name, _)| name.as_str())
    }
}

pub fn render_template(template: &str, unit: &str, host: &str, server: &str) -> String {
    template
        .replace("{unit}", unit)
        .replace("{host}", host)
        .replace("{server}", server)
}

fn extract_placeholders(template: &str) -> Result<Vec<String>> {
    let mut placeholders = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            bail!("command template '{}' has an unterminated placeholder", template);
        };
        placeholders.push(after_open[..close].trim().to_string());
        rest = &after_open[close + 1..];
    }
    if rest.contains('}') {
        bail!("command template '{}' has an unmatched '}}'", template);
    }
    Ok(placeholders)
}

fn validate_command_template(template: &str, field: &str, context: &str) -> Result<()> {
    if template.trim().is_empty() {
        bail!("command catalog {context} has an empty {field}");
    }
    if let Some(ch) = template.chars().find(|ch| SANITIZED_CHARACTERS.contains(ch)) {
        bail!("command catalog {context} {field} contains forbidden character '{ch}'");
    }
    if template.contains('\n') || template.contains('\r') {
        bail!("command catalog {context} {field} must be a single line");
    }
    for placeholder in extract_placeholders(template)? {
        if !SUPPORTED_PLACEHOLDERS.contains(&placeholder.as_str()) {
            bail!(
                "command catalog {context} {field} uses unsupported placeholder '{placeholder}' (supported: unit, host, server)"
            );
        }
    }
    Ok(())
}

pub fn validate_command_catalog(catalog: &CommandCatalog) -> Result<()> {
    if catalog.schema_version != COMMAND_CATALOG_SCHEMA_VERSION {
        bail!(
            "unsupported command catalog schema version {} (expected {})",
            catalog.schema_version,
            COMMAND_CATALOG_SCHEMA_VERSION
        );
    }
    if catalog.services.is_empty() {
        bail!("command catalog must declare at least one service");
    }
    validate_command_template(&catalog.service_status, "service_status", "root")?;
    if !is_read_only_command(&catalog.service_status) {
        bail!("command catalog service_status must be read-only");
    }
    for (os, diagnostics) in &catalog.diagnostics {
        for diagnostic in diagnostics {
            let context = format!("diagnostic '{}' for os '{os}'", diagnostic.name);
            validate_command_template(&diagnostic.command, "command", &context)?;
            if !is_read_only_command(&diagnostic.command) {
                bail!("command catalog {context} must be read-only");
            }
        }
    }

    for (name, service) in &catalog.services {
        if service.playbook.is_empty() {
            bail!("command catalog service '{name}' has an empty playbook");
        }
        let mut intents = BTreeSet::new();
        for entry in &service.playbook {
            let context = format!("service '{name}' intent '{}'", entry.intent);
            if entry.intent.trim().is_empty() {
                bail!("command catalog service '{name}' has an entry without intent");
            }
            if !intents.insert(entry.intent.as_str()) {
                bail!("command catalog {context} is declared twice");
            }
            validate_command_template(&entry.action, "action", &context)?;
            validate_command_template(&entry.validation, "validation", &context)?;
            if !is_read_only_command(&entry.validation) {
                bail!(
                    "command catalog {context} validation '{}' is not read-only",
                    entry.validation
                );
            }
            if let Some(rollback) = &entry.rollback {
                validate_command_template(rollback, "rollback", &context)?;
            }
        }
    }
    Ok(())
}

/// Strips shell metacharacters from free-form command input.
pub fn sanitize_command_input(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !SANITIZED_CHARACTERS.contains(ch))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn matches_destructive_pattern(command: &str) -> bool {
    let lowered = command.to_ascii_lowercase();
    DESTRUCTIVE_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

fn split_pipeline(command: &str) -> Vec<&str> {
    command
        .split("&&")
        .flat_map(|segment| segment.split("||"))
        .flat_map(|segment| segment.split('|'))
        .map(str::trim)
        .collect()
}

const CURL_WRITING_SHORT_FLAGS: &[char] = &['X', 'd', 'T', 'F', 'o', 'O', 'K'];
const CURL_WRITING_LONG_FLAGS: &[&str] = &[
    "--request",
    "--data",
    "--json",
    "--upload-file",
    "--form",
    "--output",
    "--remote-name",
    "--config",
];

/// True when `arg` is a short-option cluster such as `-fsSo/tmp/x` naming one of `flags`.
///
/// Letters after the first value-taking flag belong to its value, so the whole
/// cluster is scanned; a false match only makes a command non-read-only.
fn short_cluster_has(arg: &str, flags: &[char]) -> bool {
    arg.strip_prefix('-')
        .filter(|cluster| !cluster.is_empty() && !cluster.starts_with('-'))
        .is_some_and(|cluster| cluster.chars().any(|ch| flags.contains(&ch)))
}

fn segment_is_read_only(segment: &str) -> bool {
    let Ok(words) = shell_words::split(segment) else {
        return false;
    };
    let Some((program, args)) = words.split_first() else {
        return false;
    };
    if !READ_ONLY_EXECUTABLES.contains(&program.as_str()) {
        return false;
    }
    let first_arg = args.first().map(String::as_str);
    match program.as_str() {
        "systemctl" => matches!(
            first_arg,
            Some("status" | "is-active" | "is-enabled" | "is-failed" | "show" | "list-units")
        ),
        "curl" => !args.iter().any(|arg| {
            short_cluster_has(arg, CURL_WRITING_SHORT_FLAGS)
                || CURL_WRITING_LONG_FLAGS.iter().any(|flag| {
                    arg.strip_prefix(flag)
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['=', '-']))
                })
        }),
        "ss" => !args
            .iter()
            .any(|arg| arg == "--kill" || short_cluster_has(arg, &['K'])),
        "mysqladmin" => args
            .iter()
            .filter(|arg| !arg.starts_with('-'))
            .all(|arg| matches!(arg.as_str(), "ping" | "status" | "version")),
        "nginx" => !args.is_empty()
            && args
                .iter()
                .all(|arg| matches!(arg.as_str(), "-t" | "-T" | "-v" | "-V")),
        "rabbitmqctl" => matches!(
            first_arg,
            Some("status" | "list_queues" | "cluster_status")
        ),
        "journalctl" => !args.iter().any(|arg| {
            arg.starts_with("--vacuum") || arg == "--rotate" || arg == "--flush"
        }),
        _ => true,
    }
}

/// True when every segment of `command` runs an inspection-only program.
///
/// Redirection, substitution and command separators are never read-only.
pub fn is_read_only_command(command: &str) -> bool {
    let trimmed = command.trim();
    if trimmed.is_empty()
        || trimmed.contains(SANITIZED_CHARACTERS)
        || trimmed.contains('\n')
        || matches_destructive_pattern(trimmed)
    {
        return false;
    }
    split_pipeline(trimmed)
        .into_iter()
        .all(|segment| !segment.is_empty() && segment_is_read_only(segment))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ServerAllowList {
    commands: BTreeSet<String>,
    playbooks: BTreeMap<String, Vec<RenderedCommand>>,
    diagnostics: Vec<DiagnosticCommand>,
}

/// Exact command strings each server accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    servers: BTreeMap<String, ServerAllowList>,
}

impl AllowList {
    pub fn build(inventory: &Inventory, catalog: &CommandCatalog) -> Self {
        let mut servers = BTreeMap::new();
        for (name, spec) in inventory.iter() {
            let mut entry = ServerAllowList {
                diagnostics: catalog.render_diagnostics(name, spec),
                ..ServerAllowList::default()
            };
            for diagnostic in &entry.diagnostics {
                entry.commands.insert(diagnostic.command.clone());
            }
            for service in &spec.services {
                let Some(playbook) = catalog.render_playbook(name, spec, service) else {
                    continue;
                };
                for command in &playbook {
                    entry.commands.insert(command.action.clone());
                    entry.commands.insert(command.validation.clone());
                    if let Some(rollback) = &command.rollback {
                        entry.commands.insert(rollback.clone());
                    }
                }
                entry.playbooks.insert(service.clone(), playbook);
            }
            servers.insert(name.to_string(), entry);
        }
        Self { servers }
    }

    pub fn permits(&self, server: &str, command: &str) -> bool {
        self.servers
            .get(server)
            .is_some_and(|entry| entry.commands.contains(command.trim()))
    }

    pub fn playbook(&self, server: &str, service: &str) -> Option<&[RenderedCommand]> {
        self.servers
            .get(server)
            .and_then(|entry| entry.playbooks.get(service))
            .map(Vec::as_slice)
    }

    /// The playbook entry for `service` on `server` whose action is exactly `action`.
    pub fn lookup(&self, server: &str, service: &str, action: &str) -> Option<&RenderedCommand> {
        self.playbook(server, service)?
            .iter()
            .find(|entry| entry.action == action.trim())
    }

    pub fn diagnostics(&self, server: &str) -> &[DiagnosticCommand] {
        self.servers
            .get(server)
            .map(|entry| entry.diagnostics.as_slice())
            .unwrap_or_default()
    }

    pub fn commands(&self, server: &str) -> impl Iterator<Item = &str> {
        self.servers
            .get(server)
            .into_iter()
            .flat_map(|entry| entry.commands.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_default_catalog_passes_validation() {
        validate_command_catalog(&CommandCatalog::default()).expect("default catalog");
    }

    #[test]
    fn unit_read_only_classification() {
        assert!(is_read_only_command("systemctl is-active nginx"));
        assert!(is_read_only_command("systemctl show nginx --property=ActiveState"));
        assert!(is_read_only_command("curl -fsS -I http://localhost/"));
        assert!(is_read_only_command("ps aux | grep nginx"));
        assert!(is_read_only_command("mysqladmin ping"));

        assert!(!is_read_only_command("systemctl restart nginx"));
        assert!(!is_read_only_command("sudo systemctl status nginx"));
        assert!(!is_read_only_command("curl -X POST http://localhost/"));
        assert!(!is_read_only_command("cat /etc/passwd > /tmp/out"));
        assert!(!is_read_only_command("uptime; rm -rf /"));
        assert!(!is_read_only_command("echo $(id)"));
        assert!(!is_read_only_command("mysqladmin shutdown"));
        assert!(!is_read_only_command(""));
    }

    #[test]
    fn regression_joined_output_and_kill_flags_are_not_read_only() {
        assert!(!is_read_only_command("curl --output=/etc/motd http://localhost/"));
        assert!(!is_read_only_command("curl -o/etc/motd http://localhost/"));
        assert!(!is_read_only_command("curl -fsSo/etc/motd http://localhost/"));
        assert!(!is_read_only_command("curl --data-urlencode a=b http://localhost/"));
        assert!(!is_read_only_command("curl --remote-name http://localhost/x"));
        assert!(!is_read_only_command("ss -K dst 10.0.0.1"));
        assert!(!is_read_only_command("ss -tK"));
        assert!(!is_read_only_command("ss --kill"));

        assert!(is_read_only_command("ss -tlnp"));
        assert!(is_read_only_command("curl -fsS -I http://localhost/"));
        assert!(is_read_only_command("curl --head --silent http://localhost/"));
    }

    #[test]
    fn unit_validate_rejects_mutating_validation_command() {
        let mut catalog = CommandCatalog::default();
        let nginx = catalog.services.get_mut("nginx").expect("nginx");
        nginx.playbook[1].validation = "sudo systemctl restart {unit}".to_string();
        let error = validate_command_catalog(&catalog).expect_err("must reject");
        assert!(error.to_string().contains("is not read-only"));
    }

    #[test]
    fn unit_validate_rejects_unknown_placeholder() {
        let mut catalog = CommandCatalog::default();
        let nginx = catalog.services.get_mut("nginx").expect("nginx");
        nginx.playbook[0].action = "systemctl status {service}".to_string();
        let error = validate_command_catalog(&catalog).expect_err("must reject");
        assert!(error.to_string().contains("unsupported placeholder 'service'"));
    }

    #[test]
    fn unit_sanitize_strips_shell_metacharacters() {
        assert_eq!(sanitize_command_input("uptime; rm -rf /"), "uptime rm -rf /");
        assert_eq!(sanitize_command_input("cat `id` > x"), "cat id  x");
        assert_eq!(sanitize_command_input(" free -m "), "free -m");
    }

    #[test]
    fn unit_destructive_patterns_are_case_insensitive() {
        assert!(matches_destructive_pattern("sudo RM -RF /var/lib/mysql"));
        assert!(matches_destructive_pattern("mysql -e 'DROP DATABASE app'"));
        assert!(!matches_destructive_pattern("sudo systemctl restart nginx"));
    }

    #[test]
    fn unit_allow_list_renders_os_specific_units() {
        let inventory = Inventory::default();
        let allow_list = AllowList::build(&inventory, &CommandCatalog::default());
        assert!(allow_list.permits("db01", "sudo systemctl restart mysqld"));
        assert!(!allow_list.permits("db01", "sudo systemctl restart mysql"));
        assert!(allow_list.permits("web01", "sudo systemctl restart nginx"));
        assert!(allow_list.permits("web01", "uptime"));
        assert!(allow_list.permits("web01", "systemctl status nginx --no-pager"));
        assert!(!allow_list.permits("web01", "sudo systemctl restart mysqld"));
        assert!(!allow_list.permits("unknown", "uptime"));
    }

    #[test]
    fn unit_playbook_preserves_catalog_order_and_rollback() {
        let inventory = Inventory::default();
        let allow_list = AllowList::build(&inventory, &CommandCatalog::default());
        let playbook = allow_list.playbook("web01", "nginx").expect("playbook");
        let intents: Vec<&str> = playbook.iter().map(|entry| entry.intent.as_str()).collect();
        assert_eq!(intents, vec!["check_status", "restart", "verify"]);
        let restart = allow_list
            .lookup("web01", "nginx", "sudo systemctl restart nginx")
            .expect("restart entry");
        assert!(restart
            .rollback
            .as_deref()
            .is_some_and(|rollback| allow_list.permits("web01", rollback)));
    }

    #[test]
    fn unit_service_mentioned_in_uses_keywords() {
        let catalog = CommandCatalog::default();
        assert_eq!(
            catalog.service_mentioned_in("Getting 502 Bad Gateway"),
            Some("nginx")
        );
        assert_eq!(catalog.service_mentioned_in("queue is backing up"), Some("rabbitmq"));
        assert_eq!(catalog.service_mentioned_in("hello there"), None);
    }
}
