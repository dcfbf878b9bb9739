//! Static description of the managed servers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::ticket::Target;

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSpec {
    pub ip: String,
    pub os: String,
    #[serde(default)]
    pub services: Vec<String>,
    /// Alternate names operators use for this server.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub ssh_user: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

impl ServerSpec {
    pub fn hosts_service(&self, service: &str) -> bool {
        self.services.iter().any(|candidate| candidate == service)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Inventory {
    servers: BTreeMap<String, ServerSpec>,
}

impl Default for Inventory {
    fn default() -> Self {
        let entry = |ip: &str, os: &str, service: &str, alias: Option<&str>| ServerSpec {
            ip: ip.to_string(),
            os: os.to_string(),
            services: vec![service.to_string()],
            aliases: alias.map(str::to_string).into_iter().collect(),
            ssh_user: None,
            ssh_port: default_ssh_port(),
            identity_file: None,
        };
        let mut servers = BTreeMap::new();
        servers.insert(
            "web01".to_string(),
            entry("192.168.56.11", "ubuntu/jammy64", "nginx", Some("web-server-01")),
        );
        servers.insert(
            "app01".to_string(),
            entry("192.168.56.12", "centos/stream9", "tomcat", Some("app-server-01")),
        );
        servers.insert(
            "db01".to_string(),
            entry("192.168.56.15", "centos/stream9", "mysql", Some("db-server-01")),
        );
        servers.insert(
            "mc01".to_string(),
            entry("192.168.56.14", "centos/stream9", "memcache", None),
        );
        servers.insert(
            "rmq01".to_string(),
            entry("192.168.56.13", "centos/stream9", "rabbitmq", None),
        );
        Self { servers }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_ascii_lowercase()
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_'))
        .map(|token| token.trim_matches(|ch: char| ch == '.' || ch == '-' || ch == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn token_names_service(token: &str, service: &str) -> bool {
    token == service
        || token.strip_suffix('d') == Some(service)
        || (service == "memcache" && token == "memcached")
        || (service == "rabbitmq" && token == "rabbitmq-server")
}

impl Inventory {
    pub fn from_servers(servers: BTreeMap<String, ServerSpec>) -> Self {
        Self { servers }
    }

    pub fn get(&self, server: &str) -> Option<&ServerSpec> {
        self.servers.get(server)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerSpec)> {
        self.servers
            .iter()
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// Maps a server name, alias or IP to its canonical inventory name.
    pub fn canonical_name(&self, hint: &str) -> Option<&str> {
        let hint = hint.trim().to_ascii_lowercase();
        self.servers
            .iter()
            .find(|(name, spec)| {
                name.to_ascii_lowercase() == hint
                    || spec.ip == hint
                    || spec
                        .aliases
                        .iter()
                        .any(|alias| alias.to_ascii_lowercase() == hint)
            })
            .map(|(name, _)| name.as_str())
    }

    /// First server hosting `service`, in name order.
    pub fn server_for_service(&self, service: &str) -> Option<&str> {
        self.servers
            .iter()
            .find(|(_, spec)| spec.hosts_service(service))
            .map(|(name, _)| name.as_str())
    }

    /// Resolves optional server/service hints into a concrete target.
    ///
    /// A named server wins. Its service is the hinted one when hosted there; a
    /// hinted service the server does not host leaves the service unset. Without
    /// a hint a single-service server gets that service. A bare service hint
    /// picks the first host.
    pub fn resolve(&self, server_hint: Option<&str>, service_hint: Option<&str>) -> Option<Target> {
        let service_hint = service_hint
            .map(|service| service.trim().to_ascii_lowercase())
            .filter(|service| !service.is_empty());
        if let Some(server) = server_hint.and_then(|hint| self.canonical_name(hint)) {
            let spec = self.servers.get(server)?;
            let service = match service_hint {
                Some(service) if spec.hosts_service(&service) => Some(service),
                Some(_) => None,
                None if spec.services.len() == 1 => spec.services.first().cloned(),
                None => None,
            };
            return Some(Target {
                server: server.to_string(),
                service,
            });
        }
        let service = service_hint?;
        let server = self.server_for_service(&service)?;
        Some(Target {
            server: server.to_string(),
            service: Some(service),
        })
    }

    /// Finds a target mentioned in free text by server name, alias, IP or service.
    pub fn find_target(&self, text: &str) -> Option<Target> {
        let tokens = tokenize(text);
        let server = tokens
            .iter()
            .find_map(|token| self.canonical_name(token))
            .map(str::to_string);
        let service = tokens.iter().find_map(|token| {
            self.servers
                .values()
                .flat_map(|spec| spec.services.iter())
                .find(|service| token_names_service(token, service))
                .cloned()
        });
        self.resolve(server.as_deref(), service.as_deref())
    }
}

pub fn validate_inventory(inventory: &Inventory) -> Result<()> {
    if inventory.is_empty() {
        bail!("inventory must declare at least one server");
    }
    for (name, spec) in inventory.iter() {
        if name.trim().is_empty() {
            bail!("inventory server names cannot be empty");
        }
        if spec.ip.trim().is_empty() {
            bail!("inventory server '{name}' is missing an ip");
        }
        if spec.os.trim().is_empty() {
            bail!("inventory server '{name}' is missing an os");
        }
        if spec.ssh_port == 0 {
            bail!("inventory server '{name}' has an invalid ssh_port 0");
        }
    }
    Ok(())
}
