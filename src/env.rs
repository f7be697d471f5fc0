use crate::config::lookup_str;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

/// In-network hostname of the postgres service.
pub const DATABASE_SERVICE: &str = "database";
pub const DEFAULT_NEO4J_URI: &str = "bolt://neo4j:7687";
pub const DEFAULT_BOLT_PORT: u16 = 7687;
pub const DEFAULT_HTTP_PORT: u16 = 7474;

const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Environment handed to every compose invocation.
///
/// `base` is the inherited process environment; `vars` holds what we derived
/// and pass explicitly. Lookups consult `vars` first.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    base: HashMap<String, String>,
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(base: HashMap<String, String>) -> Self {
        Environment {
            base,
            vars: BTreeMap::new(),
        }
    }

    /// Snapshot of the current process environment. Non-UTF-8 entries are skipped.
    pub fn inherit() -> Self {
        Environment::new(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .or_else(|| self.base.get(key))
            .map(|s| s.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    /// Set only when nothing (derived or inherited) provides `key` yet.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        if self.get(key).is_none() {
            self.set(key, value);
        }
    }

    /// Derived entries, to be passed to the child process.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// Translate application.yaml into the variables the compose file expects.
pub fn inject_from_config(env: &mut Environment, cfg: &Value) {
    if let Some(port) = lookup_str(cfg, "server", "port") {
        env.set("APP_SERVER_PORT", port);
    }

    let mut host = lookup_str(cfg, "database", "host").unwrap_or_else(|| DATABASE_SERVICE.to_string());
    if LOOPBACK_HOSTS.contains(&host.as_str()) {
        host = DATABASE_SERVICE.to_string();
    }
    env.set("APP_DATABASE_HOST", host);

    for (key, var) in [
        ("port", "APP_DATABASE_PORT"),
        ("user", "APP_DATABASE_USERNAME"),
        ("password", "APP_DATABASE_PASSWORD"),
        ("database", "APP_DATABASE_DATABASE"),
        ("schema", "APP_DATABASE_SCHEMA"),
    ] {
        if let Some(value) = lookup_str(cfg, "database", key) {
            env.set(var, value);
        }
    }

    let url = database_url(env);
    env.set("DATABASE_URL", url);

    let mut uri = lookup_str(cfg, "neo4j", "uri").unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string());
    if LOOPBACK_HOSTS
        .iter()
        .any(|h| uri.starts_with(&format!("bolt://{h}")))
    {
        uri = DEFAULT_NEO4J_URI.to_string();
    }

    if let (Some(user), Some(password)) = (
        lookup_str(cfg, "neo4j", "username"),
        lookup_str(cfg, "neo4j", "password"),
    ) {
        env.set("NEO4J_AUTH", format!("{user}/{password}"));
    }

    let (bolt_port, http_port) = parse_neo4j_ports(&uri);
    env.set("APP_NEO4J_URI", uri);
    env.set_default("NEO4J_BOLT_PORT", bolt_port.to_string());
    env.set_default("NEO4J_HTTP_PORT", http_port.to_string());
}

/// postgres URL from whatever is known so far, with fixed fallbacks.
pub fn database_url(env: &Environment) -> String {
    format!(
        "postgresql://{}:{}@{}:{}/{}",
        env.get("APP_DATABASE_USERNAME").unwrap_or("user"),
        env.get("APP_DATABASE_PASSWORD").unwrap_or("password"),
        env.get("APP_DATABASE_HOST").unwrap_or(DATABASE_SERVICE),
        env.get("APP_DATABASE_PORT").unwrap_or("5432"),
        env.get("APP_DATABASE_DATABASE").unwrap_or("check_deps"),
    )
}

/// (bolt, http) ports for a URI like `bolt://host:7687`.
/// The http port is not carried by the URI and is always the default.
pub fn parse_neo4j_ports(uri: &str) -> (u16, u16) {
    let bolt_port = uri
        .split_once("://")
        .and_then(|(_, rest)| rest.split_once(':'))
        .and_then(|(_, port)| port.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_BOLT_PORT);
    (bolt_port, DEFAULT_HTTP_PORT)
}

/// Select the backend image build profile.
pub fn set_build_profile(env: &mut Environment, debug: bool) {
    if debug {
        env.set("BUILD_PROFILE", "debug");
        env.set_default("RUST_LOG", "debug");
    } else {
        env.set_default("BUILD_PROFILE", "release");
    }
}

pub fn log_environment(env: &Environment) {
    for (key, value) in env.vars() {
        tracing::debug!("{}={}", key, masked(key, value));
    }
}

fn masked(key: &str, value: &str) -> String {
    if key.contains("PASSWORD") || key == "NEO4J_AUTH" {
        "***".to_string()
    } else if key == "DATABASE_URL" {
        mask_url_password(value)
    } else {
        value.to_string()
    }
}

fn mask_url_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let start = scheme_end + 3;
    let Some(at) = url.rfind('@').filter(|at| *at >= start) else {
        return url.to_string();
    };
    match url[start..at].split_once(':') {
        Some((user, _)) => format!("{}{}:***{}", &url[..start], user, &url[at..]),
        None => url.to_string(),
    }
}
