use crate::error::{Result, StackError};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_CONFIG_FILE: &str = "backend/application.yaml";
pub const COMPOSE_FILE: &str = "docker-compose.yaml";

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub app_config: PathBuf,
    pub compose_file: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        ProjectPaths {
            root: root.to_path_buf(),
            app_config: root.join(APP_CONFIG_FILE),
            compose_file: root.join(COMPOSE_FILE),
        }
    }
}

pub fn resolve_docker_binary() -> String {
    std::env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string())
}

pub fn find_project_root(start_dir: &Path) -> PathBuf {
    // Walk up until we find the compose definition; otherwise stay where we started.
    let mut dir = start_dir.to_path_buf();

    for _ in 0..12 {
        if dir.join(COMPOSE_FILE).exists() {
            return dir;
        }

        match dir.parent() {
            Some(parent) if parent != dir => dir = parent.to_path_buf(),
            _ => break,
        }
    }

    start_dir.to_path_buf()
}

/// Load the application config. An empty document is an empty mapping.
pub fn load_config(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(StackError::ConfigMissing {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| StackError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }

    let v: Value = serde_yaml::from_str(&content).map_err(|source| StackError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    if is_truthy(&v) {
        Ok(v)
    } else {
        Ok(Value::Mapping(Mapping::new()))
    }
}

/// Names under `languages` whose entry is a mapping with a truthy `enabled`,
/// in file order.
pub fn select_language_profiles(cfg: &Value) -> Vec<String> {
    let mut profiles = Vec::new();

    if let Some(languages) = cfg.get("languages").and_then(|l| l.as_mapping()) {
        for (name, entry) in languages {
            if !entry.is_mapping() {
                continue;
            }
            let enabled = entry.get("enabled").map(is_truthy).unwrap_or(false);
            if !enabled {
                continue;
            }
            if let Some(name) = scalar_string(name) {
                profiles.push(name);
            }
        }
    }
    profiles
}

/// `cfg.<section>.<key>` if present and truthy.
pub fn lookup<'a>(cfg: &'a Value, section: &str, key: &str) -> Option<&'a Value> {
    cfg.get(section)
        .and_then(|s| s.get(key))
        .filter(|v| is_truthy(v))
}

/// `cfg.<section>.<key>` rendered as a string, if present and scalar.
pub fn lookup_str(cfg: &Value, section: &str, key: &str) -> Option<String> {
    lookup(cfg, section, key).and_then(scalar_string)
}

pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

pub fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}
