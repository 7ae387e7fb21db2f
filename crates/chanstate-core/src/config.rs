use std::{collections::HashMap, env, fs, path::Path};

use crate::{errors::Error, formatting::RenderOptions, Result};

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,

    // Runtime
    pub queue_capacity: usize,
    pub echo_snapshots: bool,

    // Rendering
    pub link_target: String,
    pub hard_breaks: bool,
    pub linkify: bool,
}

impl Config {
    /// Process environment first, then `CHANSTATE_*` keys from `./.env`.
    pub fn load() -> Result<Self> {
        let dotenv = read_dotenv(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Build a config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let service_name = lookup("CHANSTATE_SERVICE_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "chanstate".to_string());

        let queue_capacity = match lookup("CHANSTATE_QUEUE_CAPACITY") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!("CHANSTATE_QUEUE_CAPACITY must be an integer, got {raw:?}"))
            })?,
            None => 64,
        }
        .max(1);

        let echo_snapshots = lookup("CHANSTATE_ECHO_SNAPSHOTS")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        let link_target = lookup("CHANSTATE_LINK_TARGET")
            .and_then(non_empty)
            .unwrap_or_else(|| "_blank".to_string());
        let hard_breaks = lookup("CHANSTATE_HARD_BREAKS")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);
        let linkify = lookup("CHANSTATE_LINKIFY")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        Ok(Self {
            service_name,
            queue_capacity,
            echo_snapshots,
            link_target,
            hard_breaks,
            linkify,
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            hard_breaks: self.hard_breaks,
            linkify: self.linkify,
            link_target: self.link_target.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "chanstate".to_string(),
            queue_capacity: 64,
            echo_snapshots: false,
            link_target: "_blank".to_string(),
            hard_breaks: true,
            linkify: true,
        }
    }
}

const KEY_PREFIX: &str = "CHANSTATE_";

fn read_dotenv(path: &Path) -> HashMap<String, String> {
    fs::read_to_string(path)
        .map(|contents| parse_dotenv(&contents))
        .unwrap_or_default()
}

/// `KEY=value` lines for our own keys. Comments, `export` prefixes and one
/// level of matching quotes are handled; everything else is skipped.
fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            key.starts_with(KEY_PREFIX)
                .then(|| (key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value)
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
