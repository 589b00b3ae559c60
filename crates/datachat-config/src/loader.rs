use crate::Config;
use anyhow::{Context, Result};
use jsonc_parser::{parse_to_serde_value, ParseOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 2] = ["datachat.jsonc", "datachat.json"];

static ENV_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{env:([^}]+)\}").expect("env placeholder regex"));

pub struct ConfigLoader {
    config: Config,
    config_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            config_paths: Vec::new(),
        }
    }

    pub fn load_from_str(&mut self, content: &str) -> Result<()> {
        let content = substitute_env_vars(content);
        let config = parse_jsonc(&content).with_context(|| "Failed to parse config content")?;
        self.config.merge(config);
        Ok(())
    }

    /// Missing files are skipped; unreadable or malformed ones are errors.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let content = substitute_env_vars(&content);
        let config = parse_jsonc(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::debug!(path = %path.display(), "loaded config file");
        self.config.merge(config);
        self.config_paths.push(path.to_path_buf());
        Ok(())
    }

    /// Loads the first of `datachat.jsonc` / `datachat.json` found in `dir`.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        for name in CONFIG_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return self.load_from_file(&path);
            }
        }
        Ok(())
    }

    pub fn load_global(&mut self) -> Result<()> {
        match get_global_config_dir() {
            Some(dir) => self.load_dir(dir),
            None => Ok(()),
        }
    }

    pub fn load_project<P: AsRef<Path>>(&mut self, project_dir: P) -> Result<()> {
        self.load_dir(project_dir)
    }

    pub fn load_from_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Applies `DATACHAT_*` overrides using `lookup` to read variables.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATACHAT_SERVER_URL") {
            self.config
                .server
                .get_or_insert_with(Default::default)
                .base_url = Some(url);
        }
        if let Some(model) = non_empty("DATACHAT_MODEL") {
            self.config.model = Some(model);
        }
        if let Some(level) = non_empty("DATACHAT_LOG_LEVEL") {
            self.config.log_level = Some(level);
        }
    }

    /// Merge order: global file, project file, environment.
    pub fn load_all<P: AsRef<Path>>(&mut self, project_dir: P) -> Result<Config> {
        self.load_global()?;
        self.load_project(project_dir)?;
        self.load_from_env();
        Ok(self.config.clone())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }
}

pub fn load_config<P: AsRef<Path>>(project_dir: P) -> Result<Config> {
    ConfigLoader::new().load_all(project_dir)
}

fn get_global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("datachat"))
}

fn substitute_env_vars(text: &str) -> String {
    ENV_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
}

fn parse_jsonc(content: &str) -> Result<Config> {
    let parse_options = ParseOptions {
        allow_trailing_commas: true,
        ..Default::default()
    };
    let parsed = parse_to_serde_value(content, &parse_options)
        .with_context(|| "Failed to parse JSONC")?
        .context("Config content is empty")?;
    serde_json::from_value(parsed).with_context(|| "Failed to parse config JSON")
}
