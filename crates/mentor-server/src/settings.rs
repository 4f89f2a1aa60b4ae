//! Runtime configuration: a TOML file layered with `MENTOR__*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mentor_llm::LlmConfig;
use serde::Deserialize;

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Pause before each background grading run.
  pub grading_delay_ms: u64,
  pub llm:              LlmConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_owned(),
      port:             8080,
      store_path:       PathBuf::from("mentor.db"),
      grading_delay_ms: 1000,
      llm:              LlmConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `MENTOR__PORT` or `MENTOR__LLM__API_KEY`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
          config::Environment::with_prefix("MENTOR")
            .separator("__")
            .try_parsing(true),
        ),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let mut cfg: Self = builder
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  #[test]
  fn defaults_fill_missing_keys() {
    let cfg = ServerConfig::from_builder(Config::builder()).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.grading_delay_ms, 1000);
    assert_eq!(cfg.llm.timeout_secs, 120);
    assert!(cfg.llm.api_key.is_empty());
  }

  #[test]
  fn file_values_override_defaults() {
    let toml = r#"
      port = 9000
      store_path = "/var/lib/mentor.db"

      [llm]
      api_key = "sk-test"
      model = "local"
    "#;
    let cfg = ServerConfig::from_builder(
      Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
    )
    .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/mentor.db"));
    assert_eq!(cfg.llm.api_key, "sk-test");
    assert_eq!(cfg.llm.model, "local");
    assert_eq!(cfg.llm.base_url, LlmConfig::default().base_url);
  }

  #[test]
  fn tilde_is_expanded() {
    let expanded = expand_tilde(Path::new("~/mentor.db"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expanded, PathBuf::from(home).join("mentor.db"));
    }
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}
