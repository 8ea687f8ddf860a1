use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub generator: GeneratorConfig,
  #[serde(default)]
  pub auth: AuthConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
  /// Custom title for header (defaults to "notefie")
  pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
  /// Project URL, e.g. https://xyzcompany.supabase.co
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
  #[serde(default = "default_model")]
  pub model: String,
  #[serde(default = "default_generator_url")]
  pub base_url: String,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      model: default_model(),
      base_url: default_generator_url(),
    }
  }
}

fn default_model() -> String {
  "gemini-1.5-pro-001".to_string()
}

fn default_generator_url() -> String {
  "https://generativelanguage.googleapis.com".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
  /// OAuth providers offered next to email/password (e.g. "google")
  #[serde(default, deserialize_with = "deserialize_lowercase_list")]
  pub providers: Vec<String>,
  /// Where the provider sends the browser after sign-in
  pub redirect_to: Option<String>,
}

fn deserialize_lowercase_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  let mut out: Vec<String> = Vec::with_capacity(v.len());
  for name in v.into_iter().map(|s| s.trim().to_lowercase()) {
    if !name.is_empty() && !out.contains(&name) {
      out.push(name);
    }
  }
  Ok(out)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a fetched note list is refetched on the next read
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
    }
  }
}

fn default_stale_secs() -> u64 {
  300
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Keep the session on disk so the next start skips the login form
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { persist: true }
  }
}

fn default_true() -> bool {
  true
}

/// Backend location and key, resolved from config + environment
#[derive(Debug, Clone)]
pub struct BackendCredentials {
  pub url: String,
  pub api_key: String,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./notefie.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/notefie/config.yaml
  ///
  /// Without a file, defaults are used and everything comes from the
  /// environment.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("notefie.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("notefie").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid (all defaults) config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("notefie")
  }

  /// Backend URL and anon key.
  ///
  /// URL: NOTEFIE_BACKEND_URL, then `backend.url`.
  /// Key: NOTEFIE_BACKEND_KEY, then SUPABASE_ANON_KEY.
  pub fn backend_credentials(&self) -> Result<BackendCredentials, Error> {
    self.backend_credentials_from(|name| std::env::var(name).ok())
  }

  fn backend_credentials_from(
    &self,
    env: impl Fn(&str) -> Option<String>,
  ) -> Result<BackendCredentials, Error> {
    let url = env("NOTEFIE_BACKEND_URL")
      .or_else(|| self.backend.url.clone())
      .filter(|u| !u.trim().is_empty())
      .ok_or_else(|| {
        Error::Configuration(
          "Backend URL not found. Set backend.url in config or NOTEFIE_BACKEND_URL.".to_string(),
        )
      })?;

    let api_key = env("NOTEFIE_BACKEND_KEY")
      .or_else(|| env("SUPABASE_ANON_KEY"))
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| {
        Error::Configuration(
          "Backend key not found. Set NOTEFIE_BACKEND_KEY or SUPABASE_ANON_KEY.".to_string(),
        )
      })?;

    Ok(BackendCredentials { url, api_key })
  }

  /// Generator API key: NOTEFIE_GEMINI_API_KEY, then GEMINI_API_KEY.
  pub fn generator_api_key() -> Option<String> {
    std::env::var("NOTEFIE_GEMINI_API_KEY")
      .or_else(|_| std::env::var("GEMINI_API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())
  }

  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache.stale_secs.min(i64::MAX as u64) as i64)
  }
}
