use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = ".kontrol-audit.toml";

const DEFAULT_PROJECT_ID: &str = "rpr-myaudit";
const DEFAULT_SITE: &str = "myaudit-kontrol-dashboard";
const DEFAULT_PUBLIC_DIR: &str = "dist-kontrol";
const DEFAULT_REQUIRED_FILES: [&str; 4] = [
    ".firebaserc",
    "firebase.json",
    "package.json",
    ".github/workflows/firebase-hosting-merge.yml",
];
const PROJECT_PLACEHOLDER: &str = "{project}";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub project_id: String,
    pub required_files: Vec<PathBuf>,
    pub bindings: Vec<Binding>,
    pub build: BuildConfig,
    pub auth: AuthConfig,
    pub timeouts: Timeouts,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            required_files: DEFAULT_REQUIRED_FILES.iter().map(PathBuf::from).collect(),
            bindings: vec![
                Binding {
                    label: "Target Binding".to_string(),
                    file: PathBuf::from(".firebaserc"),
                    format: None,
                    rule: Rule::Contains {
                        value: DEFAULT_SITE.to_string(),
                    },
                },
                Binding {
                    label: "Path Alignment".to_string(),
                    file: PathBuf::from("firebase.json"),
                    format: None,
                    rule: Rule::Equals {
                        field: "hosting.public".to_string(),
                        value: DEFAULT_PUBLIC_DIR.to_string(),
                    },
                },
            ],
            build: BuildConfig::default(),
            auth: AuthConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl AuditConfig {
    /// Auth command arguments with the project placeholder filled in.
    pub fn auth_args(&self) -> Vec<String> {
        self.auth
            .args
            .iter()
            .map(|arg| arg.replace(PROJECT_PLACEHOLDER, &self.project_id))
            .collect()
    }
}

/// An expected association between a configuration file and a value it must carry.
#[derive(Debug, Clone, Deserialize)]
pub struct Binding {
    pub label: String,
    pub file: PathBuf,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(flatten)]
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum Rule {
    /// Some string leaf of the document equals `value`.
    Contains { value: String },
    /// The dotted `field` path resolves to `value`.
    Equals { field: String, value: String },
    /// The dotted `field` path resolves to anything.
    Present { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Infer the format from a file name. Dotfiles ending in `rc` are JSON,
    /// which covers `.firebaserc`.
    pub fn infer(path: &Path) -> Option<Format> {
        let name = path.file_name()?.to_str()?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yml") | Some("yaml") => Some(Format::Yaml),
            Some("toml") => Some(Format::Toml),
            None if name.starts_with('.') && name.ends_with("rc") => Some(Format::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => f.write_str("JSON"),
            Format::Yaml => f.write_str("YAML"),
            Format::Toml => f.write_str("TOML"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Directory the build must leave behind, relative to the audit root.
    pub output_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["run".to_string(), "build:kontrol".to_string()],
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub program: String,
    pub args: Vec<String>,
    pub ci_note: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec![
                "firebase-tools".to_string(),
                "projects:list".to_string(),
                "--project".to_string(),
                PROJECT_PLACEHOLDER.to_string(),
            ],
            ci_note: "In GitHub CI, auth is handled by google-github-actions/auth (WIF)."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub git_secs: u64,
    pub build_secs: u64,
    pub auth_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            git_secs: 30,
            build_secs: 900,
            auth_secs: 120,
        }
    }
}

impl Timeouts {
    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git_secs)
    }

    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_secs(self.auth_secs)
    }
}

/// Load the audit configuration.
///
/// An explicit path must exist. Without one, `<root>/.kontrol-audit.toml` is
/// used when present and the built-in defaults otherwise.
pub async fn load_config(root: &Path, explicit: Option<&Path>) -> Result<AuditConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = root.join(CONFIG_FILE_NAME);
            if !path.exists() {
                tracing::debug!("config: no {} found, using defaults", CONFIG_FILE_NAME);
                return Ok(AuditConfig::default());
            }
            path
        }
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = parse_config(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(config=%path.display(), "config: loaded");
    Ok(cfg)
}

pub fn parse_config(content: &str) -> Result<AuditConfig> {
    Ok(toml::from_str(content)?)
}
