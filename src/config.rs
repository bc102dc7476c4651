use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::github::GithubClient;

/// Well-known policy file read from the repository
pub const POLICY_FILE: &str = ".ship-it";

/// Policy file exists but cannot be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse .ship-it: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid .ship-it: {0}")]
    Invalid(String),
}

/// Release strategy of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyType {
    /// Pushes create release candidates that are promoted by hand
    #[default]
    PreRelease,
    /// Pushes create full releases directly
    FullRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub kind: StrategyType,
}

/// Pull request labels that drive the version bump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelsConfig {
    pub major: String,
    pub minor: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            major: "major".to_string(),
            minor: "minor".to_string(),
        }
    }
}

/// Release policy of a single repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub target_branch: String,
    pub labels: LabelsConfig,
    pub strategy: StrategyConfig,
}

/// On-disk shape of `.ship-it`; every key is optional and an explicit null
/// means the same as leaving the key out
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PolicyFile {
    target_branch: Option<String>,
    labels: Option<LabelsFile>,
    strategy: Option<StrategyFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelsFile {
    major: Option<String>,
    minor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StrategyFile {
    #[serde(rename = "type")]
    kind: Option<StrategyType>,
}

/// Outcome of looking up the policy of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `.ship-it` was found and is valid
    Loaded(Config),
    /// No usable `.ship-it`; defaults apply
    Defaulted(Config),
}

impl Resolution {
    pub fn into_config(self) -> Config {
        match self {
            Resolution::Loaded(c) | Resolution::Defaulted(c) => c,
        }
    }
}

impl Config {
    /// Default policy for a repository whose default branch is `default_branch`
    pub fn defaults(default_branch: &str) -> Self {
        Self {
            target_branch: default_branch.to_string(),
            labels: LabelsConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }

    /// Parse and validate the contents of a policy file
    pub fn from_yaml(content: &[u8], default_branch: &str) -> Result<Self, ConfigError> {
        let file: PolicyFile = if content.iter().all(u8::is_ascii_whitespace) {
            PolicyFile::default()
        } else {
            serde_yaml::from_slice::<Option<PolicyFile>>(content)?.unwrap_or_default()
        };

        let labels = file.labels.unwrap_or_default();
        let defaults = LabelsConfig::default();
        let strategy = file.strategy.unwrap_or_default();

        let config = Self {
            target_branch: file
                .target_branch
                .unwrap_or_else(|| default_branch.to_string()),
            labels: LabelsConfig {
                major: labels.major.unwrap_or(defaults.major),
                minor: labels.minor.unwrap_or(defaults.minor),
            },
            strategy: StrategyConfig {
                kind: strategy.kind.unwrap_or_default(),
            },
        };
        config.validate()?;

        Ok(config)
    }

    /// Look up the policy file at `git_ref`.
    ///
    /// A missing or unreadable file yields the defaults; a file that exists but
    /// does not parse or validate is an error.
    pub async fn resolve<C>(client: &C, git_ref: &str) -> Result<Resolution, ConfigError>
    where
        C: GithubClient + ?Sized,
    {
        let default_branch = &client.repo().default_branch;

        match client.get_file(git_ref, POLICY_FILE).await {
            Ok(Some(content)) => {
                let config = Self::from_yaml(&content, default_branch)?;
                info!(git_ref, strategy = ?config.strategy.kind, "Loaded repository policy");
                Ok(Resolution::Loaded(config))
            }
            Ok(None) => {
                debug!(git_ref, "No policy file, using defaults");
                Ok(Resolution::Defaulted(Self::defaults(default_branch)))
            }
            Err(err) => {
                warn!(git_ref, error = %err, "Could not read policy file, using defaults");
                Ok(Resolution::Defaulted(Self::defaults(default_branch)))
            }
        }
    }

    /// Load a policy file from local disk
    pub fn load(path: impl AsRef<Path>, default_branch: &str) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let content = fs::read(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content, default_branch)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.target_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("targetBranch must not be empty".to_string()));
        }
        if self.labels.major.is_empty() || self.labels.minor.is_empty() {
            return Err(ConfigError::Invalid("label names must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn is_pre_release(&self) -> bool {
        self.strategy.kind == StrategyType::PreRelease
    }

    /// Check whether a pushed ref is the target branch
    pub fn matches_branch(&self, git_ref: &str) -> bool {
        git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref) == self.target_branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::FakeGithub;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::defaults("main");
        assert_eq!(config.target_branch, "main");
        assert_eq!(config.labels.major, "major");
        assert_eq!(config.labels.minor, "minor");
        assert!(config.is_pre_release());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
targetBranch: release
labels:
  major: breaking
strategy:
  type: full-release
"#;

        let config = Config::from_yaml(yaml.as_bytes(), "main").unwrap();
        assert_eq!(config.target_branch, "release");
        assert_eq!(config.labels.major, "breaking");
        assert_eq!(config.labels.minor, "minor");
        assert_eq!(config.strategy.kind, StrategyType::FullRelease);
        assert!(!config.is_pre_release());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(b"labels:\n  minor: feature\n", "trunk").unwrap();
        assert_eq!(config.target_branch, "trunk");
        assert_eq!(config.labels.minor, "feature");
        assert_eq!(config.strategy.kind, StrategyType::PreRelease);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_yaml(b"", "main").unwrap(), Config::defaults("main"));
        assert_eq!(Config::from_yaml(b"\n  \n", "main").unwrap(), Config::defaults("main"));
    }

    #[test]
    fn test_null_sections_keep_defaults() {
        let yaml = "targetBranch: ~\nlabels: ~\nstrategy:\n  type: ~\n";
        assert_eq!(Config::from_yaml(yaml.as_bytes(), "main").unwrap(), Config::defaults("main"));

        let config = Config::from_yaml(b"labels:\n  major: ~\n  minor: feature\n", "main").unwrap();
        assert_eq!(config.labels.major, "major");
        assert_eq!(config.labels.minor, "feature");
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = Config::from_yaml(b"strategy:\n  type: nightly\n", "main").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_target_branch_rejected() {
        let err = Config::from_yaml(b"targetBranch: \"\"\n", "main").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(Config::from_yaml(b"targetBranch: [unclosed\n", "main").is_err());
    }

    #[test]
    fn test_matches_branch() {
        let config = Config::defaults("main");
        assert!(config.matches_branch("refs/heads/main"));
        assert!(config.matches_branch("main"));
        assert!(!config.matches_branch("refs/heads/feature"));
        assert!(!config.matches_branch("refs/tags/main"));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "targetBranch: develop").unwrap();

        let config = Config::load(file.path(), "main").unwrap();
        assert_eq!(config.target_branch, "develop");
    }

    #[tokio::test]
    async fn test_resolve_missing_file_defaults() {
        let github = FakeGithub::new();
        let resolution = Config::resolve(&github, "abc").await.unwrap();
        assert_eq!(resolution, Resolution::Defaulted(Config::defaults("main")));
    }

    #[tokio::test]
    async fn test_resolve_unreadable_file_defaults() {
        let github = FakeGithub::new();
        github.fail("get_file");
        let resolution = Config::resolve(&github, "abc").await.unwrap();
        assert!(matches!(resolution, Resolution::Defaulted(_)));
    }

    #[tokio::test]
    async fn test_resolve_loaded() {
        let github = FakeGithub::new();
        github.add_file("abc", POLICY_FILE, "strategy:\n  type: full-release\n");
        let resolution = Config::resolve(&github, "abc").await.unwrap();
        assert!(matches!(resolution, Resolution::Loaded(_)));
        assert!(!resolution.into_config().is_pre_release());
    }

    #[tokio::test]
    async fn test_resolve_invalid_file_errors() {
        let github = FakeGithub::new();
        github.add_file("abc", POLICY_FILE, "strategy:\n  type: sometimes\n");
        assert!(Config::resolve(&github, "abc").await.is_err());
    }
}
