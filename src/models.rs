use serde::{Deserialize, Serialize};

/// Owner of a repository (user or organization)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Identity of the repository a releaser is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub default_branch: String,
}

impl Repository {
    pub fn new(owner: &str, name: &str, default_branch: &str) -> Self {
        Self {
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            owner: Owner {
                login: owner.to_string(),
            },
            default_branch: default_branch.to_string(),
        }
    }
}

/// A label attached to a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Read-only view of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub body: Option<String>,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// A single commit in a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
}

/// Commits between two points in history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitComparison {
    #[serde(default)]
    pub commits: Vec<Commit>,
}

/// Object a reference points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

/// A git reference, e.g. `refs/tags/v1.2.3`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

impl Reference {
    /// Build a tag reference pointing at `sha`
    pub fn tag(tag: &str, sha: impl Into<String>) -> Self {
        Self {
            name: format!("refs/tags/{}", tag),
            object: GitObject { sha: sha.into() },
        }
    }

    /// Tag name with the `refs/tags/` prefix removed
    pub fn tag_name(&self) -> &str {
        self.name.strip_prefix("refs/tags/").unwrap_or(&self.name)
    }

    pub fn sha(&self) -> &str {
        &self.object.sha
    }
}

/// A release record on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_commitish: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub body: Option<String>,
}

/// Payload for creating a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub target_commitish: String,
    pub prerelease: bool,
    pub body: String,
}

/// Partial update of a release; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleasePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A milestone grouping the pull requests of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub state: String,
}
