pub mod app;
pub mod client;
pub mod events;
#[cfg(test)]
pub mod fake;

pub use app::{AppClientFactory, ClientFactory};
pub use client::OctocrabClient;
pub use events::{Installation, PushEvent, ReleaseEvent, WebhookEvent};

use async_trait::async_trait;
use semver::Version;
use thiserror::Error;

use crate::models::{
    Commit, CommitComparison, Milestone, NewRelease, PullRequest, Reference, Release,
    ReleasePatch, Repository,
};
use crate::version::VersionError;

/// Failure talking to GitHub
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("GitHub API request failed: {0}")]
    Api(#[source] octocrab::Error),

    #[error("latest release has an invalid tag: {0}")]
    InvalidTag(#[from] VersionError),

    #[error("{0}")]
    Upstream(String),
}

impl GithubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::NotFound(_))
    }
}

impl From<octocrab::Error> for GithubError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. }
                if source.status_code == reqwest::StatusCode::NOT_FOUND =>
            {
                GithubError::NotFound(source.message)
            }
            other => GithubError::Api(other),
        }
    }
}

/// Latest full release tag and its parsed version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestTag {
    pub tag: String,
    pub version: Version,
}

/// Operations the releaser needs from GitHub, bound to a single repository
#[async_trait]
pub trait GithubClient: Send + Sync {
    /// Repository this client is bound to
    fn repo(&self) -> &Repository;

    /// Tag of the latest published (non-prerelease) release
    async fn get_latest_tag(&self) -> Result<LatestTag, GithubError>;

    async fn get_commit_range(&self, base: &str, head: &str)
        -> Result<CommitComparison, GithubError>;

    /// Pull requests associated with any of `commits`, de-duplicated by number
    async fn get_pulls_in_commit_range(
        &self,
        commits: &[Commit],
    ) -> Result<Vec<PullRequest>, GithubError>;

    /// All references whose name starts with `refs/<pattern>`, across every page
    async fn get_refs(&self, pattern: &str) -> Result<Vec<Reference>, GithubError>;

    /// A single reference, e.g. `tags/v1.2.3`
    async fn get_ref(&self, name: &str) -> Result<Reference, GithubError>;

    async fn create_ref(&self, reference: &Reference) -> Result<Reference, GithubError>;

    async fn create_release(&self, release: &NewRelease) -> Result<Release, GithubError>;

    async fn edit_release(&self, id: u64, patch: &ReleasePatch) -> Result<Release, GithubError>;

    /// Release for a tag, `None` if the tag has no release
    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>, GithubError>;

    async fn delete_release(&self, release: &Release) -> Result<(), GithubError>;

    async fn delete_tag(&self, tag: &str) -> Result<(), GithubError>;

    /// Create a closed milestone
    async fn create_milestone(&self, title: &str) -> Result<Milestone, GithubError>;

    async fn add_pr_to_milestone(
        &self,
        pull: &PullRequest,
        milestone: &Milestone,
    ) -> Result<(), GithubError>;

    /// Raw file contents at `git_ref`, `None` if the file does not exist
    async fn get_file(&self, git_ref: &str, path: &str) -> Result<Option<Vec<u8>>, GithubError>;
}
