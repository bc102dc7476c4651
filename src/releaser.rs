use semver::Version;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::changelog::collect_changelog;
use crate::config::{Config, ConfigError};
use crate::github::{GithubClient, GithubError, PushEvent, ReleaseEvent};
use crate::models::{Milestone, NewRelease, PullRequest, Reference, Release, ReleasePatch};
use crate::version::{
    candidate_pattern, candidates_of_tag_pattern, find_previous, full_release, is_candidate,
    next_candidate, parse_tag, previous_release_pattern, tag_name, Bump, VersionError,
};

/// Why a release flow stopped
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("failed to {action}: {source}")]
    Upstream {
        action: String,
        #[source]
        source: GithubError,
    },

    #[error("no release precedes {0}")]
    NoPreviousRelease(String),
}

impl ReleaseError {
    /// The event concerns a tag this service does not manage
    pub fn is_parse(&self) -> bool {
        matches!(self, ReleaseError::Version(_))
    }
}

pub(crate) trait UpstreamContext<T> {
    fn upstream(self, action: impl Into<String>) -> Result<T, ReleaseError>;
}

impl<T> UpstreamContext<T> for Result<T, GithubError> {
    fn upstream(self, action: impl Into<String>) -> Result<T, ReleaseError> {
        self.map_err(|source| match source {
            GithubError::InvalidTag(err) => ReleaseError::Version(err),
            source => ReleaseError::Upstream {
                action: action.into(),
                source,
            },
        })
    }
}

/// What a published release means for the candidates of its version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    /// A candidate was published as final: turn it into the full release
    Promote,
    /// A full release was published: remove the candidates that led to it
    Cleanup,
    Ignore,
}

impl ReleaseAction {
    pub fn classify(tag_is_candidate: bool, marked_prerelease: bool) -> Self {
        match (tag_is_candidate, marked_prerelease) {
            (true, false) => ReleaseAction::Promote,
            (false, false) => ReleaseAction::Cleanup,
            (_, true) => ReleaseAction::Ignore,
        }
    }
}

/// Aggregate result of a best-effort batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push was not to the target branch
    Skipped,
    Released(Release),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Skipped(&'static str),
    Promoted {
        release: Release,
        milestone: Milestone,
        attached: BatchOutcome,
    },
    CleanedUp(BatchOutcome),
}

/// Runs the push and release flows for one repository with one policy
pub struct Releaser<C> {
    client: C,
    config: Config,
}

impl<C: GithubClient> Releaser<C> {
    pub fn new(client: C, config: Config) -> Self {
        Self { client, config }
    }

    /// Build a releaser with the policy found at `git_ref`
    pub async fn resolve(client: C, git_ref: &str) -> Result<Self, ReleaseError> {
        let config = Config::resolve(&client, git_ref).await?.into_config();
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create the next release (candidate) for a push to the target branch
    pub async fn handle_push(&self, event: &PushEvent) -> Result<PushOutcome, ReleaseError> {
        if !self.config.matches_branch(&event.git_ref) {
            debug!(git_ref = %event.git_ref, target = %self.config.target_branch, "Not the target branch");
            return Ok(PushOutcome::Skipped);
        }

        let branch = event.branch();
        info!(branch, sha = %event.after, "Target branch pushed, releasing");

        let latest = self
            .client
            .get_latest_tag()
            .await
            .upstream("get latest release")?;

        debug!(base = %latest.tag, head = %event.after, "Finding commits in range");
        let comparison = self
            .client
            .get_commit_range(&latest.tag, &event.after)
            .await
            .upstream("get commit range")?;

        debug!(commits = comparison.commits.len(), "Finding pull requests");
        let pulls = self
            .client
            .get_pulls_in_commit_range(&comparison.commits)
            .await
            .upstream("get pull requests in commit range")?;

        let next = self.increment(&latest.version, &pulls).await?;
        let tag = tag_name(&next);

        debug!(pulls = pulls.len(), "Collecting changelog");
        let changelog = collect_changelog(&pulls);

        self.client
            .create_ref(&Reference::tag(&tag, event.after.as_str()))
            .await
            .upstream(format!("create tag {}", tag))?;

        let release = self
            .client
            .create_release(&NewRelease {
                tag_name: tag.clone(),
                name: next.to_string(),
                target_commitish: branch.to_string(),
                prerelease: self.config.is_pre_release(),
                body: changelog,
            })
            .await
            .upstream(format!("create release {}", tag))?;

        info!(tag = %tag, release_id = release.id, prerelease = release.prerelease, "Release created");

        Ok(PushOutcome::Released(release))
    }

    /// Next version after `base` given the pull requests merged since
    pub async fn increment(
        &self,
        base: &Version,
        pulls: &[PullRequest],
    ) -> Result<Version, ReleaseError> {
        let bump = Bump::from_pulls(pulls, &self.config.labels);
        let next = bump.apply(base);
        debug!(?bump, %base, %next, "Computed version bump");

        if !self.config.is_pre_release() {
            return Ok(next);
        }

        let candidates = self
            .client
            .get_refs(&candidate_pattern(&next))
            .await
            .upstream("list release candidates")?;

        Ok(next_candidate(&next, &candidates)?)
    }

    /// Promote or clean up after a release was published
    pub async fn handle_release(
        &self,
        event: &ReleaseEvent,
    ) -> Result<ReleaseOutcome, ReleaseError> {
        if !event.is_published() {
            return Ok(ReleaseOutcome::Skipped("release was not published"));
        }
        if !self.config.is_pre_release() {
            return Ok(ReleaseOutcome::Skipped("repository does not use release candidates"));
        }

        let release = &event.release;
        let version = parse_tag(&release.tag_name)?;

        match ReleaseAction::classify(is_candidate(&version), release.prerelease) {
            ReleaseAction::Promote => {
                info!(tag = %release.tag_name, "Promoting release");
                let promoted = self.promote(release).await?;
                info!(tag = %promoted.tag_name, "Release promoted");

                let (milestone, attached) = self.assemble_milestone(&promoted).await?;

                Ok(ReleaseOutcome::Promoted {
                    release: promoted,
                    milestone,
                    attached,
                })
            }
            ReleaseAction::Cleanup => {
                info!(tag = %release.tag_name, "Cleaning up release candidates");
                let outcome = self.cleanup_candidates(release).await?;
                Ok(ReleaseOutcome::CleanedUp(outcome))
            }
            ReleaseAction::Ignore => Ok(ReleaseOutcome::Skipped("release is marked as prerelease")),
        }
    }

    /// Tag the commit of a candidate as the full release and rename the release.
    ///
    /// The candidate tag stays in place; target commitish and body are untouched.
    pub async fn promote(&self, release: &Release) -> Result<Release, ReleaseError> {
        let full = full_release(&parse_tag(&release.tag_name)?);
        let full_tag = tag_name(&full);

        let candidate = self
            .client
            .get_ref(&format!("tags/{}", release.tag_name))
            .await
            .upstream(format!("get reference of tag {}", release.tag_name))?;

        debug!(tag = %full_tag, sha = %candidate.sha(), "Creating full release tag");
        self.client
            .create_ref(&Reference::tag(&full_tag, candidate.sha()))
            .await
            .upstream(format!("create tag {}", full_tag))?;

        let promoted = self
            .client
            .edit_release(
                release.id,
                &ReleasePatch {
                    tag_name: Some(full_tag.clone()),
                    name: Some(full.to_string()),
                },
            )
            .await
            .upstream(format!("edit release {}", release.id))?;

        Ok(promoted)
    }

    /// Tag of the greatest full release below `version`
    pub async fn find_previous_release(&self, version: &Version) -> Result<String, ReleaseError> {
        let pattern = previous_release_pattern(version);
        let refs = self
            .client
            .get_refs(&pattern)
            .await
            .upstream(format!("list references matching {}", pattern))?;

        find_previous(version, &refs)
            .map(|(tag, _)| tag)
            .ok_or_else(|| ReleaseError::NoPreviousRelease(tag_name(version)))
    }

    /// Create a closed milestone for a promoted release and attach its pull requests.
    ///
    /// Attaching is best-effort; each failure is logged and counted.
    pub async fn assemble_milestone(
        &self,
        promoted: &Release,
    ) -> Result<(Milestone, BatchOutcome), ReleaseError> {
        let current = parse_tag(&promoted.tag_name)?;
        let previous = self.find_previous_release(&current).await?;

        debug!(base = %previous, head = %promoted.tag_name, "Finding commits in range");
        let comparison = self
            .client
            .get_commit_range(&previous, &promoted.tag_name)
            .await
            .upstream("get commit range")?;

        let pulls = self
            .client
            .get_pulls_in_commit_range(&comparison.commits)
            .await
            .upstream("get pull requests in commit range")?;

        let title = current.to_string();
        let milestone = self
            .client
            .create_milestone(&title)
            .await
            .upstream(format!("create milestone {}", title))?;

        let mut outcome = BatchOutcome::default();
        for pull in &pulls {
            match self.client.add_pr_to_milestone(pull, &milestone).await {
                Ok(()) => outcome.succeeded += 1,
                Err(err) => {
                    warn!(pr = pull.number, milestone = milestone.number, error = %err, "Failed to add pull request to milestone");
                    outcome.failed += 1;
                }
            }
        }

        info!(
            milestone = %milestone.title,
            added = outcome.succeeded,
            failed = outcome.failed,
            "Pull requests added to milestone"
        );

        Ok((milestone, outcome))
    }

    /// Delete the candidate tags and releases superseded by a full release.
    ///
    /// Never touches the triggering release or any release not marked prerelease.
    pub async fn cleanup_candidates(&self, release: &Release) -> Result<BatchOutcome, ReleaseError> {
        let pattern = candidates_of_tag_pattern(&release.tag_name);
        let refs = self
            .client
            .get_refs(&pattern)
            .await
            .upstream(format!("list references matching {}", pattern))?;

        let mut outcome = BatchOutcome::default();
        for reference in &refs {
            let tag = reference.tag_name();

            let candidate = match self.client.get_release_by_tag(tag).await {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(tag, error = %err, "Failed to look up release of candidate, leaving it");
                    outcome.failed += 1;
                    continue;
                }
            };

            let mut removed = true;
            if let Some(candidate) = candidate {
                if candidate.id == release.id || !candidate.prerelease {
                    debug!(tag, release_id = candidate.id, "Keeping release");
                    outcome.skipped += 1;
                    continue;
                }

                if let Err(err) = self.client.delete_release(&candidate).await {
                    warn!(tag, release_id = candidate.id, error = %err, "Failed to delete release. Continuing...");
                    removed = false;
                }
            }

            if let Err(err) = self.client.delete_tag(tag).await {
                warn!(tag, error = %err, "Failed to delete tag. Continuing...");
                removed = false;
            }

            if removed {
                outcome.succeeded += 1;
            } else {
                outcome.failed += 1;
            }
        }

        info!(
            removed = outcome.succeeded,
            kept = outcome.skipped,
            failed = outcome.failed,
            "Release candidates cleaned up"
        );

        Ok(outcome)
    }
}
