use std::collections::HashSet;

use async_trait::async_trait;
use octocrab::params::repos::Reference as RefParam;
use octocrab::{Octocrab, Page};
use serde::Serialize;
use tracing::{debug, info};

use super::{GithubClient, GithubError, LatestTag};
use crate::models::{
    Commit, CommitComparison, Milestone, NewRelease, PullRequest, Reference, Release,
    ReleasePatch, Repository,
};
use crate::version::parse_tag;

/// Only the first commits of a range are inspected for pull requests
const MAX_COMMITS_SCANNED: usize = 100;

const PAGE_SIZE: u8 = 100;

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateMilestoneBody<'a> {
    title: &'a str,
    state: &'a str,
}

#[derive(Serialize)]
struct IssueMilestoneBody {
    milestone: u64,
}

/// GitHub REST client bound to one repository
pub struct OctocrabClient {
    client: Octocrab,
    repo: Repository,
}

impl OctocrabClient {
    pub fn new(client: Octocrab, repo: Repository) -> Self {
        Self { client, repo }
    }

    fn route(&self, path: &str) -> String {
        format!("/repos/{}/{}/{}", self.repo.owner.login, self.repo.name, path)
    }

    async fn all_pages<T>(&self, route: String) -> Result<Vec<T>, GithubError>
    where
        T: serde::de::DeserializeOwned,
    {
        let first: Page<T> = self
            .client
            .get(route, Some(&PageParams { per_page: PAGE_SIZE }))
            .await?;
        let items = self.client.all_pages(first).await?;
        Ok(items)
    }
}

#[async_trait]
impl GithubClient for OctocrabClient {
    fn repo(&self) -> &Repository {
        &self.repo
    }

    async fn get_latest_tag(&self) -> Result<LatestTag, GithubError> {
        let release: Release = self
            .client
            .get(self.route("releases/latest"), None::<&()>)
            .await?;

        let version = parse_tag(&release.tag_name)?;
        debug!(tag = %release.tag_name, %version, "Found latest release");

        Ok(LatestTag {
            tag: release.tag_name,
            version,
        })
    }

    async fn get_commit_range(
        &self,
        base: &str,
        head: &str,
    ) -> Result<CommitComparison, GithubError> {
        let comparison: CommitComparison = self
            .client
            .get(self.route(&format!("compare/{}...{}", base, head)), None::<&()>)
            .await?;

        debug!(base, head, commits = comparison.commits.len(), "Compared commits");

        Ok(comparison)
    }

    async fn get_pulls_in_commit_range(
        &self,
        commits: &[Commit],
    ) -> Result<Vec<PullRequest>, GithubError> {
        let mut seen = HashSet::new();
        let mut pulls = Vec::new();

        for commit in commits.iter().take(MAX_COMMITS_SCANNED) {
            let found: Vec<PullRequest> = self
                .all_pages(self.route(&format!("commits/{}/pulls", commit.sha)))
                .await?;

            for pull in found {
                if seen.insert(pull.number) {
                    pulls.push(pull);
                }
            }
        }

        debug!(commits = commits.len(), pulls = pulls.len(), "Collected pull requests");

        Ok(pulls)
    }

    async fn get_refs(&self, pattern: &str) -> Result<Vec<Reference>, GithubError> {
        self.all_pages(self.route(&format!("git/matching-refs/{}", pattern)))
            .await
    }

    async fn get_ref(&self, name: &str) -> Result<Reference, GithubError> {
        let reference = self
            .client
            .get(self.route(&format!("git/ref/{}", name)), None::<&()>)
            .await?;
        Ok(reference)
    }

    async fn create_ref(&self, reference: &Reference) -> Result<Reference, GithubError> {
        info!(reference = %reference.name, sha = %reference.sha(), "Creating reference");

        let body = CreateRefBody {
            name: &reference.name,
            sha: reference.sha(),
        };
        let created = self.client.post(self.route("git/refs"), Some(&body)).await?;
        Ok(created)
    }

    async fn create_release(&self, release: &NewRelease) -> Result<Release, GithubError> {
        info!(tag = %release.tag_name, prerelease = release.prerelease, "Creating release");

        let created = self.client.post(self.route("releases"), Some(release)).await?;
        Ok(created)
    }

    async fn edit_release(&self, id: u64, patch: &ReleasePatch) -> Result<Release, GithubError> {
        info!(release_id = id, "Editing release");

        let edited = self
            .client
            .patch(self.route(&format!("releases/{}", id)), Some(patch))
            .await?;
        Ok(edited)
    }

    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>, GithubError> {
        let result: Result<Release, GithubError> = self
            .client
            .get(self.route(&format!("releases/tags/{}", tag)), None::<&()>)
            .await
            .map_err(GithubError::from);

        match result {
            Ok(release) => Ok(Some(release)),
            Err(err) if err.is_not_found() => {
                debug!(tag, "No release for tag");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn delete_release(&self, release: &Release) -> Result<(), GithubError> {
        info!(release_id = release.id, tag = %release.tag_name, "Deleting release");

        self.client
            .repos(&self.repo.owner.login, &self.repo.name)
            .releases()
            .delete(release.id)
            .await?;
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<(), GithubError> {
        info!(tag, "Deleting tag");

        self.client
            .repos(&self.repo.owner.login, &self.repo.name)
            .delete_ref(&RefParam::Tag(tag.to_string()))
            .await?;
        Ok(())
    }

    async fn create_milestone(&self, title: &str) -> Result<Milestone, GithubError> {
        info!(title, "Creating milestone");

        let body = CreateMilestoneBody {
            title,
            state: "closed",
        };
        let milestone = self.client.post(self.route("milestones"), Some(&body)).await?;
        Ok(milestone)
    }

    async fn add_pr_to_milestone(
        &self,
        pull: &PullRequest,
        milestone: &Milestone,
    ) -> Result<(), GithubError> {
        debug!(pr = pull.number, milestone = milestone.number, "Adding pull request to milestone");

        let _: serde_json::Value = self
            .client
            .patch(
                self.route(&format!("issues/{}", pull.number)),
                Some(&IssueMilestoneBody {
                    milestone: milestone.number,
                }),
            )
            .await?;
        Ok(())
    }

    async fn get_file(&self, git_ref: &str, path: &str) -> Result<Option<Vec<u8>>, GithubError> {
        let result = self
            .client
            .repos(&self.repo.owner.login, &self.repo.name)
            .get_content()
            .path(path)
            .r#ref(git_ref)
            .send()
            .await
            .map_err(GithubError::from);

        let mut content = match result {
            Ok(content) => content,
            Err(err) if err.is_not_found() => {
                debug!(path, git_ref, "File not found");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let items = content.take_items();
        match items.first() {
            Some(item) => {
                let decoded = item.decoded_content().ok_or_else(|| {
                    GithubError::Upstream(format!("failed to decode contents of {}", path))
                })?;
                Ok(Some(decoded.into_bytes()))
            }
            None => Ok(None),
        }
    }
}
