//! In-memory GitHub used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GithubClient, GithubError, LatestTag};
use crate::models::{
    Commit, CommitComparison, Milestone, NewRelease, PullRequest, Reference, Release,
    ReleasePatch, Repository,
};
use crate::version::parse_tag;

#[derive(Default)]
struct State {
    refs: Vec<Reference>,
    releases: Vec<Release>,
    latest: Option<String>,
    commits: Vec<Commit>,
    pulls: Vec<PullRequest>,
    files: HashMap<(String, String), Vec<u8>>,
    milestones: Vec<Milestone>,
    milestone_pulls: Vec<(u64, u64)>,
    failing: HashSet<String>,
    failing_items: HashSet<String>,
    next_id: u64,
    calls: Vec<String>,
}

pub struct FakeGithub {
    repo: Repository,
    state: Mutex<State>,
}

impl FakeGithub {
    pub fn new() -> Self {
        Self {
            repo: Repository::new("octo", "widgets", "main"),
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    /// Make every call of `operation` fail
    pub fn fail(&self, operation: &str) {
        self.state.lock().unwrap().failing.insert(operation.to_string());
    }

    /// Make `operation` fail for one item, e.g. `("delete_tag", "v1.0.0-rc.1")`
    pub fn fail_item(&self, operation: &str, item: impl ToString) {
        self.state
            .lock()
            .unwrap()
            .failing_items
            .insert(format!("{}:{}", operation, item.to_string()));
    }

    pub fn add_tag(&self, tag: &str, sha: &str) {
        self.state.lock().unwrap().refs.push(Reference::tag(tag, sha));
    }

    pub fn add_release(&self, id: u64, tag: &str, prerelease: bool) -> Release {
        let release = Release {
            id,
            tag_name: tag.to_string(),
            name: Some(tag.trim_start_matches('v').to_string()),
            target_commitish: "main".to_string(),
            prerelease,
            body: Some("Changes:\n\n".to_string()),
        };
        self.state.lock().unwrap().releases.push(release.clone());
        release
    }

    pub fn set_latest(&self, tag: &str) {
        self.state.lock().unwrap().latest = Some(tag.to_string());
    }

    pub fn set_commits(&self, shas: &[&str]) {
        self.state.lock().unwrap().commits = shas
            .iter()
            .map(|s| Commit { sha: s.to_string() })
            .collect();
    }

    pub fn add_pull(&self, pull: PullRequest) {
        self.state.lock().unwrap().pulls.push(pull);
    }

    pub fn add_file(&self, git_ref: &str, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert((git_ref.to_string(), path.to_string()), content.as_bytes().to_vec());
    }

    pub fn tags(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.refs.iter().map(|r| r.tag_name().to_string()).collect()
    }

    pub fn tag_sha(&self, tag: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .refs
            .iter()
            .find(|r| r.tag_name() == tag)
            .map(|r| r.sha().to_string())
    }

    pub fn releases(&self) -> Vec<Release> {
        self.state.lock().unwrap().releases.clone()
    }

    /// Pull request numbers attached to the milestone with `number`
    pub fn milestone_pulls(&self, number: u64) -> Vec<u64> {
        let state = self.state.lock().unwrap();
        state
            .milestone_pulls
            .iter()
            .filter(|(m, _)| *m == number)
            .map(|(_, pr)| *pr)
            .collect()
    }

    /// Names of the operations called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Whether any call has mutated remote state
    pub fn mutated(&self) -> bool {
        const MUTATIONS: [&str; 7] = [
            "create_ref",
            "create_release",
            "edit_release",
            "delete_release",
            "delete_tag",
            "create_milestone",
            "add_pr_to_milestone",
        ];
        self.calls().iter().any(|c| MUTATIONS.contains(&c.as_str()))
    }

    fn enter(&self, operation: &str, item: Option<&str>) -> Result<(), GithubError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());

        let item_failed = item
            .map(|i| state.failing_items.contains(&format!("{}:{}", operation, i)))
            .unwrap_or(false);

        if state.failing.contains(operation) || item_failed {
            return Err(GithubError::Upstream(format!("{} failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl GithubClient for FakeGithub {
    fn repo(&self) -> &Repository {
        &self.repo
    }

    async fn get_latest_tag(&self) -> Result<LatestTag, GithubError> {
        self.enter("get_latest_tag", None)?;
        let tag = self
            .state
            .lock()
            .unwrap()
            .latest
            .clone()
            .ok_or_else(|| GithubError::NotFound("latest release".to_string()))?;
        let version = parse_tag(&tag)?;
        Ok(LatestTag { tag, version })
    }

    async fn get_commit_range(
        &self,
        base: &str,
        _head: &str,
    ) -> Result<CommitComparison, GithubError> {
        self.enter("get_commit_range", Some(base))?;
        Ok(CommitComparison {
            commits: self.state.lock().unwrap().commits.clone(),
        })
    }

    async fn get_pulls_in_commit_range(
        &self,
        _commits: &[Commit],
    ) -> Result<Vec<PullRequest>, GithubError> {
        self.enter("get_pulls_in_commit_range", None)?;
        let mut seen = HashSet::new();
        let pulls = self.state.lock().unwrap().pulls.clone();
        Ok(pulls.into_iter().filter(|p| seen.insert(p.number)).collect())
    }

    async fn get_refs(&self, pattern: &str) -> Result<Vec<Reference>, GithubError> {
        self.enter("get_refs", Some(pattern))?;
        let prefix = format!("refs/{}", pattern);
        let state = self.state.lock().unwrap();
        Ok(state
            .refs
            .iter()
            .filter(|r| r.name.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn get_ref(&self, name: &str) -> Result<Reference, GithubError> {
        self.enter("get_ref", Some(name))?;
        let full = format!("refs/{}", name);
        let state = self.state.lock().unwrap();
        state
            .refs
            .iter()
            .find(|r| r.name == full)
            .cloned()
            .ok_or_else(|| GithubError::NotFound(full))
    }

    async fn create_ref(&self, reference: &Reference) -> Result<Reference, GithubError> {
        self.enter("create_ref", Some(reference.tag_name()))?;
        let mut state = self.state.lock().unwrap();
        if state.refs.iter().any(|r| r.name == reference.name) {
            return Err(GithubError::Upstream("Reference already exists".to_string()));
        }
        state.refs.push(reference.clone());
        Ok(reference.clone())
    }

    async fn create_release(&self, release: &NewRelease) -> Result<Release, GithubError> {
        self.enter("create_release", Some(&release.tag_name))?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = Release {
            id: state.next_id,
            tag_name: release.tag_name.clone(),
            name: Some(release.name.clone()),
            target_commitish: release.target_commitish.clone(),
            prerelease: release.prerelease,
            body: Some(release.body.clone()),
        };
        state.releases.push(created.clone());
        Ok(created)
    }

    async fn edit_release(&self, id: u64, patch: &ReleasePatch) -> Result<Release, GithubError> {
        self.enter("edit_release", Some(&id.to_string()))?;
        let mut state = self.state.lock().unwrap();
        let release = state
            .releases
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GithubError::NotFound(format!("release {}", id)))?;
        if let Some(tag) = &patch.tag_name {
            release.tag_name = tag.clone();
        }
        if let Some(name) = &patch.name {
            release.name = Some(name.clone());
        }
        Ok(release.clone())
    }

    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>, GithubError> {
        self.enter("get_release_by_tag", Some(tag))?;
        let state = self.state.lock().unwrap();
        Ok(state.releases.iter().find(|r| r.tag_name == tag).cloned())
    }

    async fn delete_release(&self, release: &Release) -> Result<(), GithubError> {
        self.enter("delete_release", Some(&release.id.to_string()))?;
        self.state.lock().unwrap().releases.retain(|r| r.id != release.id);
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<(), GithubError> {
        self.enter("delete_tag", Some(tag))?;
        self.state.lock().unwrap().refs.retain(|r| r.tag_name() != tag);
        Ok(())
    }

    async fn create_milestone(&self, title: &str) -> Result<Milestone, GithubError> {
        self.enter("create_milestone", Some(title))?;
        let mut state = self.state.lock().unwrap();
        let milestone = Milestone {
            number: state.milestones.len() as u64 + 1,
            title: title.to_string(),
            state: "closed".to_string(),
        };
        state.milestones.push(milestone.clone());
        Ok(milestone)
    }

    async fn add_pr_to_milestone(
        &self,
        pull: &PullRequest,
        milestone: &Milestone,
    ) -> Result<(), GithubError> {
        self.enter("add_pr_to_milestone", Some(&pull.number.to_string()))?;
        self.state
            .lock()
            .unwrap()
            .milestone_pulls
            .push((milestone.number, pull.number));
        Ok(())
    }

    async fn get_file(&self, git_ref: &str, path: &str) -> Result<Option<Vec<u8>>, GithubError> {
        self.enter("get_file", Some(path))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .get(&(git_ref.to_string(), path.to_string()))
            .cloned())
    }
}
