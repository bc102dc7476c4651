use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};
use thiserror::Error;

use crate::config::LabelsConfig;
use crate::models::{PullRequest, Reference};

static CANDIDATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rc\.(?P<candidate>[0-9]+)$").unwrap());

/// Tag or suffix that does not follow the release naming grammar
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("'{tag}' is not a semantic version: {source}")]
    InvalidTag {
        tag: String,
        #[source]
        source: semver::Error,
    },

    #[error("'{0}' is not a release candidate suffix of the form rc.<n>")]
    InvalidCandidate(String),
}

/// How far to move a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bump {
    Patch,
    Minor,
    Major,
}

impl Bump {
    /// Pick the bump for a set of pull requests: major beats minor beats patch
    pub fn from_pulls(pulls: &[PullRequest], labels: &LabelsConfig) -> Self {
        pulls
            .iter()
            .map(|pull| {
                if pull.has_label(&labels.major) {
                    Bump::Major
                } else if pull.has_label(&labels.minor) {
                    Bump::Minor
                } else {
                    Bump::Patch
                }
            })
            .max()
            .unwrap_or(Bump::Patch)
    }

    /// Apply the bump to `base`. The result never carries a prerelease.
    pub fn apply(self, base: &Version) -> Version {
        match self {
            Bump::Major => Version::new(base.major + 1, 0, 0),
            Bump::Minor => Version::new(base.major, base.minor + 1, 0),
            // 1.2.3-rc.1 already stands for the upcoming 1.2.3
            Bump::Patch if !base.pre.is_empty() => Version::new(base.major, base.minor, base.patch),
            Bump::Patch => Version::new(base.major, base.minor, base.patch + 1),
        }
    }
}

/// Parse a tag such as `v1.2.3` or `v1.2.3-rc.4`
pub fn parse_tag(tag: &str) -> Result<Version, VersionError> {
    let raw = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(raw).map_err(|source| VersionError::InvalidTag {
        tag: tag.to_string(),
        source,
    })
}

/// Tag name for a version (`v` prefix)
pub fn tag_name(version: &Version) -> String {
    format!("v{}", version)
}

pub fn is_candidate(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// The full release a version belongs to, without prerelease or build metadata
pub fn full_release(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}

/// Ref pattern listing every candidate of `version`
pub fn candidate_pattern(version: &Version) -> String {
    format!("tags/v{}-rc.", full_release(version))
}

/// Ref pattern listing the candidates that led up to a published tag
pub fn candidates_of_tag_pattern(tag: &str) -> String {
    format!("tags/{}-rc.", tag)
}

/// Read the ordinal out of an `rc.<n>` suffix
pub fn candidate_number(suffix: &str) -> Result<u64, VersionError> {
    CANDIDATE_REGEX
        .captures(suffix)
        .and_then(|c| c["candidate"].parse().ok())
        .ok_or_else(|| VersionError::InvalidCandidate(suffix.to_string()))
}

/// `version` with prerelease `rc.<n>`
pub fn with_candidate(version: &Version, n: u64) -> Result<Version, VersionError> {
    let suffix = format!("rc.{}", n);
    let mut next = full_release(version);
    next.pre = Prerelease::new(&suffix).map_err(|_| VersionError::InvalidCandidate(suffix))?;
    Ok(next)
}

/// Next unused candidate of `version` given the existing candidate refs.
///
/// Every ref must carry a well-formed `rc.<n>` suffix; malformed tag data is an error.
pub fn next_candidate(version: &Version, refs: &[Reference]) -> Result<Version, VersionError> {
    let prefix = format!("refs/tags/v{}-", full_release(version));

    let mut highest = 0;
    for reference in refs {
        let suffix = reference.name.strip_prefix(&prefix).unwrap_or(&reference.name);
        highest = highest.max(candidate_number(suffix)?);
    }

    let next = highest
        .checked_add(1)
        .ok_or_else(|| VersionError::InvalidCandidate(format!("rc.{}", highest)))?;

    with_candidate(version, next)
}

/// Narrowest tag pattern that can contain the release preceding `version`
pub fn previous_release_pattern(version: &Version) -> String {
    if version.minor == 0 && version.patch == 0 {
        "tags/v".to_string()
    } else if version.patch == 0 {
        format!("tags/v{}.", version.major)
    } else {
        format!("tags/v{}.{}.", version.major, version.minor)
    }
}

/// Greatest full release strictly below `version` among `refs`.
///
/// Tags that do not parse and release candidates are ignored.
pub fn find_previous(version: &Version, refs: &[Reference]) -> Option<(String, Version)> {
    refs.iter()
        .filter_map(|r| {
            let tag = r.tag_name();
            parse_tag(tag).ok().map(|v| (tag.to_string(), v))
        })
        .filter(|(_, v)| !is_candidate(v) && v < version)
        .max_by(|(_, a), (_, b)| a.cmp(b))
}
