//! Path inclusion predicates
//!
//! The core treats directory filters as an opaque [`PathFilter`]. Discovery
//! configuration usually supplies a [`DirectoryFilter`] built from
//! include/exclude rules, each naming a subdirectory and an optional glob.

use crate::{Error, Result};
use drift_fs::RelativePath;
use glob::Pattern;
use serde::{Deserialize, Serialize};

/// Decides whether a path participates in drift detection.
pub trait PathFilter: Send + Sync {
    fn includes(&self, path: &RelativePath) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&RelativePath) -> bool + Send + Sync,
{
    fn includes(&self, path: &RelativePath) -> bool {
        self(path)
    }
}

/// Filter that admits every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl PathFilter for AcceptAll {
    fn includes(&self, _path: &RelativePath) -> bool {
        true
    }
}

/// A subdirectory plus optional glob, matched relative to that subdirectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr", into = "RuleRepr")]
pub struct FilterRule {
    path: String,
    pattern: Option<Pattern>,
}

impl FilterRule {
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] if `pattern` is not a valid glob.
    pub fn new(path: impl Into<String>, pattern: Option<&str>) -> Result<Self> {
        let path = path.into().replace('\\', "/");
        let path = path.trim_matches('/').to_string();
        let pattern = pattern
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::InvalidFilter {
                    pattern: p.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self { path, pattern })
    }

    /// Parse the `dir:glob` shorthand used on the command line. A rule with
    /// no colon is a glob relative to the base.
    pub fn parse(spec: &str) -> Result<Self> {
        match spec.split_once(':') {
            Some((path, pattern)) if !pattern.is_empty() => Self::new(path, Some(pattern)),
            Some((path, _)) => Self::new(path, None),
            None => Self::new("", Some(spec)),
        }
    }

    pub fn matches(&self, path: &RelativePath) -> bool {
        if !path.is_within(&self.path) {
            return false;
        }
        let Some(pattern) = &self.pattern else {
            return true;
        };
        let rest = if self.path.is_empty() || self.path == "." {
            path.as_str()
        } else {
            &path.as_str()[self.path.len() + 1..]
        };
        pattern.matches(rest)
    }
}

#[derive(Serialize, Deserialize)]
struct RuleRepr {
    #[serde(default)]
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
}

impl TryFrom<RuleRepr> for FilterRule {
    type Error = Error;

    fn try_from(repr: RuleRepr) -> Result<Self> {
        Self::new(repr.path, repr.pattern.as_deref())
    }
}

impl From<FilterRule> for RuleRepr {
    fn from(rule: FilterRule) -> Self {
        Self {
            path: rule.path,
            pattern: rule.pattern.map(|p| p.as_str().to_string()),
        }
    }
}

/// Include/exclude rules for one monitored directory.
///
/// With no includes every path is a candidate; otherwise a path must match
/// at least one include. Any matching exclude removes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<FilterRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<FilterRule>,
}

impl DirectoryFilter {
    pub fn new(includes: Vec<FilterRule>, excludes: Vec<FilterRule>) -> Self {
        Self { includes, excludes }
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

impl PathFilter for DirectoryFilter {
    fn includes(&self, path: &RelativePath) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|r| r.matches(path));
        included && !self.excludes.iter().any(|r| r.matches(path))
    }
}
