//! Repository to rule-group matching.
//!
//! Rule groups are tried in config order and the first one that applies to a
//! repository wins. A group applies when one of its `include` patterns matches
//! and none of its `exclude` patterns does. Patterns are anchored at the start
//! of the repository name only, so `^foo`, `foo` and `foo.*` all match
//! `foobar`; add `$` to require a full match.

use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::config::RuleGroup;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid pattern {pattern:?} in repositories[{group}]: {source}")]
    InvalidPattern {
        group: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    fn compile(group: usize, source: &str) -> Result<Self, MatchError> {
        let regex =
            Regex::new(&format!("^(?:{source})")).map_err(|e| MatchError::InvalidPattern {
                group,
                pattern: source.to_string(),
                source: e,
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

/// A rule group with its patterns compiled once per run.
pub struct CompiledRuleGroup<'a> {
    pub index: usize,
    pub group: &'a RuleGroup,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl<'a> CompiledRuleGroup<'a> {
    pub fn compile(index: usize, group: &'a RuleGroup) -> Result<Self, MatchError> {
        let include = group
            .include
            .iter()
            .map(|p| Pattern::compile(index, p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = group
            .exclude
            .iter()
            .map(|p| Pattern::compile(index, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index,
            group,
            include,
            exclude,
        })
    }

    /// The first include pattern matching `repo`.
    pub fn included_by(&self, repo: &str) -> Option<&str> {
        first_match(&self.include, repo)
    }

    /// The first exclude pattern matching `repo`.
    pub fn excluded_by(&self, repo: &str) -> Option<&str> {
        first_match(&self.exclude, repo)
    }

    pub fn applies_to(&self, repo: &str) -> bool {
        let included = self.included_by(repo);
        let excluded = self.excluded_by(repo);

        if let Some(rule) = excluded {
            info!(repo, group = self.index, rule, "Repo was excluded by rule");
        }
        if let Some(rule) = included {
            info!(repo, group = self.index, rule, "Repo was included by rule");
        }

        included.is_some() && excluded.is_none()
    }
}

fn first_match<'p>(patterns: &'p [Pattern], repo: &str) -> Option<&'p str> {
    patterns
        .iter()
        .find(|p| p.regex.is_match(repo))
        .map(|p| p.source.as_str())
}

/// Compile every group, failing on the first malformed pattern.
pub fn compile_rule_groups(groups: &[RuleGroup]) -> Result<Vec<CompiledRuleGroup<'_>>, MatchError> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| CompiledRuleGroup::compile(index, group))
        .collect()
}

/// The rule group a repository matched, with its position in the config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepoMatch<'a> {
    pub index: usize,
    pub group: &'a RuleGroup,
}

/// Map every repository to the first rule group that applies to it.
///
/// Repositories matching no group are left out of the result.
pub fn match_repos_rules<'a, I, S>(
    groups: &[CompiledRuleGroup<'a>],
    repos: I,
) -> BTreeMap<String, RepoMatch<'a>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut matched = BTreeMap::new();
    for repo in repos {
        let repo = repo.as_ref();
        if let Some(winner) = groups.iter().find(|g| g.applies_to(repo)) {
            matched.insert(
                repo.to_string(),
                RepoMatch {
                    index: winner.index,
                    group: winner.group,
                },
            );
        }
    }
    info!(matched = matched.len(), "Matched repositories to rule groups");
    matched
}

/// Compile `groups` and match `repos` against them in one step.
pub fn match_repos<'a, I, S>(
    groups: &'a [RuleGroup],
    repos: I,
) -> Result<BTreeMap<String, RepoMatch<'a>>, MatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let compiled = compile_rule_groups(groups)?;
    Ok(match_repos_rules(&compiled, repos))
}
