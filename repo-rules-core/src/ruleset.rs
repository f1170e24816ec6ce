//! Ruleset templating and merging.
//!
//! A ruleset is a free-form JSON tree from the config. Two string sentinels may
//! appear anywhere in it as a complete value:
//!
//! - `"@maintainers"` becomes the repository's maintainer list (or `null` when
//!   the repository has no manifest);
//! - `"@super-maintainers"` becomes the org-wide super-maintainer list.
//!
//! Substitution walks the tree, so a string that merely contains a sentinel
//! (`"ping @maintainers"`) is left alone and the source tree is never touched.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

pub const MAINTAINERS_PLACEHOLDER: &str = "@maintainers";
pub const SUPER_MAINTAINERS_PLACEHOLDER: &str = "@super-maintainers";

#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("unknown ruleset {0}")]
    Unknown(String),

    #[error("ruleset {0} has no branch_protection mapping")]
    MissingProtection(String),

    #[error("ruleset {0}: required_signatures must be a boolean")]
    InvalidSignatures(String),
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Produce a copy of `ruleset` with the maintainer sentinels replaced.
pub fn instantiate(
    ruleset: &Value,
    maintainers: Option<&[String]>,
    super_maintainers: &[String],
) -> Value {
    match ruleset {
        Value::String(s) if s == MAINTAINERS_PLACEHOLDER => {
            maintainers.map(string_array).unwrap_or(Value::Null)
        }
        Value::String(s) if s == SUPER_MAINTAINERS_PLACEHOLDER => string_array(super_maintainers),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| instantiate(item, maintainers, super_maintainers))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), instantiate(v, maintainers, super_maintainers)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Key whose sequence lists branch names; merging unions it.
pub const BRANCHES_KEY: &str = "branches";

/// Merge rulesets left to right into one effective tree.
///
/// Mappings merge key by key and the later value wins everywhere else, so a
/// later ruleset can narrow a restriction list or replace status checks. The
/// only exception is a `branches` sequence outside `branch_protection`, which
/// is concatenated without duplicates. An empty input yields `{}`.
pub fn merge_rulesets<'a, I>(rulesets: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = Value::Object(Map::new());
    for ruleset in rulesets {
        merge_into(&mut merged, ruleset, false);
    }
    merged
}

fn merge_into(base: &mut Value, overlay: &Value, in_protection: bool) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(Value::Array(names))
                        if !in_protection && key == BRANCHES_KEY && value.is_array() =>
                    {
                        for name in value.as_array().into_iter().flatten() {
                            if !names.contains(name) {
                                names.push(name.clone());
                            }
                        }
                    }
                    Some(existing) => merge_into(
                        existing,
                        value,
                        in_protection || key == "branch_protection",
                    ),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// What gets pushed to one branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchRules {
    /// Body of the update-branch-protection request.
    pub protection: Value,
    /// `Some(true)` requires signed commits, `Some(false)` drops the requirement.
    pub required_signatures: Option<bool>,
}

impl BranchRules {
    /// Split an instantiated ruleset into its protection body and extras.
    pub fn from_ruleset(name: &str, ruleset: &Value) -> Result<Self, RulesetError> {
        let protection = ruleset
            .get("branch_protection")
            .filter(|p| p.is_object())
            .cloned()
            .ok_or_else(|| RulesetError::MissingProtection(name.to_string()))?;
        let required_signatures = match ruleset.get("required_signatures") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => return Err(RulesetError::InvalidSignatures(name.to_string())),
        };
        Ok(Self {
            protection,
            required_signatures,
        })
    }
}

/// Merge the named rulesets, fill in maintainers and split the result.
pub fn build_branch_rules(
    rulesets: &BTreeMap<String, Value>,
    names: &[String],
    maintainers: Option<&[String]>,
    super_maintainers: &[String],
) -> Result<BranchRules, RulesetError> {
    let selected = names
        .iter()
        .map(|name| {
            rulesets
                .get(name)
                .ok_or_else(|| RulesetError::Unknown(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let merged = merge_rulesets(selected);
    let instantiated = instantiate(&merged, maintainers, super_maintainers);
    debug!(rulesets = ?names, ruleset = %instantiated, "Instantiated ruleset");
    BranchRules::from_ruleset(&names.join("+"), &instantiated)
}
