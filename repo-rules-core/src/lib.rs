#![doc = "repo-rules-core: core logic library for repo-rules."]

//! This crate contains the rule matching, ruleset templating, maintainer
//! extraction and the download/apply pipeline for repo-rules.
//! The GitHub transport itself lives in the `repo-rules` binary crate, which
//! implements [`contract::GithubApi`].
//!
//! # Usage
//! Add this as a dependency for all matching, templating, caching and sync code.

pub mod cache;
pub mod config;
pub mod contract;
pub mod download;
pub mod maintainers;
pub mod matcher;
pub mod parallel;
pub mod ruleset;
pub mod synchronise;
