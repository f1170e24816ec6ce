use repo_rules_core::ruleset::{
    build_branch_rules, instantiate, merge_rulesets, BranchRules, RulesetError,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_instantiate_replaces_sentinels_and_keeps_the_rest() {
    let ruleset = json!({
        "branch_protection": {
            "enforce_admins": true,
            "required_pull_request_reviews": {
                "required_approving_review_count": 1,
                "bypass_pull_request_allowances": { "users": "@maintainers" }
            },
            "restrictions": { "users": "@super-maintainers", "teams": [] }
        }
    });
    let before = ruleset.clone();
    let maintainers = strings(&["a", "b"]);
    let supers = strings(&["root"]);

    let out = instantiate(&ruleset, Some(maintainers.as_slice()), &supers);

    assert_eq!(
        out["branch_protection"]["required_pull_request_reviews"]["bypass_pull_request_allowances"]
            ["users"],
        json!(["a", "b"])
    );
    assert_eq!(out["branch_protection"]["restrictions"]["users"], json!(["root"]));
    assert_eq!(out["branch_protection"]["restrictions"]["teams"], json!([]));
    assert_eq!(out["branch_protection"]["enforce_admins"], json!(true));
    assert_eq!(
        out["branch_protection"]["required_pull_request_reviews"]["required_approving_review_count"],
        json!(1)
    );
    assert_eq!(ruleset, before, "the source ruleset must not change");
}

#[test]
fn test_instantiate_only_replaces_whole_values() {
    let ruleset = json!({
        "note": "ping @maintainers please",
        "quoted": "\"@maintainers\"",
        "@maintainers": "kept as a key",
        "list": ["@maintainers", "x", ["@super-maintainers"]]
    });
    let maintainers = strings(&["alice"]);
    let supers = strings(&["boss"]);

    let out = instantiate(&ruleset, Some(maintainers.as_slice()), &supers);

    assert_eq!(out["note"], json!("ping @maintainers please"));
    assert_eq!(out["quoted"], json!("\"@maintainers\""));
    assert_eq!(out["@maintainers"], json!("kept as a key"));
    assert_eq!(out["list"], json!([["alice"], "x", [["boss"]]]));
}

#[test]
fn test_instantiate_without_manifest_gives_null() {
    let ruleset = json!({ "users": "@maintainers", "admins": "@super-maintainers" });

    let out = instantiate(&ruleset, None, &[]);

    assert_eq!(out, json!({ "users": null, "admins": [] }));
}

#[test]
fn test_merge_rulesets_policy() {
    let base = json!({
        "branch_protection": {
            "enforce_admins": false,
            "required_status_checks": { "strict": false, "contexts": ["build"] },
            "restrictions": null
        },
        "required_signatures": false
    });
    let strict = json!({
        "branch_protection": {
            "enforce_admins": true,
            "required_status_checks": { "contexts": ["build", "lint"] },
            "required_linear_history": true
        },
        "required_signatures": true
    });

    let merged = merge_rulesets([&base, &strict]);

    assert_eq!(
        merged,
        json!({
            "branch_protection": {
                "enforce_admins": true,
                "required_status_checks": { "strict": false, "contexts": ["build", "lint"] },
                "restrictions": null,
                "required_linear_history": true
            },
            "required_signatures": true
        })
    );
}

#[test]
fn test_merge_rulesets_edge_cases() {
    assert_eq!(merge_rulesets(std::iter::empty::<&Value>()), json!({}));

    let only = json!({ "a": [1, 1, 2] });
    assert_eq!(merge_rulesets([&only]), json!({ "a": [1, 1, 2] }));

    let list = json!({ "users": ["x"] });
    let placeholder = json!({ "users": "@maintainers" });
    assert_eq!(
        merge_rulesets([&list, &placeholder]),
        json!({ "users": "@maintainers" }),
        "type mismatch is last-write-wins"
    );
}

#[test]
fn test_branch_rules_from_ruleset() {
    let rules = BranchRules::from_ruleset(
        "signed",
        &json!({ "branch_protection": { "enforce_admins": true }, "required_signatures": true }),
    )
    .unwrap();
    assert_eq!(rules.protection, json!({ "enforce_admins": true }));
    assert_eq!(rules.required_signatures, Some(true));

    let plain = BranchRules::from_ruleset("plain", &json!({ "branch_protection": {} })).unwrap();
    assert_eq!(plain.required_signatures, None);

    assert!(matches!(
        BranchRules::from_ruleset("empty", &json!({})),
        Err(RulesetError::MissingProtection(name)) if name == "empty"
    ));
    assert!(matches!(
        BranchRules::from_ruleset("bad", &json!({ "branch_protection": {}, "required_signatures": "yes" })),
        Err(RulesetError::InvalidSignatures(_))
    ));
}

#[test]
fn test_build_branch_rules_merges_then_templates() {
    let mut rulesets = BTreeMap::new();
    rulesets.insert(
        "base".to_string(),
        json!({ "branch_protection": { "restrictions": { "users": "@maintainers" } } }),
    );
    rulesets.insert(
        "admins".to_string(),
        json!({ "branch_protection": { "enforce_admins": true }, "required_signatures": true }),
    );
    let maintainers = strings(&["m1"]);

    let rules = build_branch_rules(
        &rulesets,
        &strings(&["base", "admins"]),
        Some(maintainers.as_slice()),
        &[],
    )
    .unwrap();

    assert_eq!(
        rules.protection,
        json!({ "restrictions": { "users": ["m1"] }, "enforce_admins": true })
    );
    assert_eq!(rules.required_signatures, Some(true));

    let err = build_branch_rules(&rulesets, &strings(&["nope"]), None, &[]).unwrap_err();
    assert!(matches!(err, RulesetError::Unknown(name) if name == "nope"));
}

#[test]
fn test_later_ruleset_replaces_protection_lists() {
    let base = json!({
        "branch_protection": {
            "required_status_checks": { "strict": true, "contexts": ["build"] },
            "restrictions": { "users": ["alice"], "teams": ["core"] }
        }
    });
    let narrowed = json!({
        "branch_protection": {
            "required_status_checks": { "contexts": ["lint"] },
            "restrictions": { "users": [] }
        }
    });

    let merged = merge_rulesets([&base, &narrowed]);

    assert_eq!(
        merged,
        json!({
            "branch_protection": {
                "required_status_checks": { "strict": true, "contexts": ["lint"] },
                "restrictions": { "users": [], "teams": ["core"] }
            }
        })
    );
}

#[test]
fn test_branch_name_lists_are_unioned() {
    let first = json!({
        "branches": ["master", "release"],
        "branch_protection": { "branches": ["x"] }
    });
    let second = json!({
        "branches": ["release", "develop"],
        "branch_protection": { "branches": ["y"] }
    });

    let merged = merge_rulesets([&first, &second]);

    assert_eq!(merged["branches"], json!(["master", "release", "develop"]));
    assert_eq!(
        merged["branch_protection"]["branches"],
        json!(["y"]),
        "lists inside the protection body are last-write-wins"
    );
}
