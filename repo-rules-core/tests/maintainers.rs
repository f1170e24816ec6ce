use mockall::predicate::eq;
use repo_rules_core::contract::{ApiError, MockGithubApi};
use repo_rules_core::maintainers::{
    extract_maintainers, fetch_repo_maintainers, MaintainersError, ManifestFormat,
};

struct TestCase {
    name: &'static str,
    content: &'static str,
    format: ManifestFormat,
    expected: Vec<&'static str>,
}

#[test]
fn test_extract_maintainers_table_driven() {
    let test_cases = vec![
        TestCase {
            name: "toml list is kept verbatim",
            content: "maintainers = [\"alice\", \"bob\"]\n",
            format: ManifestFormat::Toml,
            expected: vec!["alice", "bob"],
        },
        TestCase {
            name: "toml without maintainers key",
            content: "name = \"service\"\n",
            format: ManifestFormat::Toml,
            expected: vec![],
        },
        TestCase {
            name: "legacy array drops names with whitespace",
            content: r#"{"maintainer":[{"name":"alice"},{"name":"bob carter"}]}"#,
            format: ManifestFormat::LegacyJson,
            expected: vec!["alice"],
        },
        TestCase {
            name: "legacy single object",
            content: r#"{"maintainer":{"name":"carol","email":"c@example.com"}}"#,
            format: ManifestFormat::LegacyJson,
            expected: vec!["carol"],
        },
        TestCase {
            name: "legacy without maintainer key",
            content: r#"{"description":"nothing here"}"#,
            format: ManifestFormat::LegacyJson,
            expected: vec![],
        },
        TestCase {
            name: "legacy entries without a string name are skipped",
            content: r#"{"maintainer":[{"email":"x@example.com"},{"name":42},{"name":"dave"}]}"#,
            format: ManifestFormat::LegacyJson,
            expected: vec!["dave"],
        },
    ];

    for case in test_cases {
        let got = extract_maintainers(case.content, case.format)
            .unwrap_or_else(|e| panic!("case {} failed to parse: {e}", case.name));
        assert_eq!(got, case.expected, "case failed: {}", case.name);
    }
}

#[test]
fn test_extract_maintainers_rejects_malformed_manifests() {
    assert!(extract_maintainers("maintainers = [", ManifestFormat::Toml).is_err());
    assert!(extract_maintainers("maintainers = \"alice\"", ManifestFormat::Toml).is_err());
    assert!(extract_maintainers("{not json", ManifestFormat::LegacyJson).is_err());
}

fn not_found(path: &str) -> ApiError {
    ApiError::NotFound(format!("acme/svc/{path}"))
}

#[tokio::test]
async fn test_fetch_prefers_the_toml_manifest() {
    let mut api = MockGithubApi::new();
    api.expect_get_file_content()
        .with(eq("acme"), eq("svc"), eq("manifest.toml"), eq("master"))
        .times(1)
        .returning(|_, _, _, _| Ok("maintainers = [\"alice\"]".to_string()));

    let got = fetch_repo_maintainers(&api, "acme", "svc", "master")
        .await
        .unwrap();
    assert_eq!(got, Some(vec!["alice".to_string()]));
}

#[tokio::test]
async fn test_fetch_falls_back_to_the_legacy_manifest() {
    let mut api = MockGithubApi::new();
    api.expect_get_file_content()
        .with(eq("acme"), eq("svc"), eq("manifest.toml"), eq("main"))
        .times(1)
        .returning(|_, _, path, _| Err(not_found(path)));
    api.expect_get_file_content()
        .with(eq("acme"), eq("svc"), eq("manifest.json"), eq("main"))
        .times(1)
        .returning(|_, _, _, _| Ok(r#"{"maintainer":{"name":"bob"}}"#.to_string()));

    let got = fetch_repo_maintainers(&api, "acme", "svc", "main")
        .await
        .unwrap();
    assert_eq!(got, Some(vec!["bob".to_string()]));
}

#[tokio::test]
async fn test_fetch_without_any_manifest_is_none() {
    let mut api = MockGithubApi::new();
    api.expect_get_file_content()
        .times(2)
        .returning(|_, _, path, _| Err(not_found(path)));

    let got = fetch_repo_maintainers(&api, "acme", "svc", "master")
        .await
        .unwrap();
    assert_eq!(got, None);
}

#[tokio::test]
async fn test_fetch_propagates_other_api_errors() {
    let mut api = MockGithubApi::new();
    api.expect_get_file_content()
        .times(1)
        .returning(|_, _, _, _| {
            Err(ApiError::Status {
                status: 500,
                url: "https://api.github.com/repos/acme/svc/contents/manifest.toml".to_string(),
                body: "boom".to_string(),
            })
        });

    let err = fetch_repo_maintainers(&api, "acme", "svc", "master")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MaintainersError::Api { ref repo, source: ApiError::Status { status: 500, .. } } if repo == "svc"
    ));
}

#[tokio::test]
async fn test_fetch_propagates_malformed_manifest() {
    let mut api = MockGithubApi::new();
    api.expect_get_file_content()
        .with(eq("acme"), eq("svc"), eq("manifest.toml"), eq("master"))
        .times(1)
        .returning(|_, _, _, _| Ok("maintainers = [".to_string()));

    let err = fetch_repo_maintainers(&api, "acme", "svc", "master")
        .await
        .unwrap_err();
    assert!(matches!(err, MaintainersError::Manifest { .. }));
}
