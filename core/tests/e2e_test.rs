//! End-to-end tests for the translation pipeline.
//!
//! These drive the real flow against a mocked provider endpoint:
//! 1. Extracted mod tree on disk (lang, ui, manifest, locale table)
//! 2. Extraction and cache lookup
//! 3. Translation over HTTP (wiremock standing in for the provider)
//! 4. Merge and write-back
//! 5. Report aggregation

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hytale_translator_core::ai::google::GoogleProvider;
use hytale_translator_core::ai::pacer::RequestPacer;
use hytale_translator_core::ai::retry::RetryPolicy;
use hytale_translator_core::cache::TranslationCache;
use hytale_translator_core::client::{BatchLimits, TranslationClient};
use hytale_translator_core::pipeline::{CancelToken, JobRequest, PipelineCoordinator};
use hytale_translator_core::report::{FileState, UnitStatus};

fn write_sample_tree(root: &Path) {
    std::fs::create_dir_all(root.join("Server/Languages/en-US")).unwrap();
    std::fs::create_dir_all(root.join("Common/Translations")).unwrap();
    std::fs::create_dir_all(root.join("UI")).unwrap();

    std::fs::write(
        root.join("manifest.json"),
        r#"{
  "Name": "Sample Mod",
  "Version": "1.0.0",
  "Description": "Hello"
}"#,
    )
    .unwrap();

    // "Hello" twice and "Bye" once: dedup must issue two requests total
    std::fs::write(
        root.join("Server/Languages/en-US/items.lang"),
        "# items\ngreeting=Hello\nfarewell=Bye\n",
    )
    .unwrap();

    std::fs::write(root.join("UI/menu.ui"), "Button {\n  Text: \"Hello\"\n}\n").unwrap();

    std::fs::write(
        root.join("Common/Translations/en_US.json"),
        r#"{"tagline": "Sharp <color is=\"red\">blade</color>"}"#,
    )
    .unwrap();
}

async fn mount_translation(server: &MockServer, source: &str, translated: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .and(query_param("q", source))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([[[translated, source]], null, "en"])),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn coordinator_for(server_uri: &str, cache: Arc<TranslationCache>) -> PipelineCoordinator {
    let provider = GoogleProvider::new(
        reqwest::Client::new(),
        Arc::new(RequestPacer::unlimited()),
    )
    .with_base_url(server_uri.to_string());
    let client = TranslationClient::new(
        Box::new(provider),
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 1),
        BatchLimits::default(),
    );
    PipelineCoordinator::new(Arc::new(client), cache, 4)
}

fn sample_request(root: &Path) -> JobRequest {
    JobRequest {
        root: root.to_path_buf(),
        files: vec![
            PathBuf::from("manifest.json"),
            PathBuf::from("Server/Languages/en-US/items.lang"),
            PathBuf::from("UI/menu.ui"),
            PathBuf::from("Common/Translations/en_US.json"),
        ],
        output_root: None,
        locale_mapped: true,
        source_lang: "en".into(),
        target_lang: "ru".into(),
    }
}

#[tokio::test]
async fn full_pipeline_translates_a_mod_tree() {
    let server = MockServer::start().await;
    // "Hello" appears in three units across three files: still one request
    mount_translation(&server, "Hello", "Привет", 1).await;
    mount_translation(&server, "Bye", "Пока", 1).await;
    mount_translation(&server, "Sample Mod", "Пример мода", 1).await;
    mount_translation(
        &server,
        "Sharp <color is=\"red\">blade</color>",
        "Острый <color is=\"red\">клинок</color>",
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    write_sample_tree(dir.path());

    let cache_path = dir.path().join("translation_memory.json");
    let cache = Arc::new(TranslationCache::load(&cache_path).unwrap());
    let pipeline = coordinator_for(&server.uri(), cache);

    let report = pipeline
        .run(&sample_request(dir.path()), &CancelToken::new())
        .await;

    assert!(report.files.iter().all(|f| f.state == FileState::Done));
    assert_eq!(report.counts.failed, 0);
    assert_eq!(report.counts.translated, 6);

    // manifest translated in place, structure intact
    let manifest = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    assert!(manifest.contains("\"Name\": \"Пример мода\""));
    assert!(manifest.contains("\"Version\": \"1.0.0\""));

    // lang routed to the target locale, source locale untouched
    let source_lang =
        std::fs::read_to_string(dir.path().join("Server/Languages/en-US/items.lang")).unwrap();
    assert_eq!(source_lang, "# items\ngreeting=Hello\nfarewell=Bye\n");
    let target_lang =
        std::fs::read_to_string(dir.path().join("Server/Languages/ru-RU/items.lang")).unwrap();
    assert_eq!(target_lang, "# items\ngreeting=Привет\nfarewell=Пока\n");

    // ui translated in place
    let ui = std::fs::read_to_string(dir.path().join("UI/menu.ui")).unwrap();
    assert_eq!(ui, "Button {\n  Text: \"Привет\"\n}\n");

    // locale table routed to the target file with markup preserved
    let table =
        std::fs::read_to_string(dir.path().join("Common/Translations/ru_RU.json")).unwrap();
    assert!(table.contains("Острый <color is=\\\"red\\\">клинок</color>"));

    // cache was persisted at the commit boundary
    let memory = std::fs::read_to_string(&cache_path).unwrap();
    assert!(memory.contains("Привет"));
}

#[tokio::test]
async fn warm_cache_run_issues_no_provider_calls() {
    let server = MockServer::start().await;
    mount_translation(&server, "Hello", "Привет", 1).await;
    mount_translation(&server, "Bye", "Пока", 1).await;
    mount_translation(&server, "Sample Mod", "Пример мода", 1).await;
    mount_translation(
        &server,
        "Sharp <color is=\"red\">blade</color>",
        "Острый <color is=\"red\">клинок</color>",
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    write_sample_tree(dir.path());
    let cache_path = dir.path().join("translation_memory.json");

    {
        let cache = Arc::new(TranslationCache::load(&cache_path).unwrap());
        let pipeline = coordinator_for(&server.uri(), cache);
        pipeline
            .run(&sample_request(dir.path()), &CancelToken::new())
            .await;
    }

    // rebuild the tree (the first run translated parts of it in place) and
    // rerun with the persisted memory; every mock still expects exactly one
    // call, so any second HTTP request fails verification on drop
    write_sample_tree(dir.path());
    let cache = Arc::new(TranslationCache::load(&cache_path).unwrap());
    let pipeline = coordinator_for(&server.uri(), cache);
    let report = pipeline
        .run(&sample_request(dir.path()), &CancelToken::new())
        .await;

    assert_eq!(report.counts.translated, 0);
    assert_eq!(report.counts.cached, 6);
    assert_eq!(report.counts.failed, 0);
}

#[tokio::test]
async fn provider_outage_degrades_but_preserves_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_sample_tree(dir.path());
    let original_lang =
        std::fs::read_to_string(dir.path().join("Server/Languages/en-US/items.lang")).unwrap();
    let original_manifest = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();

    let pipeline = coordinator_for(&server.uri(), Arc::new(TranslationCache::in_memory()));
    let report = pipeline
        .run(&sample_request(dir.path()), &CancelToken::new())
        .await;

    // every file still reaches Done with its source text intact
    assert!(report.files.iter().all(|f| f.state == FileState::Done));
    assert_eq!(report.counts.translated, 0);
    assert_eq!(report.counts.failed, 6);
    assert!(report
        .files
        .iter()
        .flat_map(|f| &f.units)
        .all(|u| u.status == UnitStatus::Failed));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("manifest.json")).unwrap(),
        original_manifest
    );
    // the locale-mapped output equals the source bytes
    assert_eq!(
        std::fs::read_to_string(dir.path().join("Server/Languages/ru-RU/items.lang")).unwrap(),
        original_lang
    );
}
