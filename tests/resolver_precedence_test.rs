mod support;

use emos_uploader::models::{CatalogEntry, EpisodeInfo, ExactLookupResult, ItemKind};
use emos_uploader::recognize::client::RecognizedMedia;
use emos_uploader::recognize::overrides::{ManualOverrideMap, OverrideEntry};
use emos_uploader::recognize::{ResolveError, Resolver};
use std::sync::Arc;
use support::{tracing_init, MockAuth, MockCatalog, MockRecognition};
use tempfile::TempDir;

async fn empty_overrides(dir: &TempDir) -> Arc<ManualOverrideMap> {
    Arc::new(
        ManualOverrideMap::load(dir.path())
            .await
            .expect("Failed to load override map"),
    )
}

fn entry(video_id: &str, title: &str, video_type: &str, tmdb_id: Option<&str>) -> CatalogEntry {
    CatalogEntry {
        video_id: video_id.to_string(),
        video_title: title.to_string(),
        video_type: video_type.to_string(),
        tmdb_id: tmdb_id.map(|id| id.to_string()),
        todb_id: None,
    }
}

#[tokio::test]
async fn test_signed_out_resolution_makes_no_network_calls() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia {
        title: Some("Should Not Be Asked".to_string()),
        ..Default::default()
    }));
    let catalog = Arc::new(MockCatalog::with_search_results(vec![entry(
        "vid-1",
        "Should Not Be Asked",
        "vl",
        None,
    )]));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_out()),
        recognition.clone(),
        catalog.clone(),
        empty_overrides(&tmp).await,
    );

    let result = resolver.resolve("Movie.Title.2021.mkv").await;
    assert!(matches!(result, Err(ResolveError::AuthRequired)));
    assert_eq!(recognition.call_count(), 0);
    assert_eq!(catalog.search_count(), 0);
    assert_eq!(catalog.lookup_count(), 0);
}

#[tokio::test]
async fn test_manual_override_bypasses_recognition() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let overrides = empty_overrides(&tmp).await;
    overrides
        .insert(
            "Weird Name (final2) [fixed].mkv",
            OverrideEntry {
                item_id: "pinned-42".to_string(),
                item_type: Some(ItemKind::Episode),
                grouping_id: Some("series-7".to_string()),
            },
        )
        .await
        .expect("Failed to insert override");

    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia {
        external_id: Some("999".to_string()),
        ..Default::default()
    }));
    let catalog = Arc::new(MockCatalog::empty());

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        recognition.clone(),
        catalog.clone(),
        overrides,
    );

    let result = resolver
        .resolve("Weird Name (final2) [fixed].mkv")
        .await
        .expect("Override resolution failed");

    assert_eq!(result.item_id, "pinned-42");
    assert_eq!(result.kind, ItemKind::Episode);
    assert_eq!(result.grouping_id.as_deref(), Some("series-7"));
    // No remote steps at all on an override hit
    assert_eq!(recognition.call_count(), 0);
    assert_eq!(catalog.search_count(), 0);
}

#[tokio::test]
async fn test_exact_lookup_short_circuits_search() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia {
        is_series: true,
        external_id: Some("8859".to_string()),
        season: Some(2),
        episode: Some(5),
        title: Some("Show Name".to_string()),
    }));
    let catalog = Arc::new(MockCatalog::empty().with_lookup(ExactLookupResult {
        item_id: None,
        video_title: Some("Show Name".to_string()),
        episode_info: Some(EpisodeInfo {
            item_id: "ep-205".to_string(),
            episode_title: None,
        }),
    }));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        recognition,
        catalog.clone(),
        empty_overrides(&tmp).await,
    );

    let result = resolver
        .resolve("Show.Name.S02E05.1080p.mkv")
        .await
        .expect("Exact lookup resolution failed");

    assert_eq!(result.item_id, "ep-205");
    assert_eq!(result.kind, ItemKind::Episode);
    assert_eq!(result.title, "Show Name S02E05");
    assert_eq!(catalog.lookup_count(), 1);
    assert_eq!(catalog.search_count(), 0, "search must not run after an exact hit");
}

#[tokio::test]
async fn test_failed_exact_lookup_falls_through_to_search() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia {
        is_series: false,
        external_id: Some("77".to_string()),
        title: Some("Movie Title".to_string()),
        ..Default::default()
    }));
    let catalog = Arc::new(
        MockCatalog::with_search_results(vec![entry("vid-1", "Movie Title", "vl", Some("77"))])
            .failing_lookup(),
    );

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        recognition,
        catalog.clone(),
        empty_overrides(&tmp).await,
    );

    let result = resolver
        .resolve("Movie.Title.2021.BluRay.x264.mp4")
        .await
        .expect("Fallback resolution failed");

    assert_eq!(result.item_id, "vid-1");
    assert_eq!(result.kind, ItemKind::Single);
    assert_eq!(catalog.lookup_count(), 1);
    assert_eq!(catalog.search_count(), 1);
}

#[tokio::test]
async fn test_search_prefers_candidate_with_external_id() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let catalog = Arc::new(MockCatalog::with_search_results(vec![
        entry("vid-plain", "Movie Title", "vl", None),
        entry("vid-linked", "Movie Title", "vl", Some("77")),
    ]));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        catalog,
        empty_overrides(&tmp).await,
    );

    let result = resolver
        .resolve("Movie.Title.2021.BluRay.x264.mp4")
        .await
        .expect("Search resolution failed");

    assert_eq!(result.item_id, "vid-linked");
    assert_eq!(result.title, "Movie Title");
}

#[tokio::test]
async fn test_episode_resolved_through_search_candidate() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let catalog = Arc::new(
        MockCatalog::with_search_results(vec![entry("tv-1", "Show Name", "tv", Some("8859"))])
            .with_lookup(ExactLookupResult {
                item_id: None,
                video_title: Some("Show Name".to_string()),
                episode_info: Some(EpisodeInfo {
                    item_id: "ep-1".to_string(),
                    episode_title: Some("The One With The Marker".to_string()),
                }),
            }),
    );

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        catalog.clone(),
        empty_overrides(&tmp).await,
    );

    let result = resolver
        .resolve("Show.Name.S02E05.mkv")
        .await
        .expect("Episode resolution failed");

    assert_eq!(result.item_id, "ep-1");
    assert_eq!(result.kind, ItemKind::Episode);
    assert_eq!(result.title, "The One With The Marker");
    assert_eq!(catalog.search_count(), 1);
    assert_eq!(catalog.lookup_count(), 1);
}

#[tokio::test]
async fn test_contentless_recognition_keeps_the_heuristic_kind() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    // A recognition answer that carries nothing must not demote an
    // episodic filename to a single item
    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia::default()));
    let catalog = Arc::new(
        MockCatalog::with_search_results(vec![entry("tv-1", "Show Name", "tv", Some("8859"))])
            .with_lookup(ExactLookupResult {
                item_id: None,
                video_title: Some("Show Name".to_string()),
                episode_info: Some(EpisodeInfo {
                    item_id: "ep-205".to_string(),
                    episode_title: None,
                }),
            }),
    );

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        recognition,
        catalog,
        empty_overrides(&tmp).await,
    );

    let result = resolver
        .resolve("Show.Name.S02E05.mkv")
        .await
        .expect("Episode resolution failed");

    assert_eq!(result.kind, ItemKind::Episode);
    assert_eq!(result.item_id, "ep-205");
}

#[tokio::test]
async fn test_filename_marker_overrides_non_series_recognition() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    // Recognition calls it a movie, but the filename carries an explicit
    // episode marker; the marker wins, so the series has to disambiguate
    let recognition = Arc::new(MockRecognition::with_answer(RecognizedMedia {
        is_series: false,
        title: Some("Show Name".to_string()),
        ..Default::default()
    }));
    let catalog = Arc::new(MockCatalog::with_search_results(vec![entry(
        "tv-1",
        "Show Name",
        "tv",
        None,
    )]));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        recognition,
        catalog,
        empty_overrides(&tmp).await,
    );

    let result = resolver.resolve("Show.Name.S02E05.mkv").await;
    assert!(matches!(
        result,
        Err(ResolveError::EpisodeNotFound {
            season: 2,
            episode: 5
        })
    ));
}

#[tokio::test]
async fn test_series_without_episode_match_is_a_hard_failure() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    // The series exists but carries no cross-reference ID, so the episode
    // cannot be located
    let catalog = Arc::new(MockCatalog::with_search_results(vec![entry(
        "tv-1",
        "Show Name",
        "tv",
        None,
    )]));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        catalog,
        empty_overrides(&tmp).await,
    );

    let result = resolver.resolve("Show.Name.S02E05.mkv").await;
    match result {
        Err(ResolveError::EpisodeNotFound { season, episode }) => {
            assert_eq!(season, 2);
            assert_eq!(episode, 5);
        }
        other => panic!("expected EpisodeNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_search_reports_attempted_steps() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        Arc::new(MockCatalog::empty()),
        empty_overrides(&tmp).await,
    );

    let result = resolver.resolve("Movie.Title.2021.mkv").await;
    match result {
        Err(ResolveError::RecognitionFailed { trace }) => {
            assert!(!trace.is_empty());
            assert!(trace.iter().any(|step| step.contains("no results")));
        }
        other => panic!("expected RecognitionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unusable_filename_is_empty_title() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let catalog = Arc::new(MockCatalog::empty());
    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        catalog.clone(),
        empty_overrides(&tmp).await,
    );

    let result = resolver.resolve("...mkv").await;
    assert!(matches!(result, Err(ResolveError::EmptyTitle(_))));
    assert_eq!(catalog.search_count(), 0, "no search on an empty title");
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    tracing_init();
    let tmp = TempDir::new().unwrap();

    let catalog = Arc::new(MockCatalog::with_search_results(vec![entry(
        "vid-1",
        "Movie Title",
        "vl",
        Some("77"),
    )]));

    let resolver = Resolver::new(
        Arc::new(MockAuth::signed_in()),
        Arc::new(MockRecognition::unavailable()),
        catalog,
        empty_overrides(&tmp).await,
    );

    let first = resolver
        .resolve("Movie.Title.2021.mkv")
        .await
        .expect("First resolution failed");
    let second = resolver
        .resolve("Movie.Title.2021.mkv")
        .await
        .expect("Second resolution failed");

    assert_eq!(first, second);
}
