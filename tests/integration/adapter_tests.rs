//! Tile source lifecycle tests against a scripted transport.
//!
//! Tests verify:
//! - Idle construction and usage errors
//! - Geometry derived from loaded metadata
//! - Failure events for transport and protocol errors
//! - Reconfiguration and ordering of overlapping loads

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast::error::TryRecvError;

use iris_tile_source::{
    IrisTileSource, SourceError, TileSource, TileSourceEvent, TileSourceOptions, TransportError,
};

use super::test_utils::{metadata_json, metadata_url, sample_metadata, MockTransport, SERVER_URL};

fn open_source(transport: &Arc<MockTransport>, slide_id: &str) -> IrisTileSource {
    IrisTileSource::new(
        TileSourceOptions::new(SERVER_URL, slide_id),
        transport.clone(),
    )
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn test_idle_without_server_or_slide() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = IrisTileSource::new(TileSourceOptions::default(), transport.clone());

    assert!(!source.is_ready());
    assert_eq!(source.width(), 0.0);
    assert_eq!(source.height(), 0.0);
    assert_eq!(source.metadata_url(), None);

    let result = source.open().await;
    assert!(matches!(result, Err(SourceError::NotConfigured)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_idle_with_only_server_url() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = IrisTileSource::new(
        TileSourceOptions::default().with_server_url(SERVER_URL),
        transport.clone(),
    );

    assert!(matches!(
        source.open().await,
        Err(SourceError::NotConfigured)
    ));
    assert_eq!(transport.request_count(), 0);

    // Supplying the missing slide makes the source loadable
    source
        .configure(TileSourceOptions::default().with_slide_id(1u64))
        .unwrap()
        .await
        .unwrap();

    assert!(source.is_ready());
    assert_eq!(transport.requests(), vec![metadata_url("1")]);
}

#[tokio::test]
async fn test_open_issues_exactly_one_request() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");

    assert_eq!(transport.request_count(), 0);
    source.open().await.unwrap();
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.requests(), vec![metadata_url("1")]);
}

// =============================================================================
// Geometry
// =============================================================================

#[tokio::test]
async fn test_single_level_slide() {
    let url = metadata_url("single");
    let transport = Arc::new(
        MockTransport::new().with_body(url, metadata_json(1983.0, 1381.0, &[(8, 6, 1.0)])),
    );
    let source = open_source(&transport, "single");

    source.open().await.unwrap();

    assert!(source.is_ready());
    assert_eq!(source.width(), 1983.0);
    assert_eq!(source.height(), 1381.0);
    assert_eq!(source.min_level(), 0);
    assert_eq!(source.max_level(), 0);
    assert_eq!(source.level_normalized_scale(0), Some(1.0));
    assert_eq!(source.tile_grid_size(0), (8, 6));
}

#[tokio::test]
async fn test_multi_level_geometry() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    let max_level = source.max_level();
    assert_eq!(max_level, 3);
    assert_eq!(source.tile_grid_size(max_level), (31, 22));
    assert_eq!(source.level_normalized_scale(max_level), Some(1.0));

    // Dimensions come from the last layer's scale
    assert_eq!(source.width(), 1983.0 * 4.0);
    assert_eq!(source.height(), 1381.0 * 4.0);

    let pyramid = source.pyramid().unwrap();
    let full_width = pyramid.level(max_level).unwrap().width as f64;
    let mut previous = 0.0;
    for level in source.min_level()..=max_level {
        let scale = source.level_normalized_scale(level).unwrap();
        let width = pyramid.level(level).unwrap().width as f64;
        assert_eq!(scale, width / full_width);
        assert!(scale >= previous, "scale must not decrease with level");
        previous = scale;
    }

    // Out-of-range levels
    assert_eq!(source.tile_grid_size(max_level + 1), (0, 0));
    assert_eq!(source.level_normalized_scale(max_level + 1), None);
    assert_eq!(source.tile_address(max_level + 1, 0, 0), None);
}

#[tokio::test]
async fn test_tile_address_row_major() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    // Level 3 is 31 tiles wide: position = 3 * 31 + 2
    assert_eq!(
        source.tile_address(3, 2, 3).as_deref(),
        Some("http://iris.test:3000/slides/1/layers/3/tiles/95")
    );
    assert_eq!(
        source.tile_address(0, 0, 0).as_deref(),
        Some("http://iris.test:3000/slides/1/layers/0/tiles/0")
    );
    assert_eq!(
        source.tile_address(1, 3, 2).as_deref(),
        Some("http://iris.test:3000/slides/1/layers/1/tiles/11")
    );
}

#[tokio::test]
async fn test_tile_addresses_are_distinct_within_level() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    let level = 2;
    let (x_tiles, y_tiles) = source.tile_grid_size(level);
    let mut addresses = std::collections::HashSet::new();
    for y in 0..y_tiles {
        for x in 0..x_tiles {
            assert!(source.contains_tile(level, x, y));
            assert!(addresses.insert(source.tile_address(level, x, y).unwrap()));
        }
    }
    assert_eq!(addresses.len(), (x_tiles * y_tiles) as usize);
    assert!(!source.contains_tile(level, x_tiles, 0));
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    for level in 0..=source.max_level() {
        assert_eq!(source.tile_grid_size(level), source.tile_grid_size(level));
        assert_eq!(
            source.level_normalized_scale(level),
            source.level_normalized_scale(level)
        );
    }
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_level_for_scale() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");

    assert_eq!(source.level_for_scale(0.5), None);
    source.open().await.unwrap();

    assert_eq!(source.level_for_scale(0.01), Some(0));
    assert_eq!(source.level_for_scale(0.1), Some(1));
    assert_eq!(source.level_for_scale(0.5), Some(2));
    assert_eq!(source.level_for_scale(1.0), Some(3));
    assert_eq!(source.level_for_scale(8.0), Some(3));
}

#[tokio::test]
async fn test_info_snapshot() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    let info = source.info().unwrap();
    assert_eq!(info.server_url, SERVER_URL);
    assert_eq!(info.slide_id.as_str(), "1");
    assert_eq!(info.levels.len(), 4);
    assert_eq!(info.max_level(), 3);
    assert_eq!(info.tile_size, 256);
    assert_eq!(info.encoding.as_deref(), Some("image/jpeg"));
    assert_eq!(info.format.as_deref(), Some("FORMAT_B8G8R8A8"));

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["slide_id"], "1");
    assert_eq!(json["levels"][3]["x_tiles"], 31);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_ready_event() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    let mut events = source.subscribe();

    source.open().await.unwrap();

    match events.recv().await.unwrap() {
        TileSourceEvent::Ready(info) => {
            assert_eq!(info.width, source.width());
            assert_eq!(info.levels.len(), 4);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_spawn_open_raises_ready() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    let mut events = source.subscribe();

    let handle = source.spawn_open();

    let event = events.recv().await.unwrap();
    assert_eq!(event.name(), "ready");
    assert!(source.is_ready());
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_transport_error_raises_open_failed_once() {
    let url = metadata_url("1");
    let transport = Arc::new(
        MockTransport::new()
            .with_error(url.clone(), TransportError::Connection("connection reset".into())),
    );
    let source = open_source(&transport, "1");
    let mut events = source.subscribe();

    let result = source.open().await;

    assert!(matches!(result, Err(SourceError::Transport { .. })));
    assert_eq!(result.unwrap_err().url(), Some(url.as_str()));
    assert!(!source.is_ready());

    match events.recv().await.unwrap() {
        TileSourceEvent::OpenFailed { message, source } => {
            assert!(message.contains("Unable to get metadata from"));
            assert_eq!(source, Some(url));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    // Queries stay inert
    assert_eq!(source.tile_address(0, 0, 0), None);
    assert_eq!(source.tile_address(5, 100, 100), None);
    assert_eq!(source.tile_grid_size(0), (0, 0));
}

#[tokio::test]
async fn test_http_status_error() {
    // Unregistered URL answers 404
    let transport = Arc::new(MockTransport::new());
    let source = open_source(&transport, "missing");

    let result = source.open().await;
    match result {
        Err(SourceError::Transport {
            source: TransportError::Status { status, .. },
            ..
        }) => assert_eq!(status, 404),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!source.is_ready());
}

#[tokio::test]
async fn test_empty_layers_raises_open_failed() {
    let transport = Arc::new(
        MockTransport::new().with_body(metadata_url("1"), metadata_json(100.0, 100.0, &[])),
    );
    let source = open_source(&transport, "1");
    let mut events = source.subscribe();

    let result = source.open().await;

    assert!(matches!(result, Err(SourceError::Metadata { .. })));
    assert!(!source.is_ready());
    match events.recv().await.unwrap() {
        TileSourceEvent::OpenFailed { message, source } => {
            assert!(message.starts_with("IrisTileSource: Error parsing metadata:"));
            assert_eq!(source, Some(metadata_url("1")));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_bodies_never_become_ready() {
    let bodies = [
        "not json".to_string(),
        r#"{"extent": {"width": 10, "height": 10}}"#.to_string(),
        r#"{"extent": {"width": 10, "height": 10, "layers": [{"x_tiles": 0, "y_tiles": 1, "scale": 1}]}}"#
            .to_string(),
        r#"{"extent": {"width": 10, "height": 10, "layers": [{"x_tiles": 1, "y_tiles": 1, "scale": "x"}]}}"#
            .to_string(),
        metadata_json(100.0, 100.0, &[(1, 1, 0.0)]),
    ];

    for body in bodies {
        let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), body.clone()));
        let source = open_source(&transport, "1");

        let result = source.open().await;
        assert!(
            matches!(result, Err(SourceError::Metadata { .. })),
            "body should be rejected: {body}"
        );
        assert!(!source.is_ready());
        assert_eq!(source.width(), 0.0);
        assert_eq!(source.max_level(), 0);
    }
}

// =============================================================================
// Reconfiguration
// =============================================================================

#[tokio::test]
async fn test_configure_without_options_is_usage_error() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("1"), sample_metadata()));
    let source = open_source(&transport, "1");
    source.open().await.unwrap();
    let mut events = source.subscribe();

    let result = source.configure(TileSourceOptions::default());

    assert!(matches!(result, Err(SourceError::NoOptions)));
    assert!(matches!(
        events.recv().await.unwrap(),
        TileSourceEvent::OpenFailed { source: None, .. }
    ));
    // Nothing was reconfigured
    assert!(source.is_ready());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_configure_switches_slide() {
    let transport = Arc::new(
        MockTransport::new()
            .with_body(metadata_url("a"), sample_metadata())
            .with_body(
                metadata_url("b"),
                metadata_json(500.0, 400.0, &[(1, 1, 0.5), (2, 2, 1.0)]),
            ),
    );
    let source = open_source(&transport, "a");
    source.open().await.unwrap();
    assert_eq!(source.max_level(), 3);

    let load = source
        .configure(TileSourceOptions::default().with_slide_id("b"))
        .unwrap();
    assert!(!source.is_ready());
    assert_eq!(source.tile_grid_size(0), (0, 0));

    load.await.unwrap();

    assert!(source.is_ready());
    assert_eq!(source.max_level(), 1);
    assert_eq!(source.width(), 500.0);
    assert_eq!(source.server_url().as_deref(), Some(SERVER_URL));
    assert_eq!(
        source.tile_address(1, 1, 1).as_deref(),
        Some("http://iris.test:3000/slides/b/layers/1/tiles/3")
    );
}

#[tokio::test]
async fn test_configure_switches_server() {
    let other_server = "http://mirror.test";
    let transport = Arc::new(
        MockTransport::new()
            .with_body(metadata_url("1"), sample_metadata())
            .with_body(format!("{other_server}/slides/1/metadata"), sample_metadata()),
    );
    let source = open_source(&transport, "1");
    source.open().await.unwrap();

    source
        .configure(TileSourceOptions::default().with_server_url(format!("{other_server}/")))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        source.tile_address(0, 0, 0).as_deref(),
        Some("http://mirror.test/slides/1/layers/0/tiles/0")
    );
}

#[tokio::test]
async fn test_configure_retries_after_failure() {
    let transport = Arc::new(
        MockTransport::new()
            .with_error(
                metadata_url("1"),
                TransportError::Timeout(metadata_url("1")),
            )
            .with_body("http://backup.test/slides/1/metadata", sample_metadata()),
    );
    let source = open_source(&transport, "1");

    assert!(source.open().await.is_err());
    assert!(!source.is_ready());

    source
        .configure(TileSourceOptions::default().with_server_url("http://backup.test"))
        .unwrap()
        .await
        .unwrap();
    assert!(source.is_ready());
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_newer_load_wins_when_older_completes_last() {
    let transport = Arc::new(
        MockTransport::new().with_body(
            metadata_url("b"),
            metadata_json(500.0, 400.0, &[(2, 2, 1.0)]),
        ),
    );
    let release_a = transport.gate(metadata_url("a"));
    let source = open_source(&transport, "a");
    let mut events = source.subscribe();

    let stale = tokio::spawn(source.open());

    source
        .configure(TileSourceOptions::default().with_slide_id("b"))
        .unwrap()
        .await
        .unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        TileSourceEvent::Ready(_)
    ));

    release_a
        .send(Ok(Bytes::from(sample_metadata())))
        .unwrap();
    let result = stale.await.unwrap();

    assert!(matches!(result, Err(SourceError::Superseded)));
    assert!(source.is_ready());
    assert_eq!(source.slide_id().unwrap().as_str(), "b");
    assert_eq!(source.max_level(), 0);
    assert_eq!(source.width(), 500.0);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_older_load_completing_first_is_discarded() {
    let transport = Arc::new(MockTransport::new());
    let release_a = transport.gate(metadata_url("a"));
    let release_b = transport.gate(metadata_url("b"));
    let source = open_source(&transport, "a");
    let mut events = source.subscribe();

    let first = tokio::spawn(source.open());
    let second = tokio::spawn(
        source
            .configure(TileSourceOptions::default().with_slide_id("b"))
            .unwrap(),
    );

    release_a
        .send(Ok(Bytes::from(sample_metadata())))
        .unwrap();
    assert!(matches!(
        first.await.unwrap(),
        Err(SourceError::Superseded)
    ));
    assert!(!source.is_ready());

    release_b
        .send(Ok(Bytes::from(metadata_json(
            500.0,
            400.0,
            &[(1, 1, 0.5), (2, 2, 1.0)],
        ))))
        .unwrap();
    second.await.unwrap().unwrap();

    assert!(source.is_ready());
    assert_eq!(source.max_level(), 1);
    match events.recv().await.unwrap() {
        TileSourceEvent::Ready(info) => assert_eq!(info.slide_id.as_str(), "b"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_superseded_failure_raises_no_event() {
    let transport = Arc::new(MockTransport::new().with_body(metadata_url("b"), sample_metadata()));
    let release_a = transport.gate(metadata_url("a"));
    let source = open_source(&transport, "a");

    let stale = tokio::spawn(source.open());
    source
        .configure(TileSourceOptions::default().with_slide_id("b"))
        .unwrap()
        .await
        .unwrap();

    let mut events = source.subscribe();
    release_a
        .send(Err(TransportError::Connection("late failure".into())))
        .unwrap();

    assert!(matches!(
        stale.await.unwrap(),
        Err(SourceError::Superseded)
    ));
    assert!(source.is_ready());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}
