mod common;

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::{Html, IntoResponse},
};
use common::{app, send, settings, with_cache};
use folio::{
    cache::{CacheConfig, CacheKey, ResponseCache},
    infra::telemetry::COUNTERS,
};
use metrics_util::debugging::DebuggingRecorder;

#[tokio::test]
async fn dispatch_and_cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let dir = tempfile::tempdir().expect("tempdir");
    let settings = with_cache(settings(), dir.path(), &["workflow"]);
    let app = app(&settings);

    let uri = "/index.php/mono/workflow/show/3";
    // miss, then hit, then a conditional request far in the future
    for since in [None, None, Some("Fri, 01 Jan 2100 00:00:00 GMT")] {
        let mut builder = Request::builder().uri(uri);
        if let Some(since) = since {
            builder = builder.header(header::IF_MODIFIED_SINCE, since);
        }
        let response = send(&app, builder.body(Body::empty()).expect("request")).await;
        assert!(
            response.status() == StatusCode::OK || response.status() == StatusCode::NOT_MODIFIED
        );
    }

    // a directory path that is a regular file makes the write fail
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").expect("seed file");
    let cache = ResponseCache::new(CacheConfig {
        directory: blocked,
        ..CacheConfig::from(&settings.cache)
    });
    let response = cache
        .capture(
            &CacheKey::derive("/mono/about", "en"),
            Html("about").into_response(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for (metric, _) in COUNTERS {
        assert!(names.contains(*metric), "missing metric: {metric}");
    }
}
