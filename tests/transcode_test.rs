//! Fragmented-MP4 streaming of sources browsers cannot play directly.
#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{StubProber, TestHarness};
use reqwest::header;
use reqwest::StatusCode;

/// Encoder that never finishes on its own and records its pid.
const ENDLESS_FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
echo $$ > "$(dirname "$0")/encoder.pid"
exec yes
"#;

/// Encoder that emits a little output and then fails.
const BROKEN_FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
printf 'partial'
echo "Invalid data found when processing input" >&2
exit 1
"#;

fn is_running(pid: &str) -> bool {
    std::process::Command::new("sh")
        .args(["-c", &format!("kill -0 {pid} 2>/dev/null")])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn hevc_source_is_transcoded() {
    let h = TestHarness::start(StubProber::codec("hevc", 100.0)).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h.client.get(h.url("/media/movie.mkv")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(resp.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert!(resp.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(resp.text().await.unwrap(), "fmp4-bytes");

    let calls = h.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("-c:v libx264"), "{}", calls[0]);
    assert!(calls[0].contains("-c:a aac"), "{}", calls[0]);
    assert!(calls[0].contains("frag_keyframe+empty_moov"), "{}", calls[0]);
    assert!(!calls[0].contains("-ss "), "{}", calls[0]);
}

#[tokio::test]
async fn h264_source_is_remuxed() {
    let h = TestHarness::start(StubProber::codec("h264", 100.0)).await;
    h.media_file("movie.avi", &[0u8; 1000]);

    let resp = h.client.get(h.url("/media/movie.avi")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "fmp4-bytes");
    assert!(h.calls()[0].contains("-c:v copy"));
}

#[tokio::test]
async fn range_request_seeks_proportionally() {
    let h = TestHarness::start(StubProber::codec("h264", 100.0)).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h
        .client
        .get(h.url("/media/movie.mkv"))
        .header(header::RANGE, "bytes=500-")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 500-999/1000");
    assert_eq!(resp.text().await.unwrap(), "fmp4-bytes");
    assert!(h.calls()[0].contains("-ss 50.000 -i"), "{}", h.calls()[0]);
}

#[tokio::test]
async fn range_past_end_is_416() {
    let h = TestHarness::start(StubProber::codec("h264", 100.0)).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h
        .client
        .get(h.url("/media/movie.mkv"))
        .header(header::RANGE, "bytes=1000-")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn unknown_duration_starts_from_zero() {
    let h = TestHarness::start(StubProber::codec("h264", 0.0)).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h
        .client
        .get(h.url("/media/movie.mkv"))
        .header(header::RANGE, "bytes=500-")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    resp.bytes().await.unwrap();
    assert!(!h.calls()[0].contains("-ss "));
}

#[tokio::test]
async fn head_does_not_spawn_encoder() {
    let h = TestHarness::start(StubProber::codec("hevc", 100.0)).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h.client.head(h.url("/media/movie.mkv")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn client_disconnect_kills_encoder() {
    let h = TestHarness::start_with(StubProber::codec("hevc", 100.0), ENDLESS_FFMPEG, |_| {}).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let mut resp = h.client.get(h.url("/media/movie.mkv")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = resp.chunk().await.unwrap().unwrap();
    assert!(first.starts_with(b"y\n"));

    let pid = std::fs::read_to_string(h.bin.path().join("encoder.pid")).unwrap();
    let pid = pid.trim().to_string();
    assert!(is_running(&pid));

    drop(resp);

    let mut alive = true;
    for _ in 0..100 {
        if !is_running(&pid) {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!alive, "encoder {pid} outlived its client");
}

#[tokio::test]
async fn encoder_failure_truncates_body() {
    let h = TestHarness::start_with(StubProber::codec("hevc", 100.0), BROKEN_FFMPEG, |_| {}).await;
    h.media_file("movie.mkv", &[0u8; 1000]);

    let resp = h.client.get(h.url("/media/movie.mkv")).send().await.unwrap();

    // Headers are already out when the encoder dies; the body must not end cleanly.
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.bytes().await.is_err());
    assert_eq!(h.calls().len(), 1);
}
