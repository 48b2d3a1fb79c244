//! On-demand HLS generation through `/media/{path}.hls/...`.
#![cfg(unix)]

mod common;

use std::time::{Duration, SystemTime};

use common::{StubProber, TestHarness, FAILING_FFMPEG};

/// Writes half the segments, then stalls before finishing the playlist.
const SLOW_FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
for a; do last="$a"; done
dir=$(dirname "$last")
printf 'segment-0' > "$dir/segment000.ts"
printf 'segment-1' > "$dir/segment001.ts"
sleep 1
printf 'segment-2' > "$dir/segment002.ts"
printf 'segment-3' > "$dir/segment003.ts"
printf '#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment000.ts\n#EXTINF:6.0,\nsegment001.ts\n#EXTINF:6.0,\nsegment002.ts\n#EXTINF:6.0,\nsegment003.ts\n#EXT-X-ENDLIST\n' > "$last"
"#;
use reqwest::header;
use reqwest::StatusCode;

#[tokio::test]
async fn concurrent_playlist_requests_share_one_encode() {
    let h = TestHarness::start(StubProber::codec("hevc", 12.0)).await;
    h.media_file("show/ep.mkv", b"source");
    let url = h.url("/media/show/ep.mkv.hls/playlist.m3u8");

    let (a, b) = tokio::join!(h.client.get(&url).send(), h.client.get(&url).send());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(a.headers()[header::CONTENT_TYPE], "application/vnd.apple.mpegurl");
    assert_eq!(a.headers()[header::CACHE_CONTROL], "no-cache");
    let (a, b) = (a.text().await.unwrap(), b.text().await.unwrap());
    assert!(a.contains("#EXT-X-ENDLIST"));
    assert_eq!(a, b);

    assert_eq!(h.hls_calls(), 1);
    let call = &h.calls()[0];
    assert!(call.contains("-c:v libx264"), "{call}");
    assert!(call.contains("-hls_time 6"), "{call}");
    h.wait_idle().await;
}

#[tokio::test]
async fn ready_output_is_reused() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    h.media_file("ep.mkv", b"source");
    let url = h.url("/media/ep.mkv.hls/playlist.m3u8");

    for _ in 0..3 {
        let resp = h.client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(h.hls_calls(), 1);
    assert!(h.calls()[0].contains("-c:v copy"));
}

#[tokio::test]
async fn stale_playlist_is_regenerated() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    let source = h.media_file("ep.mkv", b"source");
    let url = h.url("/media/ep.mkv.hls/playlist.m3u8");

    assert_eq!(h.client.get(&url).send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(h.hls_calls(), 1);
    h.wait_idle().await;

    let playlist = source.with_file_name("ep.mkv.hls").join("playlist.m3u8");
    std::fs::File::options()
        .write(true)
        .open(&playlist)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
    assert!(!h.ctx.hls.is_ready(&source));

    assert_eq!(h.client.get(&url).send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(h.hls_calls(), 2);
    assert!(h.ctx.hls.is_ready(&source));
}

#[tokio::test]
async fn segment_request_starts_generation_and_waits() {
    let h = TestHarness::start(StubProber::codec("hevc", 12.0)).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/segment001.ts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp2t");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(resp.text().await.unwrap(), "segment-1");
    assert_eq!(h.hls_calls(), 1);
}

#[tokio::test]
async fn segments_of_stale_output_are_not_served() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    let source = h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/playlist.m3u8"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    h.wait_idle().await;

    let out_dir = source.with_file_name("ep.mkv.hls");
    std::fs::write(out_dir.join("segment001.ts"), "old-encode").unwrap();
    std::fs::File::options()
        .write(true)
        .open(out_dir.join("playlist.m3u8"))
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/segment001.ts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "segment-1");
    assert_eq!(h.hls_calls(), 2);
    h.wait_idle().await;
}

#[tokio::test]
async fn segment_past_the_end_is_404() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/segment009.ts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_reflects_lifecycle() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    h.media_file("ep.mkv", b"source");
    let progress_url = h.url("/media/ep.mkv.hls/progress");

    let before: serde_json::Value = h.client.get(&progress_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(before["state"], "pending");
    assert_eq!(before["progress"], 0);
    assert_eq!(h.hls_calls(), 0);

    h.client
        .get(h.url("/media/ep.mkv.hls/playlist.m3u8"))
        .send()
        .await
        .unwrap();

    let after: serde_json::Value = h.client.get(&progress_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(after["state"], "ready");
    assert_eq!(after["progress"], 100);
    assert_eq!(after["completed_segments"], 2);
}

#[tokio::test]
async fn progress_mid_generation_counts_written_segments() {
    let h = TestHarness::start_with(StubProber::codec("h264", 24.0), SLOW_FFMPEG, |_| {}).await;
    let source = h.media_file("ep.mkv", b"source");
    let progress_url = h.url("/media/ep.mkv.hls/progress");

    let handle = h.ctx.hls.ensure(&source);

    let mut mid = serde_json::Value::Null;
    for _ in 0..100 {
        let snapshot: serde_json::Value =
            h.client.get(&progress_url).send().await.unwrap().json().await.unwrap();
        if snapshot["completed_segments"] == 2 {
            mid = snapshot;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(mid["state"], "generating", "{mid}");
    assert_eq!(mid["progress"], 50);
    assert_eq!(mid["estimated_segments"], 4);
    assert!(mid["error"].is_null());

    handle.wait().await.unwrap();
    let done: serde_json::Value = h.client.get(&progress_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(done["state"], "ready");
    assert_eq!(done["progress"], 100);
    h.wait_idle().await;
}

#[tokio::test]
async fn failed_generation_cleans_up() {
    let h = TestHarness::start_with(StubProber::codec("hevc", 12.0), FAILING_FFMPEG, |_| {}).await;
    let source = h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/playlist.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "tool_error");
    assert!(!source.with_file_name("ep.mkv.hls").exists());
    h.wait_idle().await;
}

#[tokio::test]
async fn failure_stays_visible_in_progress() {
    let h = TestHarness::start_with(StubProber::codec("hevc", 12.0), FAILING_FFMPEG, |_| {}).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/playlist.m3u8"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    h.wait_idle().await;

    let progress: serde_json::Value = h
        .client
        .get(h.url("/media/ep.mkv.hls/progress"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(progress["state"], "failed");
    assert_eq!(progress["progress"], 0);
    let error = progress["error"].as_str().unwrap();
    assert!(error.contains("exited"), "{error}");
    assert_eq!(h.hls_calls(), 1);
}

#[tokio::test]
async fn unknown_asset_is_404() {
    let h = TestHarness::start(StubProber::codec("h264", 12.0)).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv.hls/index.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.hls_calls(), 0);
}
