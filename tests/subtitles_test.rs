//! Embedded subtitle extraction, track listing and SRT sidecars.
#![cfg(unix)]

mod common;

use common::{StubProber, TestHarness};
use reqwest::header;
use reqwest::StatusCode;
use rh_av::SubtitleTrack;

fn two_tracks() -> StubProber {
    StubProber::codec("h264", 60.0).with_tracks(vec![
        SubtitleTrack::new(2, "und"),
        SubtitleTrack::new(3, "eng"),
    ])
}

#[tokio::test]
async fn auto_picks_english_track() {
    let h = TestHarness::start(two_tracks()).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv?subtitle=auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/vtt; charset=utf-8");
    assert_eq!(
        resp.text().await.unwrap(),
        "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nHello there\n\n"
    );
    assert!(h.calls()[0].contains("-map 0:3 -f ass"), "{}", h.calls()[0]);
}

#[tokio::test]
async fn explicit_index_is_used_verbatim() {
    let h = TestHarness::start(two_tracks()).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv?subtitle=7"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(h.calls()[0].contains("-map 0:7 -f ass"));
}

#[tokio::test]
async fn auto_without_tracks_is_404() {
    let h = TestHarness::start(StubProber::codec("h264", 60.0)).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv?subtitle=auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn invalid_selector_is_400() {
    let h = TestHarness::start(two_tracks()).await;
    h.media_file("ep.mkv", b"source");

    let resp = h
        .client
        .get(h.url("/media/ep.mkv?subtitle=english"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn srt_sidecar_served_as_vtt() {
    let h = TestHarness::start(StubProber::default()).await;
    h.media_file("show/ep.srt", b"1\r\n00:00:05,250 --> 00:00:06,000\r\nHi\r\n");

    let resp = h.client.get(h.url("/media/show/ep.vtt")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/vtt; charset=utf-8");
    assert_eq!(
        resp.text().await.unwrap(),
        "WEBVTT\n\n00:00:05.250 --> 00:00:06.000\nHi\n"
    );
}

#[tokio::test]
async fn track_listing() {
    let h = TestHarness::start(two_tracks()).await;
    h.media_file("ep.mkv", b"source");

    let resp = h.client.get(h.url("/api/subtitles/ep.mkv")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["tracks"].as_array().unwrap().len(), 2);
    assert_eq!(body["tracks"][1]["language"], "eng");
    assert_eq!(body["preferred"], 3);

    let missing = h.client.get(h.url("/api/subtitles/nope.mkv")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
