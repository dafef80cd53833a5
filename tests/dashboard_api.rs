//! Dashboard HTTP API, served on an ephemeral loopback port.

mod common;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use common::{config_from_json, harness_with, test_wav, Harness, HarnessOptions};
use devnotify::dashboard::{build_router, DashboardState};
use devnotify::voice::text_hash;

const CONFIG: &str = r#"{
    "config": {
        "afk_threshold_seconds": 300,
        "credentials": { "discord_webhook": "https://discord.test/api/webhooks/1/secret" }
    },
    "profiles": {
        "p": {
            "a": [
                { "type": "sound", "sound": "blip" },
                { "type": "say", "text": "hi", "when": "present" },
                { "type": "toast", "message": "away", "when": "afk" }
            ],
            "quiet": [ { "type": "say", "text": "Boss done" } ],
            "chat": [ { "type": "discord", "text": "x" }, { "type": "slack", "text": "y" } ]
        }
    }
}"#;

/// Serve the router and return its base URL with the harness kept alive.
async fn start(idle_secs: u64) -> (String, Harness) {
    let h = harness_with(
        config_from_json(CONFIG),
        HarnessOptions {
            idle_secs,
            ..Default::default()
        },
    );
    let state = DashboardState::new(h.notifier.clone(), h.paths.clone(), h.voice_cache.clone());
    let app = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), h)
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn config_is_redacted() {
    let (base, h) = start(0).await;
    let resp = reqwest::get(format!("{base}/api/config")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("\"***\""));
    assert!(!body.contains("secret"));

    let original = &h.notifier.config().options.credentials.discord_webhook;
    assert!(original.ends_with("/secret"));
}

#[tokio::test]
async fn dry_run_uses_idle_probe() {
    let (base, h) = start(400).await;
    let (status, body) = post_json(&format!("{base}/api/test"), json!({ "profile": "p", "action": "a" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["would_run"], json!([true, false, true]));
    assert_eq!(body["afk"], json!(true));

    let (_, present) = post_json(
        &format!("{base}/api/test"),
        json!({ "profile": "p", "action": "a", "afk": false }),
    )
    .await;
    assert_eq!(present["would_run"], json!([true, true, false]));

    // Nothing was dispatched.
    assert!(h.output.peaks.lock().is_empty());
    assert!(h.notifier.store().entries(0).unwrap().is_empty());
}

#[tokio::test]
async fn unknown_action_is_404() {
    let (base, _h) = start(0).await;
    let (status, body) = post_json(&format!("{base}/api/trigger"), json!({ "profile": "p", "action": "nope" })).await;
    assert_eq!(status, 404);
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (status, _) = post_json(&format!("{base}/api/test"), json!({ "profile": "p", "action": "nope" })).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn trigger_dispatches_and_shows_in_history() {
    let (base, h) = start(0).await;
    let (status, body) = get_json(&format!("{base}/api/trigger?profile=p&action=quiet")).await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["outcome"], json!({ "status": "dispatched", "profile": "p", "ran": 1 }));
    assert_eq!(*h.speech.spoken.lock(), vec!["Boss done"]);

    let (_, history) = get_json(&format!("{base}/api/history?days=1")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["action"], json!("quiet"));

    let (_, summary) = get_json(&format!("{base}/api/summary?days=1")).await;
    assert_eq!(summary[0]["executions"], json!(1));

    let (_, stats) = get_json(&format!("{base}/api/stats")).await;
    assert_eq!(stats["storage"], json!("file"));
    assert_eq!(stats["entries"], json!(1));

    let (_, watch) = get_json(&format!("{base}/api/watch?range=week")).await;
    assert_eq!(watch["breakdown"]["total"], json!(1));
    assert_eq!(watch["breakdown"]["buckets"].as_array().unwrap().len(), 7);

    let (status, _) = get_json(&format!("{base}/api/watch?range=decade")).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn silent_mode_round_trip() {
    let (base, h) = start(0).await;
    let (_, on) = post_json(&format!("{base}/api/silent"), json!({ "minutes": 5 })).await;
    assert_eq!(on["silent"], json!(true));

    let (_, body) = post_json(&format!("{base}/api/trigger"), json!({ "profile": "p", "action": "quiet" })).await;
    assert_eq!(body["outcome"], json!({ "status": "skipped_silent" }));
    assert!(h.speech.spoken.lock().is_empty());

    let (_, off) = post_json(&format!("{base}/api/silent"), json!({ "off": true })).await;
    assert_eq!(off["silent"], json!(false));
    let (_, status) = get_json(&format!("{base}/api/silent")).await;
    assert_eq!(status["silent"], json!(false));

    let (code, _) = post_json(&format!("{base}/api/silent"), json!({ "minutes": -1 })).await;
    assert_eq!(code, 400);

    for minutes in [i64::MAX, 600_000_000_000] {
        let (code, body) = post_json(&format!("{base}/api/silent"), json!({ "minutes": minutes })).await;
        assert_eq!(code, 400, "{minutes}");
        assert!(body["error"].as_str().unwrap().contains("too large"), "{body}");
    }
    let (_, status) = get_json(&format!("{base}/api/silent")).await;
    assert_eq!(status["silent"], json!(false));
}

#[tokio::test]
async fn history_rejects_out_of_range_hours() {
    let (base, _h) = start(0).await;
    let (status, body) = get_json(&format!("{base}/api/history?hours=9000000000000")).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (status, body) = get_json(&format!("{base}/api/history?hours=24")).await;
    assert_eq!(status, 200);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn voice_play_validates_hash() {
    let (base, h) = start(0).await;
    let bad = reqwest::get(format!("{base}/api/voice/play/..%2F..%2Fetc")).await.unwrap();
    assert_eq!(bad.status().as_u16(), 400);
    let upper = reqwest::get(format!("{base}/api/voice/play/ABCDEF0123456789")).await.unwrap();
    assert_eq!(upper.status().as_u16(), 400);
    let missing = reqwest::get(format!("{base}/api/voice/play/0123456789abcdef")).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    h.voice_cache.add("Boss done", "test", &test_wav(1000)).unwrap();
    let hash = text_hash("Boss done");
    let ok = reqwest::get(format!("{base}/api/voice/play/{hash}")).await.unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert_eq!(ok.headers()["content-type"], "audio/wav");
    assert!(ok.bytes().await.unwrap().starts_with(b"RIFF"));
}

#[tokio::test]
async fn voice_lines_are_annotated_with_cache_hits() {
    let (base, h) = start(0).await;
    h.voice_cache.add("Boss done", "test", &test_wav(1000)).unwrap();
    post_json(&format!("{base}/api/trigger"), json!({ "profile": "p", "action": "quiet" })).await;

    let (_, lines) = get_json(&format!("{base}/api/voice?days=1")).await;
    assert_eq!(lines[0]["text"], json!("Boss done"));
    assert_eq!(lines[0]["count"], json!(1));
    assert_eq!(lines[0]["cached"], json!(true));
    assert_eq!(lines[0]["hash"], json!(text_hash("Boss done")));
}

#[tokio::test]
async fn credentials_report_presence() {
    let (base, _h) = start(0).await;
    let (_, body) = get_json(&format!("{base}/api/credentials")).await;
    let channels = &body[0]["channels"];
    assert_eq!(channels["discord"]["ok"], json!(true));
    assert_eq!(channels["slack"]["ok"], json!(false));
    assert_eq!(channels["slack"]["missing"], json!(["slack_webhook"]));
}

#[tokio::test]
async fn index_page_is_served() {
    let (base, _h) = start(0).await;
    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.text().await.unwrap().contains("/api/events"));
}
