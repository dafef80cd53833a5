//! End-to-end trigger scenarios against fake audio/speech and wiremock
//! stand-ins for the chat services.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{config_from_json, harness, harness_with, test_wav, HarnessOptions};
use devnotify::eventlog::EntryKind;
use devnotify::trigger::{TriggerOutcome, TriggerRequest};
use devnotify::voice::text_hash;
use devnotify::NotifyError;

#[tokio::test]
async fn cooldown_skips_second_trigger() {
    let config = config_from_json(
        r#"{
            "config": { "cooldown": true, "cooldown_seconds": 60 },
            "profiles": { "p": { "a": [ { "type": "say", "text": "hi" } ] } }
        }"#,
    );
    let h = harness(config);

    let first = h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap();
    assert!(matches!(first, TriggerOutcome::Dispatched { ran: 1, .. }));
    let second = h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap();
    assert_eq!(second, TriggerOutcome::SkippedCooldown { seconds: 60 });
    assert_eq!(*h.speech.spoken.lock(), vec!["hi"]);

    let counted: Vec<EntryKind> = h
        .notifier
        .store()
        .entries(0)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .filter(|k| k.is_counted())
        .collect();
    assert_eq!(counted, vec![EntryKind::Execution, EntryKind::CooldownSkipped]);

    let content = h.notifier.store().read_content().unwrap();
    assert!(content.contains("cooldown=recorded (60s)"));
    assert!(content.contains("cooldown=skipped (60s)"));
}

#[tokio::test]
async fn afk_steps_replace_present_steps() {
    let config = config_from_json(
        r#"{
            "config": { "afk_threshold_seconds": 300 },
            "profiles": { "p": { "a": [
                { "type": "sound", "sound": "blip" },
                { "type": "say", "text": "hi", "when": "present" },
                { "type": "say", "text": "away", "when": "afk" }
            ] } }
        }"#,
    );
    let h = harness_with(
        config,
        HarnessOptions {
            idle_secs: 400,
            ..Default::default()
        },
    );

    h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap();
    assert_eq!(*h.speech.spoken.lock(), vec!["away"]);
    assert_eq!(h.output.peaks.lock().len(), 1);

    let entry = h.notifier.store().entries(0).unwrap().pop().unwrap();
    assert!(entry.afk);
    assert_eq!(entry.steps, vec!["sound", "say"]);
}

#[tokio::test]
async fn voice_cache_hit_bypasses_speech_engine() {
    let config = config_from_json(
        r#"{
            "profiles": { "boss": { "done": [ { "type": "say", "text": "Boss done", "volume": 50 } ] } }
        }"#,
    );
    let h = harness(config);
    let entry = h.voice_cache.add("Boss done", "test", &test_wav(10_000)).unwrap();
    assert_eq!(entry.hash, text_hash("Boss done"));

    h.notifier.trigger(&TriggerRequest::new("boss", "done")).await.unwrap();

    assert!(h.speech.spoken.lock().is_empty());
    assert_eq!(*h.output.peaks.lock(), vec![5_000]);
}

#[tokio::test]
async fn templated_text_is_never_served_from_cache() {
    let config = config_from_json(
        r#"{ "profiles": { "boss": { "done": [ { "type": "say", "text": "{Profile} done" } ] } } }"#,
    );
    let h = harness(config);
    h.voice_cache.add("Boss done", "test", &test_wav(10_000)).unwrap();

    h.notifier.trigger(&TriggerRequest::new("boss", "done")).await.unwrap();
    assert_eq!(*h.speech.spoken.lock(), vec!["Boss done"]);
    assert!(h.output.peaks.lock().is_empty());
}

#[tokio::test]
async fn telegram_voice_without_converter_fails_and_is_logged() {
    let server = MockServer::start().await;
    let config = config_from_json(
        r#"{
            "config": { "credentials": { "telegram_token": "123:abc", "telegram_chat_id": "42" } },
            "profiles": { "p": { "a": [ { "type": "telegram_voice", "text": "hi" } ] } }
        }"#,
    );
    let h = harness_with(
        config,
        HarnessOptions {
            telegram_api_base: server.uri(),
            ..Default::default()
        },
    );

    let err = h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap_err();
    assert!(matches!(err, NotifyError::Driver { .. }));
    assert!(err.to_string().contains("converter"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());

    let content = h.notifier.store().read_content().unwrap();
    assert!(content.contains("steps=telegram_voice"));
    assert!(content.contains("step[1] telegram_voice"));
}

#[tokio::test]
async fn network_channels_receive_expanded_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .and(body_json(json!({ "text": "Work finished make" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .and(body_json(json!({ "content": "work done" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_json(json!({ "chat_id": "42", "text": "took 1m5s" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"p":"work"}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_from_json(&format!(
        r#"{{
            "config": {{ "credentials": {{
                "slack_webhook": "{uri}/slack",
                "discord_webhook": "{uri}/discord",
                "telegram_token": "123:abc",
                "telegram_chat_id": "42"
            }} }},
            "profiles": {{ "work": {{ "done": [
                {{ "type": "slack", "text": "{{Profile}} finished {{command}}" }},
                {{ "type": "discord", "text": "{{profile}} done" }},
                {{ "type": "telegram", "text": "took {{duration}}" }},
                {{ "type": "webhook", "url": "{uri}/hook", "method": "put", "body": "{{\"p\":\"{{profile}}\"}}" }}
            ] }} }}
        }}"#,
        uri = server.uri()
    ));
    let h = harness_with(
        config,
        HarnessOptions {
            telegram_api_base: server.uri(),
            ..Default::default()
        },
    );

    let req = TriggerRequest::new("work", "done").command("make").duration_secs(65);
    let outcome = h.notifier.trigger(&req).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Dispatched { ran: 4, .. }));
}

#[tokio::test]
async fn one_failing_channel_does_not_stop_the_others() {
    let server = MockServer::start().await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(path("/slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_from_json(&format!(
        r#"{{
            "config": {{ "credentials": {{ "slack_webhook": "{uri}/slack" }} }},
            "profiles": {{ "p": {{ "a": [
                {{ "type": "webhook", "url": "{uri}/broken" }},
                {{ "type": "slack", "text": "still here" }},
                {{ "type": "say", "text": "local" }}
            ] }} }}
        }}"#,
        uri = server.uri()
    ));
    let h = harness(config);

    let err = h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("boom"), "{message}");
    assert_eq!(*h.speech.spoken.lock(), vec!["local"]);
    assert_eq!(h.notifier.store().entries(0).unwrap().len(), 1);
}

#[tokio::test]
async fn missing_credentials_fail_at_dispatch() {
    let config = config_from_json(
        r#"{ "profiles": { "p": { "a": [ { "type": "slack", "text": "hi" } ] } } }"#,
    );
    let h = harness(config);
    let err = h.notifier.trigger(&TriggerRequest::new("p", "a")).await.unwrap_err();
    assert!(matches!(err, NotifyError::CredentialMissing { .. }));
}

#[tokio::test]
async fn profile_credentials_override_globals() {
    let server = MockServer::start().await;
    Mock::given(path("/boss-slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_from_json(&format!(
        r#"{{
            "config": {{ "credentials": {{ "slack_webhook": "{uri}/global-slack" }} }},
            "profiles": {{
                "boss": {{
                    "aliases": ["b"],
                    "credentials": {{ "slack_webhook": "{uri}/boss-slack" }},
                    "done": [ {{ "type": "slack", "text": "hi" }} ]
                }}
            }}
        }}"#,
        uri = server.uri()
    ));
    let h = harness(config);
    h.notifier.trigger(&TriggerRequest::new("b", "done")).await.unwrap();
}
