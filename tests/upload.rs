mod common;

use common::{api_for, audio_file, requests_to, FakeWaveform, RecordingSurface, UiEvent};
use qwen_voice_console::{Console, ConsoleError, ModelKind, Region};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_upload_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/upload_temp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "filename": "a1b2_voice.wav",
            "path": "/srv/output/a1b2_voice.wav"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn started_console(server: &MockServer, duration: f64) -> Console<RecordingSurface, FakeWaveform> {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_loaded": "base",
            "vram_used_gb": 3.25
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/speakers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "vivian", "name": "Vivian", "gender": "female", "lang": "Chinese"}
        ])))
        .mount(server)
        .await;
    Console::start(
        api_for(server),
        RecordingSurface::default(),
        FakeWaveform::with_duration(duration),
    )
    .await
}

#[tokio::test]
async fn startup_reads_status_and_speakers() {
    let server = MockServer::start().await;
    let console = started_console(&server, 30.0).await;

    assert_eq!(console.session().active_model(), Some(ModelKind::Base));
    assert_eq!(console.speakers().len(), 1);
    assert!(console
        .surface()
        .contains(&UiEvent::Status("Model: base | VRAM: 3.25 GB".to_string())));
    assert!(console.surface().alerts().is_empty());
}

#[tokio::test]
async fn upload_then_extract_uses_default_region() {
    let server = MockServer::start().await;
    let mut console = started_console(&server, 30.0).await;
    mount_upload_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Buongiorno a tutti"})))
        .expect(1)
        .mount(&server)
        .await;

    let asset = audio_file("voice");
    let uploaded = console.load_asset(asset.path()).await.unwrap();
    assert_eq!(uploaded.server_filename, "a1b2_voice.wav");
    assert_eq!(console.session().selected_region(), Region::new(0.0, 10.0));
    assert!(console.segments().is_loaded());
    assert!(console
        .surface()
        .contains(&UiEvent::RegionInfo("10.00s (0.00s - 10.00s)".to_string())));

    let text = console.extract_text().await.unwrap();
    assert_eq!(text.as_deref(), Some("Buongiorno a tutti"));
    assert_eq!(console.session().reference_text(), "Buongiorno a tutti");
    assert!(console
        .surface()
        .contains(&UiEvent::ReferenceText("Buongiorno a tutti".to_string())));
    // Transcription took over the GPU slot.
    assert_eq!(console.session().active_model(), None);

    let transcribe = requests_to(&server, "/api/transcribe").await;
    let payload: Value = serde_json::from_slice(&transcribe[0].body).unwrap();
    assert_eq!(payload, json!({"filename": "a1b2_voice.wav", "start": 0.0, "end": 10.0}));

    let upload = requests_to(&server, "/api/upload_temp").await;
    let body = String::from_utf8_lossy(&upload[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(console.surface().busy_balanced());
}

#[tokio::test]
async fn adjusted_region_is_sent_for_extraction() {
    let server = MockServer::start().await;
    let mut console = started_console(&server, 30.0).await;
    mount_upload_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "ciao"})))
        .mount(&server)
        .await;

    let asset = audio_file("voice");
    console.load_asset(asset.path()).await.unwrap();
    console.adjust_region(Region::new(2.5, 7.0).unwrap());
    console.extract_text().await.unwrap();

    let transcribe = requests_to(&server, "/api/transcribe").await;
    let payload: Value = serde_json::from_slice(&transcribe[0].body).unwrap();
    assert_eq!(payload["start"], 2.5);
    assert_eq!(payload["end"], 7.0);
}

#[tokio::test]
async fn short_asset_without_region_transcribes_everything() {
    let server = MockServer::start().await;
    let mut console = started_console(&server, 0.0).await;
    mount_upload_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "ciao"})))
        .mount(&server)
        .await;

    let asset = audio_file("voice");
    console.load_asset(asset.path()).await.unwrap();
    assert!(console.session().selected_region().is_none());
    console.extract_text().await.unwrap();

    let transcribe = requests_to(&server, "/api/transcribe").await;
    let payload: Value = serde_json::from_slice(&transcribe[0].body).unwrap();
    assert_eq!(payload["start"], 0.0);
    assert!(payload["end"].is_null());
}

#[tokio::test]
async fn upload_failure_alerts_and_clears_busy() {
    let server = MockServer::start().await;
    let mut console = started_console(&server, 30.0).await;
    Mock::given(method("POST"))
        .and(path("/api/upload_temp"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "No file part"})))
        .mount(&server)
        .await;

    let asset = audio_file("voice");
    let err = console.load_asset(asset.path()).await.unwrap_err();

    assert!(matches!(err, ConsoleError::Upload(_)));
    assert_eq!(err.to_string(), "Upload failed: No file part");
    assert_eq!(console.surface().alerts(), vec!["Upload failed: No file part".to_string()]);
    assert!(console.surface().contains(&UiEvent::Busy("Uploading audio...".to_string())));
    assert!(console.surface().busy_balanced());
    assert!(console.session().uploaded_asset().is_none());
    assert!(!console.segments().is_loaded());
}

#[tokio::test]
async fn extract_before_upload_does_nothing() {
    let server = MockServer::start().await;
    let mut console = Console::new(
        api_for(&server),
        RecordingSurface::default(),
        FakeWaveform::with_duration(30.0),
    );

    assert_eq!(console.extract_text().await.unwrap(), None);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(console.surface().events().is_empty());
}

#[tokio::test]
async fn transcription_error_body_is_alerted_and_frees_the_model() {
    let server = MockServer::start().await;
    let mut console = started_console(&server, 30.0).await;
    mount_upload_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Whisper failed to load"})))
        .expect(1)
        .mount(&server)
        .await;

    let asset = audio_file("voice");
    console.load_asset(asset.path()).await.unwrap();
    let err = console.extract_text().await.unwrap_err();

    assert!(matches!(err, ConsoleError::Server(_)));
    assert_eq!(err.to_string(), "Server error: Whisper failed to load");
    assert_eq!(console.surface().alerts(), vec![err.to_string()]);
    assert_eq!(console.session().reference_text(), "");
    assert_eq!(console.session().active_model(), None);
    assert!(console.surface().busy_balanced());
}

#[tokio::test]
async fn overlong_region_is_clamped_in_widget_and_session() {
    let server = MockServer::start().await;
    let mut console = Console::new(
        api_for(&server),
        RecordingSurface::default(),
        FakeWaveform::with_duration(8.0),
    );

    let kept = console.on_region_created(1, Region::new(2.0, 12.0).unwrap());

    let clamped = Region::new(2.0, 8.0).unwrap();
    assert_eq!(kept, Some(clamped));
    assert_eq!(console.session().selected_region(), Some(clamped));
    assert_eq!(console.segments().widget().redrawn, vec![(1, clamped)]);
    assert!(console
        .surface()
        .contains(&UiEvent::RegionInfo("6.00s (2.00s - 8.00s)".to_string())));
}
