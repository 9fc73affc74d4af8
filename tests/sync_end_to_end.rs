//! Full path from assistant text to actuator frames over a real WebSocket.

use futures_util::{SinkExt, StreamExt};
use hapticsync::audio::PcmContainer;
use hapticsync::pipeline::{CollectingNotifier, SessionContext};
use hapticsync::{Config, Result, SpeechSynthesizer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Half a second of audio per chunk at 1 kHz mono.
struct ToneSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        let mut pcm = PcmContainer::empty(1, 1000);
        pcm.samples = vec![500; 500];
        pcm.to_wav_bytes()
    }
}

/// Minimal actuator server: answers the handshake with one vibrating device
/// and forwards every other client message.
async fn fake_server() -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if frame.is_close() {
                break;
            }
            let Ok(text) = frame.into_text() else {
                continue;
            };
            let parsed: Value = serde_json::from_str(&text).unwrap();
            let message = &parsed[0];

            let reply = if message.get("RequestServerInfo").is_some() {
                Some(r#"[{"ServerInfo":{"Id":1,"ServerName":"fake","MessageVersion":3}}]"#)
            } else if message.get("RequestDeviceList").is_some() {
                Some(
                    r#"[{"DeviceList":{"Id":3,"Devices":[{"DeviceIndex":0,"DeviceName":"Test Vibe","DeviceMessages":{"VibrateCmd":{},"StopDeviceCmd":{}}}]}}]"#,
                )
            } else {
                if tx.send(message.clone()).is_err() {
                    break;
                }
                None
            };

            if let Some(reply) = reply {
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
        }
    });

    (address, rx)
}

async fn connected_context(address: String) -> SessionContext {
    let mut config = Config::default();
    config.actuator.server_address = address;
    config.speech.message_debounce_ms = 10;
    let context = SessionContext::open(config, Arc::new(CollectingNotifier::new()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while context.session().selected_device().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("device selected");
    context
}

fn vibrate_speed(message: &Value) -> Option<f64> {
    message.get("VibrateCmd")?["Speeds"][0]["Speed"].as_f64()
}

/// Receive vibrate speeds until `want` shows up.
async fn speeds_until(rx: &mut mpsc::UnboundedReceiver<Value>, want: f64) -> Vec<f64> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(message) = rx.recv().await {
            if let Some(speed) = vibrate_speed(&message) {
                seen.push(speed);
                if (speed - want).abs() < 1e-9 {
                    break;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw speed {want}, got {seen:?}"));
    seen
}

#[tokio::test]
async fn test_directive_reaches_device_during_playback() {
    let (address, mut frames) = fake_server().await;
    let context = connected_context(address).await;
    let pipeline = context.pipeline(Arc::new(ToneSynthesizer));

    let spoken = pipeline
        .speak("Hello there! {vibrate:0.5} Nice to see you.")
        .await
        .unwrap()
        .expect("audio");
    assert_eq!(spoken.prepared.timeline.len(), 1);
    assert_eq!(spoken.prepared.timeline[0].word_index, 1);

    pipeline.wait_finished().await;
    let seen = speeds_until(&mut frames, 0.5).await;
    assert_eq!(seen.last(), Some(&0.5));

    drop(pipeline);
    context.close().await;
}

#[tokio::test]
async fn test_new_message_stops_previous_actuation() {
    let (address, mut frames) = fake_server().await;
    let context = connected_context(address).await;
    let pipeline = context.pipeline(Arc::new(ToneSynthesizer));

    pipeline
        .speak("{vibrate:0.7; duration:30} Long buzz ahead.")
        .await
        .unwrap()
        .expect("audio");
    speeds_until(&mut frames, 0.7).await;

    // Preparing the next message performs a full stop.
    pipeline.speak("Quiet now.").await.unwrap();
    let after = speeds_until(&mut frames, 0.0).await;
    assert_eq!(after, vec![0.0]);
    assert!(!context.scheduler().generation().token_for(0).is_live());

    drop(pipeline);
    context.close().await;
}
