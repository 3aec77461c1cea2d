pub mod meeting_tests;

use crate::utils::FakeDevices;
use anyhow::{Context, Result, bail};
use huddle_client::peer::LinkReport;
use huddle_client::{
    MediaPreferences, MeetingEvent, PeerLinkManager, SignalingChannel, TrackController,
};
use huddle_core::{ClientMessage, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::Level;

pub const WAIT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn acquired_media(devices: FakeDevices) -> TrackController {
    let mut tracks = TrackController::new(devices.shared());
    tracks
        .acquire_local_media(&MediaPreferences::default())
        .await
        .expect("fake devices provide media");
    tracks
}

/// Signaling channel whose messages land in the returned receiver.
pub fn outbox() -> (Arc<dyn SignalingChannel>, mpsc::UnboundedReceiver<ClientMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(tx), rx)
}

pub async fn next_signal(rx: &mut mpsc::UnboundedReceiver<ClientMessage>) -> Result<SignalMessage> {
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Some(ClientMessage::Signal(signal)) => return Ok(signal),
                Some(ClientMessage::Room(_)) => continue,
                None => bail!("outbox closed"),
            }
        }
    })
    .await
    .context("timed out waiting for a signal")?
}

/// Everything sent within `window`.
pub async fn drain_signals(
    rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    window: Duration,
) -> Vec<SignalMessage> {
    let mut signals = Vec::new();
    while let Ok(Some(msg)) = timeout(window, rx.recv()).await {
        if let ClientMessage::Signal(signal) = msg {
            signals.push(signal);
        }
    }
    signals
}

/// Processes reports until one accepted by the manager matches `pred`.
pub async fn wait_for_report(
    manager: &mut PeerLinkManager,
    pred: impl Fn(&LinkReport) -> bool,
) -> Result<LinkReport> {
    timeout(WAIT, async {
        loop {
            let Some(report) = manager.next_report().await else {
                bail!("report channel closed");
            };
            if let Some(report) = manager.handle_report(report)
                && pred(&report)
            {
                return Ok(report);
            }
        }
    })
    .await
    .context("timed out waiting for a link report")?
}

pub async fn wait_for_event(
    events: &mut mpsc::UnboundedReceiver<MeetingEvent>,
    pred: impl Fn(&MeetingEvent) -> bool,
) -> Result<MeetingEvent> {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return Ok(event),
                Some(_) => continue,
                None => bail!("meeting event stream closed"),
            }
        }
    })
    .await
    .context("timed out waiting for a meeting event")?
}

/// Polls `cond` until it holds.
pub async fn eventually(cond: impl Fn() -> bool) -> Result<()> {
    timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("condition never became true")
}
