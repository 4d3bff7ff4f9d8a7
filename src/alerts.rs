//! Alert presentation. Notifications fetched by the poller land in a
//! queue and are presented one at a time: show the message, fetch the
//! current alarm sound, ring it the configured number of times. A
//! shared-modal race between concurrent notifications cannot happen
//! here; the queue serializes them.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alarm::RingtonePlayer;
use crate::api::{ApiClient, UserSettings};
use crate::session::Session;
use crate::validate::{RING_COUNT_MAX, RING_COUNT_MIN};

/// Visual surface for a notification. The default implementation writes
/// to the terminal; tests record.
pub trait AlertSink: Send + Sync {
    fn show(&self, message: &str);
}

pub struct ConsoleAlert;

impl AlertSink for ConsoleAlert {
    fn show(&self, message: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        println!("\n=== WebNotify [{stamp}] ===");
        println!("{message}");
        println!("===========================");
    }
}

#[derive(Debug, Clone)]
pub struct QueuedAlert {
    pub id: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

impl QueuedAlert {
    pub fn new(message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message,
            received_at: Utc::now(),
        }
    }
}

/// Everything the dispatcher needs that comes from the stored settings.
/// The ring count is shared between clones: a settings change made from
/// the dashboard applies from the next display-and-ring cycle on.
#[derive(Clone)]
pub struct AlarmDefaults {
    ring_count: Arc<AtomicU32>,
    pub volume: Option<u32>,
    pub fallback_sound: Option<Vec<u8>>,
}

impl Default for AlarmDefaults {
    fn default() -> Self {
        Self::new(RING_COUNT_MIN)
    }
}

impl AlarmDefaults {
    pub fn new(ring_count: u32) -> Self {
        Self {
            ring_count: Arc::new(AtomicU32::new(
                ring_count.clamp(RING_COUNT_MIN, RING_COUNT_MAX),
            )),
            volume: None,
            fallback_sound: None,
        }
    }

    fn from_settings(settings: &UserSettings) -> Self {
        Self {
            volume: settings.volume,
            ..Self::new(settings.ring_count)
        }
    }

    pub fn ring_count(&self) -> u32 {
        self.ring_count.load(Ordering::SeqCst)
    }

    /// Out-of-range values are clamped, not rejected; validation against
    /// the server happens before this is ever called.
    pub fn set_ring_count(&self, count: u32) {
        self.ring_count
            .store(count.clamp(RING_COUNT_MIN, RING_COUNT_MAX), Ordering::SeqCst);
    }
}

/// Startup settings load. Any failure here is silently absorbed and the
/// defaults stand; the user sees no error for a missing ringtone.
pub async fn load_alarm_defaults(api: &ApiClient, session: &Session) -> AlarmDefaults {
    let settings = match api.fetch_settings(session).await {
        Ok(settings) => settings,
        Err(err) => {
            info!("settings load failed, using defaults: {err}");
            return AlarmDefaults::default();
        }
    };

    let mut defaults = AlarmDefaults::from_settings(&settings);
    if let Some(url) = settings.default_ringtone_url.as_deref() {
        match api.fetch_ringtone(url).await {
            Ok(bytes) if !bytes.is_empty() => defaults.fallback_sound = Some(bytes),
            Ok(_) => {}
            Err(err) => info!("default ringtone fetch failed: {err}"),
        }
    }
    defaults
}

/// Drain the alert queue until cancelled.
pub async fn dispatch_alerts(
    mut queue: mpsc::Receiver<QueuedAlert>,
    api: Arc<ApiClient>,
    session: Session,
    player: Arc<dyn RingtonePlayer>,
    sink: Arc<dyn AlertSink>,
    defaults: AlarmDefaults,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            alert = queue.recv() => {
                let Some(alert) = alert else { break };
                debug!("dequeued alert {} received {}", alert.id, alert.received_at);
                display_and_ring(&alert, &api, &session, player.as_ref(), sink.as_ref(), &defaults)
                    .await;
            }
            _ = cancel_token.cancelled() => {
                info!("alert dispatcher shutting down");
                break;
            }
        }
    }
}

/// One display-and-ring cycle: modal first, then the alarm sound fetched
/// fresh for this notification, played exactly `ring_count` times.
pub async fn display_and_ring(
    alert: &QueuedAlert,
    api: &ApiClient,
    session: &Session,
    player: &dyn RingtonePlayer,
    sink: &dyn AlertSink,
    defaults: &AlarmDefaults,
) {
    sink.show(&alert.message);

    let sound = match api.fetch_sound_asset(session).await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            info!("alert {}: no server sound set", alert.id);
            defaults.fallback_sound.clone()
        }
        Err(err) => {
            warn!("alert {}: sound fetch failed: {err}", alert.id);
            defaults.fallback_sound.clone()
        }
    };

    let Some(data) = sound else {
        info!("alert {}: no sound available, skipping audio", alert.id);
        return;
    };

    let ring_count = defaults.ring_count();
    match player.ring(data, ring_count).await {
        Ok(played) => info!("alert {}: played {played}/{ring_count} repetitions", alert.id),
        Err(err) => warn!("alert {}: playback failed: {err}", alert.id),
    }
}
