use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alarm::RingtonePlayer;
use crate::alerts::{dispatch_alerts, AlarmDefaults, AlertSink};
use crate::api::ApiClient;
use crate::poller::loop_worker::{poll_loop, DEFAULT_POLL_INTERVAL};
use crate::session::Session;

const ALERT_QUEUE_CAPACITY: usize = 32;

pub struct PollerSetup {
    pub api: Arc<ApiClient>,
    pub session: Session,
    pub player: Arc<dyn RingtonePlayer>,
    pub sink: Arc<dyn AlertSink>,
    pub defaults: AlarmDefaults,
    pub interval: Duration,
}

impl PollerSetup {
    pub fn new(
        api: Arc<ApiClient>,
        session: Session,
        player: Arc<dyn RingtonePlayer>,
        sink: Arc<dyn AlertSink>,
        defaults: AlarmDefaults,
    ) -> Self {
        Self {
            api,
            session,
            player,
            sink,
            defaults,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Owns the poll loop and the alert dispatcher. Start spawns both; stop
/// cancels the shared token and joins them. Idle and Polling are the only
/// two states.
pub struct PollerController {
    poll_handle: Option<JoinHandle<()>>,
    dispatch_handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl PollerController {
    pub fn new() -> Self {
        Self {
            poll_handle: None,
            dispatch_handle: None,
            cancel_token: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll_handle.is_some()
    }

    pub fn start(&mut self, setup: PollerSetup) -> Result<()> {
        if self.poll_handle.is_some() {
            bail!("polling already active");
        }

        let cancel_token = CancellationToken::new();
        let (queue_tx, queue_rx) = mpsc::channel(ALERT_QUEUE_CAPACITY);

        let dispatch_handle = tokio::spawn(dispatch_alerts(
            queue_rx,
            setup.api.clone(),
            setup.session.clone(),
            setup.player,
            setup.sink,
            setup.defaults,
            cancel_token.clone(),
        ));
        let poll_handle = tokio::spawn(poll_loop(
            setup.api,
            setup.session,
            queue_tx,
            setup.interval,
            cancel_token.clone(),
        ));

        info!(
            "polling started, interval {}s",
            setup.interval.as_secs_f64()
        );
        self.poll_handle = Some(poll_handle);
        self.dispatch_handle = Some(dispatch_handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.poll_handle.take() {
            handle.await.context("poll loop task failed to join")?;
        }
        if let Some(handle) = self.dispatch_handle.take() {
            handle.await.context("alert dispatcher failed to join")?;
        }
        Ok(())
    }
}

impl Default for PollerController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ConsoleAlert;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct SilentPlayer;

    #[async_trait]
    impl RingtonePlayer for SilentPlayer {
        async fn ring(&self, _data: Vec<u8>, times: u32) -> AnyResult<u32> {
            Ok(times)
        }
    }

    fn setup(server: &MockServer) -> PollerSetup {
        PollerSetup::new(
            Arc::new(ApiClient::new(server.uri()).unwrap()),
            Session::authenticated("tok1"),
            Arc::new(SilentPlayer),
            Arc::new(ConsoleAlert),
            AlarmDefaults::default(),
        )
        .interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut controller = PollerController::new();
        controller.start(setup(&server)).unwrap();
        assert!(controller.is_polling());
        assert!(controller.start(setup(&server)).is_err());
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_halts_the_polling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut controller = PollerController::new();
        controller.start(setup(&server)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        controller.stop().await.unwrap();
        assert!(!controller.is_polling());

        let before = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let after = server.received_requests().await.unwrap().len();
        assert_eq!(before, after, "no polls may fire after stop");
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_no_op() {
        let mut controller = PollerController::new();
        assert!(!controller.is_polling());
        controller.stop().await.unwrap();
    }
}
