use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::alerts::QueuedAlert;
use crate::api::ApiClient;
use crate::session::Session;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Repeating notification fetch. Each tick pulls the pending messages,
/// acknowledges them, and hands them to the alert dispatcher. A tick that
/// outlives the interval delays the next one instead of overlapping it.
pub async fn poll_loop(
    api: Arc<ApiClient>,
    session: Session,
    queue_tx: mpsc::Sender<QueuedAlert>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poll_once(&api, &session, &queue_tx).await {
                    Ok(0) => {}
                    Ok(count) => info!("queued {count} notification(s)"),
                    Err(err) => warn!("poll cycle failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                info!("poll loop shutting down");
                break;
            }
        }
    }
}

async fn poll_once(
    api: &ApiClient,
    session: &Session,
    queue_tx: &mpsc::Sender<QueuedAlert>,
) -> Result<usize> {
    let messages = api
        .fetch_notifications(session)
        .await
        .context("notification fetch failed")?;
    if messages.is_empty() {
        return Ok(0);
    }

    // Acknowledge before ringing so the next tick doesn't redeliver the
    // same batch. A failed ack is logged and the alerts still go out.
    match api.mark_notifications_read(session).await {
        Ok(updated) => info!("acknowledged {updated} notification(s)"),
        Err(err) => warn!("mark-read failed, next poll may redeliver: {err}"),
    }

    let count = messages.len();
    for message in messages {
        queue_tx
            .send(QueuedAlert::new(message))
            .await
            .context("alert queue closed")?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::authenticated("tok1")
    }

    #[tokio::test]
    async fn poll_once_queues_messages_in_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!(["one", "two"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/notifications/mark-read/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "updated": 2})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let count = poll_once(&api, &session(), &tx).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert_eq!(rx.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn empty_poll_skips_the_ack() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let (tx, _rx) = mpsc::channel(8);

        let count = poll_once(&api, &session(), &tx).await.unwrap();
        assert_eq!(count, 0);

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|req| req.method.as_str() == "GET"));
    }

    #[tokio::test]
    async fn failed_ack_still_delivers_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["one"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/notifications/mark-read/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let count = poll_once(&api, &session(), &tx).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(rx.recv().await.unwrap().message, "one");
    }

    #[tokio::test]
    async fn loop_keeps_firing_until_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let api = Arc::new(ApiClient::new(server.uri()).unwrap());
        let (tx, _rx) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(
            api,
            session(),
            tx,
            Duration::from_millis(20),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel_token.cancel();
        handle.await.unwrap();

        // One immediate tick plus several interval ticks; without the
        // cancel the loop has no other exit.
        let polls = server.received_requests().await.unwrap().len();
        assert!(polls >= 3, "expected repeated polls, saw {polls}");
    }

    #[tokio::test]
    async fn failed_poll_does_not_stop_the_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = Arc::new(ApiClient::new(server.uri()).unwrap());
        let (tx, _rx) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(
            api,
            session(),
            tx,
            Duration::from_millis(20),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_token.cancel();
        handle.await.unwrap();

        let polls = server.received_requests().await.unwrap().len();
        assert!(polls >= 2, "loop should survive failing ticks, saw {polls}");
    }
}
