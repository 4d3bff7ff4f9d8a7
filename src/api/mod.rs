//! HTTP wrappers for the WebNotify API. One method per endpoint; every
//! call except `login` takes an authenticated [`Session`]. No retries and
//! no backoff anywhere: a failed call is terminal for that operation.

mod error;
mod models;

pub use error::ApiError;
pub use models::{
    LoginRequest, LoginResponse, MarkReadResponse, SettingsEnvelope, SettingsUpdate, UserSettings,
    WatchedUrl,
};

use std::time::Duration;

use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};

use crate::session::Session;
use crate::validate;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /api/login/. A 4xx response means the credentials were
    /// rejected; anything else non-success is reported as-is.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        validate::email(email)?;

        let url = self.endpoint("/api/login/");
        debug!("login as {email}");
        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ApiError::InvalidCredentials);
        }
        let body: LoginResponse = ensure_success(response)?.json().await?;
        Ok(Session::authenticated(body.access))
    }

    /// GET /api/urls/. Server order is preserved; the client never
    /// re-sorts.
    pub async fn list_urls(&self, session: &Session) -> Result<Vec<WatchedUrl>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/urls/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        Ok(ensure_success(response)?.json().await?)
    }

    pub async fn add_url(
        &self,
        session: &Session,
        url: &str,
        css_selector: Option<&str>,
    ) -> Result<(), ApiError> {
        validate::watch_url(url)?;

        let response = self
            .http
            .post(self.endpoint("/api/urls/"))
            .bearer_auth(session.bearer()?)
            .json(&WatchedUrl {
                url: url.to_string(),
                css_selector: css_selector.map(str::to_string),
            })
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    /// DELETE /api/urls/{url}. The URL doubles as the identifier, so it
    /// travels percent-encoded in the path.
    pub async fn remove_url(&self, session: &Session, url: &str) -> Result<(), ApiError> {
        let encoded = urlencoding::encode(url);
        let response = self
            .http
            .delete(self.endpoint(&format!("/api/urls/{encoded}")))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    /// POST /api/sound/ as multipart form data, field `sound`. Content
    /// type and size are checked before anything is sent.
    pub async fn upload_sound(
        &self,
        session: &Session,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), ApiError> {
        validate::sound_upload(content_type, data.len())?;

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("sound", part);

        let response = self
            .http
            .post(self.endpoint("/api/sound/"))
            .bearer_auth(session.bearer()?)
            .multipart(form)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    /// GET /api/sound/. Returns the raw bytes of the user's current
    /// ringtone; an empty body means none is set.
    pub async fn fetch_sound_asset(&self, session: &Session) -> Result<Vec<u8>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/sound/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        Ok(ensure_success(response)?.bytes().await?.to_vec())
    }

    /// POST /api/settings/. The ring count is range-checked locally; an
    /// out-of-range value is never sent.
    pub async fn update_settings(
        &self,
        session: &Session,
        update: SettingsUpdate,
    ) -> Result<(), ApiError> {
        validate::ring_count(update.ring_count)?;

        let response = self
            .http
            .post(self.endpoint("/api/settings/"))
            .bearer_auth(session.bearer()?)
            .json(&update)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    pub async fn fetch_settings(&self, session: &Session) -> Result<UserSettings, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/settings/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        let envelope: SettingsEnvelope = ensure_success(response)?.json().await?;
        Ok(envelope.settings)
    }

    pub async fn start_monitoring(&self, session: &Session) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/start_monitoring/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    /// GET /api/notifications/. Pending message strings in server order.
    pub async fn fetch_notifications(&self, session: &Session) -> Result<Vec<String>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/notifications/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        Ok(ensure_success(response)?.json().await?)
    }

    /// POST /api/notifications/mark-read/. Acknowledges everything
    /// currently pending so the next poll starts from an empty queue.
    pub async fn mark_notifications_read(&self, session: &Session) -> Result<u64, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/notifications/mark-read/"))
            .bearer_auth(session.bearer()?)
            .send()
            .await?;
        let body: MarkReadResponse = ensure_success(response)?.json().await?;
        Ok(body.updated)
    }

    /// Fetch the default ringtone named by the settings payload. The URL
    /// may be absolute or server-relative; no bearer token is attached,
    /// matching how a static asset is served.
    pub async fn fetch_ringtone(&self, ringtone_url: &str) -> Result<Vec<u8>, ApiError> {
        let url = if ringtone_url.starts_with("http://") || ringtone_url.starts_with("https://") {
            ringtone_url.to_string()
        } else {
            self.endpoint(ringtone_url)
        };
        let response = self.http.get(&url).send().await?;
        Ok(ensure_success(response)?.bytes().await?.to_vec())
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status: StatusCode = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            url: response.url().to_string(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::authenticated("tok1")
    }

    #[tokio::test]
    async fn login_returns_authenticated_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login/"))
            .and(body_json(
                serde_json::json!({"email": "a@b.com", "password": "x"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access": "tok1"
            })))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let session = api.login("a@b.com", "x").await.unwrap();
        assert_eq!(session.bearer().unwrap(), "tok1");
    }

    #[tokio::test]
    async fn login_rejection_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api.login("a@b.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn malformed_email_never_reaches_the_server() {
        let server = MockServer::start().await;
        let api = ApiClient::new(server.uri()).unwrap();

        let err = api.login("not-an-email", "x").await.unwrap_err();
        assert!(err.is_validation());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_urls_carries_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/urls/"))
            .and(header("Authorization", "Bearer tok1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"url": "http://x.com", "css_selector": ".price"},
                {"url": "http://y.com", "css_selector": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let urls = api.list_urls(&session()).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].css_selector.as_deref(), Some(".price"));
    }

    #[tokio::test]
    async fn unauthenticated_calls_fail_locally() {
        let server = MockServer::start().await;
        let api = ApiClient::new(server.uri()).unwrap();

        let err = api.list_urls(&Session::Unauthenticated).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_url_rejects_non_http_schemes_before_sending() {
        let server = MockServer::start().await;
        let api = ApiClient::new(server.uri()).unwrap();

        let err = api
            .add_url(&session(), "ftp://x.com", None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_url_percent_encodes_the_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/urls/http%3A%2F%2Fx.com"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        api.remove_url(&session(), "http://x.com").await.unwrap();
    }

    #[tokio::test]
    async fn upload_sound_rejects_disallowed_mime_before_sending() {
        let server = MockServer::start().await;
        let api = ApiClient::new(server.uri()).unwrap();

        let err = api
            .upload_sound(&session(), "movie.mp4", "video/mp4", vec![0u8; 16])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_sound_sends_multipart_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sound/"))
            .and(header("Authorization", "Bearer tok1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        api.upload_sound(&session(), "ring.mp3", "audio/mpeg", vec![0u8; 64])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"sound\""));
    }

    #[tokio::test]
    async fn out_of_range_ring_count_is_never_sent() {
        let server = MockServer::start().await;
        let api = ApiClient::new(server.uri()).unwrap();

        for count in [0u32, 6, 42] {
            let err = api
                .update_settings(
                    &session(),
                    SettingsUpdate {
                        ring_count: count,
                        volume: None,
                        play_loop: None,
                    },
                )
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_settings_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/settings/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "settings": {
                    "ring_count": 3,
                    "volume": 80,
                    "play_loop": true,
                    "default_ringtone_url": "/static/audio/beep.mp3"
                }
            })))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let settings = api.fetch_settings(&session()).await.unwrap();
        assert_eq!(settings.ring_count, 3);
        assert_eq!(
            settings.default_ringtone_url.as_deref(),
            Some("/static/audio/beep.mp3")
        );
    }

    #[tokio::test]
    async fn fetch_notifications_preserves_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!(["first change", "second change"])),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let notes = api.fetch_notifications(&session()).await.unwrap();
        assert_eq!(notes, vec!["first change", "second change"]);
    }

    #[tokio::test]
    async fn fetch_ringtone_resolves_relative_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/audio/beep.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let bytes = api.fetch_ringtone("/static/audio/beep.mp3").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
