use log::warn;

use crate::api::{ApiClient, ApiError, WatchedUrl};
use crate::session::Session;

/// The client's rendered copy of the server's URL list plus the add-form
/// input fields. The server stays the sole source of truth: every
/// mutation is followed by a fresh fetch, never a local edit of
/// `entries`.
#[derive(Debug, Default)]
pub struct Watchlist {
    entries: Vec<WatchedUrl>,
    url_input: String,
    selector_input: String,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[WatchedUrl] {
        &self.entries
    }

    pub fn inputs(&self) -> (&str, &str) {
        (&self.url_input, &self.selector_input)
    }

    pub fn set_inputs(&mut self, url: &str, selector: &str) {
        self.url_input = url.trim().to_string();
        self.selector_input = selector.trim().to_string();
    }

    pub async fn refresh(&mut self, api: &ApiClient, session: &Session) -> Result<(), ApiError> {
        self.entries = api.list_urls(session).await?;
        Ok(())
    }

    /// Submit the add form. On success the list is re-fetched and the
    /// inputs are cleared; on failure both are left untouched so the user
    /// can correct and resubmit.
    pub async fn submit(&mut self, api: &ApiClient, session: &Session) -> Result<(), ApiError> {
        let selector = if self.selector_input.is_empty() {
            None
        } else {
            Some(self.selector_input.as_str())
        };
        api.add_url(session, &self.url_input, selector).await?;

        self.refresh(api, session).await?;
        self.url_input.clear();
        self.selector_input.clear();
        Ok(())
    }

    /// Remove an entry. A failed delete is logged but not surfaced, and
    /// the list is re-fetched either way.
    pub async fn remove(
        &mut self,
        api: &ApiClient,
        session: &Session,
        url: &str,
    ) -> Result<(), ApiError> {
        if let Err(err) = api.remove_url(session, url).await {
            warn!("remove {url} failed: {err}");
        }
        self.refresh(api, session).await
    }
}
