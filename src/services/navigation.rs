// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-app page navigation.
//!
//! Same-origin links load the target document, cut out its `<main>` region
//! and swap it into the current page, recording the URL in session history.
//! When the target cannot be loaded the offline page's fragment is shown
//! instead. This is fragment patching, not routing: there is no route table.
//!
//! The server answers `/api/fragment` with `resolve_fragment`.
//! `PageNavigator` models the client side of that exchange (current page,
//! history, fallback toasts) for embedders that drive the shell without a
//! browser.

use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;

use crate::services::fetch::{FetchError, FetchRequest, Fetcher};
use crate::services::view::{Toast, ViewModel};

/// Shown when neither the page nor the offline page could be loaded.
pub const NO_OFFLINE_PAGE_MESSAGE: &str = "No connection and no offline page available.";

/// Return the content between the first `<main ...>` and the following
/// `</main>`, case-insensitively. Documents without both markers are
/// returned whole.
pub fn extract_main(html: &str) -> &str {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let Some(open) = find_main_open(&lower) else {
        return html;
    };
    let Some(tag_end) = lower[open..].find('>').map(|i| open + i + 1) else {
        return html;
    };
    match lower[tag_end..].find("</main>") {
        Some(close) => &html[tag_end..tag_end + close],
        None => html,
    }
}

/// Find `<main` followed by `>` or whitespace, so `<mainframe>` is skipped.
fn find_main_open(lower: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = lower[from..].find("<main") {
        let start = from + i;
        match lower.as_bytes().get(start + 5) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                return Some(start)
            }
            _ => from = start + 5,
        }
    }
    None
}

/// A loaded main-content fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    pub url: String,
    pub html: String,
    /// True when this is the offline page standing in for `url`
    pub offline: bool,
}

/// Load the main fragment of one document.
pub async fn load_fragment(fetcher: &dyn Fetcher, url: &Url) -> Result<String, NavigationError> {
    let response = fetcher
        .fetch(&FetchRequest::resource(url.clone()))
        .await?;
    if !response.is_success() {
        return Err(NavigationError::Status(response.status));
    }
    let text = String::from_utf8_lossy(&response.body);
    Ok(extract_main(&text).to_string())
}

/// Load `url`'s fragment, falling back to the offline page's fragment.
pub async fn resolve_fragment(
    fetcher: &dyn Fetcher,
    url: &Url,
    offline_page: &Url,
) -> Result<Fragment, NavigationError> {
    match load_fragment(fetcher, url).await {
        Ok(html) => Ok(Fragment {
            url: url.to_string(),
            html,
            offline: false,
        }),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Page load failed, using offline page");
            let html = load_fragment(fetcher, offline_page).await?;
            Ok(Fragment {
                url: url.to_string(),
                html,
                offline: true,
            })
        }
    }
}

/// What a navigation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Not an in-app link; left to the browser
    Ignored,
    Loaded,
    /// The offline fragment was shown instead
    Offline,
    /// Nothing could be loaded; a toast was shown
    Failed,
}

/// Current page state: the main region plus session history.
pub struct PageNavigator {
    fetcher: Arc<dyn Fetcher>,
    offline_page: Url,
    view: ViewModel,
    current: Url,
    main_html: String,
    history: Vec<Url>,
}

impl PageNavigator {
    pub fn new(fetcher: Arc<dyn Fetcher>, start: Url, offline_page: Url, view: ViewModel) -> Self {
        Self {
            fetcher,
            offline_page,
            view,
            history: vec![start.clone()],
            current: start,
            main_html: String::new(),
        }
    }

    pub fn current(&self) -> &Url {
        &self.current
    }

    pub fn main_html(&self) -> &str {
        &self.main_html
    }

    pub fn history(&self) -> &[Url] {
        &self.history
    }

    /// Handle a click on a link with `href`.
    pub async fn click(&mut self, href: &str) -> NavigationOutcome {
        match self.in_app_target(href) {
            Some(url) => self.load_page(url, true).await,
            None => NavigationOutcome::Ignored,
        }
    }

    /// Back/forward: load `url` without adding a history entry.
    pub async fn pop_state(&mut self, url: Url) -> NavigationOutcome {
        self.load_page(url, false).await
    }

    /// Load `url` into the main region.
    pub async fn load_page(&mut self, url: Url, push_history: bool) -> NavigationOutcome {
        match load_fragment(self.fetcher.as_ref(), &url).await {
            Ok(html) => {
                self.main_html = html;
                if push_history {
                    self.history.push(url.clone());
                }
                self.current = url;
                NavigationOutcome::Loaded
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Page load failed, trying offline page");
                match load_fragment(self.fetcher.as_ref(), &self.offline_page).await {
                    Ok(html) => {
                        self.main_html = html;
                        NavigationOutcome::Offline
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Offline page unavailable");
                        self.view.toast(Toast::error(NO_OFFLINE_PAGE_MESSAGE));
                        NavigationOutcome::Failed
                    }
                }
            }
        }
    }

    /// Resolve `href` if it points into this app.
    fn in_app_target(&self, href: &str) -> Option<Url> {
        let url = self.current.join(href).ok()?;
        let same_origin = url.scheme() == self.current.scheme()
            && url.host_str() == self.current.host_str()
            && url.port_or_known_default() == self.current.port_or_known_default();
        same_origin.then_some(url)
    }
}

/// Errors while loading a page fragment.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Page answered with HTTP {0}")]
    Status(u16),
}
