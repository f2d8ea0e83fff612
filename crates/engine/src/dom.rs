//! DOM query surface
//!
//! The engine never talks to a browser directly. Everything it needs from
//! the rendered page goes through [`DomSurface`]; selector strings come from
//! [`crate::config::EngineConfig`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::columns::{HeaderCell, HeaderRow};
use crate::config::TableSelectors;
use crate::error::{Error, Result};

/// Opaque reference to a rendered element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal capability surface the engine drives
///
/// Implementations issue one operation at a time; the engine awaits each
/// call before starting the next.
#[async_trait]
pub trait DomSurface: Send + Sync {
    /// All elements matching `selector`, in document order
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Elements matching `selector` below `parent`, in document order
    async fn find_within(&self, parent: &ElementHandle, selector: &str)
        -> Result<Vec<ElementHandle>>;

    /// Rendered text content
    async fn text(&self, element: &ElementHandle) -> Result<String>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    async fn double_click(&self, element: &ElementHandle) -> Result<()>;

    /// Replace the value of an input
    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()>;

    /// Send a key press to an element
    async fn press(&self, element: &ElementHandle, key: &str) -> Result<()>;

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool>;

    async fn wait_visible(&self, element: &ElementHandle, timeout: Duration) -> Result<()>;

    async fn wait_hidden(&self, element: &ElementHandle, timeout: Duration) -> Result<()>;
}

/// First element matching `selector`
pub async fn find_first<S: DomSurface + ?Sized>(dom: &S, selector: &str) -> Result<ElementHandle> {
    dom.find_all(selector)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(selector))
}

/// First element matching `selector` below `parent`
pub async fn find_first_within<S: DomSurface + ?Sized>(
    dom: &S,
    parent: &ElementHandle,
    selector: &str,
) -> Result<ElementHandle> {
    dom.find_within(parent, selector)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("{} >> {}", parent, selector)))
}

/// Poll until `selector` matches and its first element is visible
pub async fn wait_for_selector<S: DomSurface + ?Sized>(
    dom: &S,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<ElementHandle> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(element) = dom.find_all(selector).await?.into_iter().next() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            dom.wait_visible(&element, remaining).await?;
            return Ok(element);
        }

        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: selector.to_string(),
                millis: timeout.as_millis() as u64,
            });
        }

        sleep(poll).await;
    }
}

/// Poll until nothing matching `selector` is left
pub async fn wait_for_absent<S: DomSurface + ?Sized>(
    dom: &S,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;

    loop {
        match dom.find_all(selector).await?.into_iter().next() {
            None => return Ok(()),
            Some(element) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if dom.wait_hidden(&element, remaining).await.is_ok() {
                    return Ok(());
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: format!("{} to disappear", selector),
                millis: timeout.as_millis() as u64,
            });
        }

        sleep(poll).await;
    }
}

/// Fixed settle delay after an action with no observable completion signal
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

/// Read the header rows of a table element
pub async fn read_header<S: DomSurface + ?Sized>(
    dom: &S,
    table: &ElementHandle,
    selectors: &TableSelectors,
) -> Result<Vec<HeaderRow>> {
    let mut rows = Vec::new();

    for row in dom.find_within(table, &selectors.header_row).await? {
        let row_id = dom.attribute(&row, &selectors.row_id_attribute).await?;

        let mut cells = Vec::new();
        for cell in dom.find_within(&row, &selectors.header_cell).await? {
            let column_id = dom
                .attribute(&cell, &selectors.column_attribute)
                .await?
                .unwrap_or_default();
            let span = dom
                .attribute(&cell, &selectors.span_attribute)
                .await?
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1);
            cells.push(HeaderCell::spanning(column_id, span));
        }

        rows.push(HeaderRow { row_id, cells });
    }

    debug!("Read {} header row(s) from {}", rows.len(), table);
    Ok(rows)
}

/// Texts of the cells of one body row
pub async fn row_texts<S: DomSurface + ?Sized>(
    dom: &S,
    row: &ElementHandle,
    cell_selector: &str,
) -> Result<Vec<String>> {
    let mut texts = Vec::new();
    for cell in dom.find_within(row, cell_selector).await? {
        texts.push(dom.text(&cell).await?.trim().to_string());
    }
    Ok(texts)
}
