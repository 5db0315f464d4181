//! Page steps: reading the active page and opening new ones.

use log::{debug, warn};
use serde_json::Value;

use super::value_as_text;
use crate::error::{HostError, StepError};
use crate::execution::step::StepResult;
use crate::host::Host;
use crate::workflow::model::{OpenPageConfig, ReadPageConfig};
use crate::workflow::wildcards::{matches_pattern, origin_of};

/// Reads the active page's text.
///
/// Access to the page origin is negotiated first. When a URL filter is
/// configured and the page does not match, nothing is extracted and the
/// upstream value is handed on unchanged.
pub async fn read_page(
    config: &ReadPageConfig,
    upstream: Value,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    let url = host.active_page_url().await?;
    let origin = origin_of(&url).ok_or_else(|| StepError::InvalidUrl(url.clone()))?;

    if !host.request_origin_permission(&origin).await? {
        return Err(HostError::PermissionDenied { origin }.into());
    }

    if let Some(filter) = config.url_filter.as_deref().filter(|f| !f.trim().is_empty()) {
        if !matches_pattern(filter.trim(), &url) {
            warn!("Page {} does not match filter '{}'; skipping read", url, filter);
            return Ok(StepResult::new(
                upstream,
                format!("Skipped: {} does not match URL filter '{}'", url, filter),
            ));
        }
    }

    let content = host.extract_page_content().await?;
    debug!("Read {} characters from {}", content.text.len(), content.url);

    let log = match &content.title {
        Some(title) => format!("Read page '{}' ({} characters)", title, content.text.chars().count()),
        None => format!("Read {} ({} characters)", content.url, content.text.chars().count()),
    };
    Ok(StepResult::new(Value::String(content.text), log))
}

/// Opens `config.url`, or the upstream text when no URL is configured.
pub async fn open_page(
    config: &OpenPageConfig,
    upstream: Value,
    host: &dyn Host,
) -> Result<StepResult, StepError> {
    let url = config
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| value_as_text(&upstream).trim().to_string());

    if url.is_empty() {
        return Err(StepError::MissingConfig { field: "url" });
    }
    if origin_of(&url).is_none() {
        return Err(StepError::InvalidUrl(url));
    }

    host.open_tab(&url).await?;
    Ok(StepResult::new(upstream, format!("Opened {}", url)))
}
