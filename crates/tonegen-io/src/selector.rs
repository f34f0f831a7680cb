//! Device selector parsing and endpoint resolution.

use crate::backend::{Endpoint, OutputBackend};
use crate::{Error, Result};
use tonegen_core::DEFAULT_SELECTOR;

/// Parsed form of the user-facing device selector string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Blank: stream nowhere, idle.
    Blank,
    /// `"default"` (any case): follow the system default endpoint.
    Default,
    /// Match an endpoint by name.
    Named(String),
}

impl DeviceSelector {
    /// Classify a selector string.
    pub fn parse(selector: &str) -> Self {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            DeviceSelector::Blank
        } else if trimmed.eq_ignore_ascii_case(DEFAULT_SELECTOR) {
            DeviceSelector::Default
        } else {
            DeviceSelector::Named(trimmed.to_string())
        }
    }

    /// Whether there is nothing to resolve.
    pub fn is_blank(&self) -> bool {
        matches!(self, DeviceSelector::Blank)
    }
}

/// Resolve `selector` to one active endpoint.
///
/// Matching order:
///
/// 1. `"default"` (case-insensitive) picks the system default endpoint when
///    one exists; otherwise the name passes below run on the literal string.
/// 2. An endpoint whose name equals the selector exactly.
/// 3. The first endpoint, in enumeration order, whose name is contained in
///    the selector (so `"Speakers (USB Audio)"` still finds `"Speakers"`).
/// 4. The first endpoint whose name contains the selector, ignoring case
///    (so `usb` finds `"USB Audio Device"`).
///
/// Endpoints that are not chosen are dropped. Returns
/// [`Error::NoMatchingDevice`] when nothing matches, including a blank
/// selector.
pub fn resolve_endpoint(backend: &dyn OutputBackend, selector: &str) -> Result<Endpoint> {
    let parsed = DeviceSelector::parse(selector);
    let name = match parsed {
        DeviceSelector::Blank => return Err(Error::NoMatchingDevice(selector.to_string())),
        DeviceSelector::Default => {
            if let Some(endpoint) = backend.default_output_endpoint()? {
                return Ok(endpoint);
            }
            selector.trim().to_string()
        }
        DeviceSelector::Named(name) => name,
    };

    let endpoints = backend.output_endpoints()?;
    match_by_name(endpoints, &name).ok_or(Error::NoMatchingDevice(name))
}

fn match_by_name(endpoints: Vec<Endpoint>, selector: &str) -> Option<Endpoint> {
    let candidates: Vec<Endpoint> = endpoints
        .into_iter()
        .filter(|e| !e.name.trim().is_empty())
        .collect();

    if let Some(index) = candidates.iter().position(|e| e.name == selector) {
        return candidates.into_iter().nth(index);
    }

    if let Some(index) = candidates
        .iter()
        .position(|e| selector.contains(e.name.as_str()))
    {
        return candidates.into_iter().nth(index);
    }

    let selector_lower = selector.to_lowercase();
    candidates
        .into_iter()
        .find(|e| e.name.to_lowercase().contains(&selector_lower))
}

/// All active endpoints, with the default one flagged.
///
/// Used for display (device pickers, `tonegen devices`).
pub fn list_output_endpoints(backend: &dyn OutputBackend) -> Result<Vec<(Endpoint, bool)>> {
    let default_id = backend.default_output_endpoint()?.map(|e| e.id);
    Ok(backend
        .output_endpoints()?
        .into_iter()
        .map(|e| {
            let is_default = default_id.as_ref() == Some(&e.id);
            (e, is_default)
        })
        .collect())
}
