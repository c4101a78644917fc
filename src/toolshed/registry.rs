//! Configured tool shed lookup.

use url::Url;

use crate::config::ToolShedEntry;

/// A configured shed with its match key precomputed.
#[derive(Debug, Clone)]
struct RegisteredShed {
    name: String,
    url: String,
    /// `host[:port][/path]` without scheme or trailing slash.
    location: String,
    host: String,
}

/// Ordered registry of configured tool sheds.
///
/// Resolution walks the entries in configuration order and returns the
/// first one whose location matches the requested host.
#[derive(Debug, Clone, Default)]
pub struct ToolShedRegistry {
    sheds: Vec<RegisteredShed>,
}

impl ToolShedRegistry {
    /// Build a registry from configuration. Entries whose URL cannot be
    /// parsed are skipped with a warning.
    #[must_use]
    pub fn new(entries: &[ToolShedEntry]) -> Self {
        let sheds = entries
            .iter()
            .filter_map(|entry| match Url::parse(&entry.url) {
                Ok(url) => {
                    let host = url.host_str()?.to_string();
                    let authority = url
                        .port()
                        .map_or_else(|| host.clone(), |port| format!("{host}:{port}"));
                    let location =
                        format!("{authority}{}", url.path()).trim_end_matches('/').to_string();
                    Some(RegisteredShed {
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        location,
                        host,
                    })
                }
                Err(e) => {
                    tracing::warn!(shed = %entry.name, url = %entry.url, error = %e, "skipping tool shed");
                    None
                }
            })
            .collect();
        Self { sheds }
    }

    /// Resolve the host part of a tool guid to a configured shed URL.
    ///
    /// A shed matches when its location equals `toolshed`, when its bare host
    /// equals `toolshed`, or when its location starts with `toolshed`
    /// followed by `:` or `/`.
    #[must_use]
    pub fn resolve(&self, toolshed: &str) -> Option<&str> {
        let toolshed = toolshed.trim_end_matches('/');
        if toolshed.is_empty() {
            return None;
        }
        self.sheds
            .iter()
            .find(|shed| {
                shed.location == toolshed
                    || shed.host == toolshed
                    || shed
                        .location
                        .strip_prefix(toolshed)
                        .is_some_and(|rest| rest.starts_with(':') || rest.starts_with('/'))
            })
            .map(|shed| shed.url.as_str())
    }

    /// Names of the configured sheds, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sheds.iter().map(|shed| shed.name.as_str())
    }

    /// Number of configured sheds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheds.len()
    }

    /// Whether no shed is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheds.is_empty()
    }
}
