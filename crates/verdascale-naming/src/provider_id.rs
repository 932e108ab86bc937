//! `verdacloud://<location>/<hostname>` providerIDs.

use std::fmt;

use crate::error::{NamingError, NamingResult};

pub const PROVIDER_ID_SCHEME: &str = "verdacloud://";

/// Lightweight handle on an instance, as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceRef {
    pub hostname: String,
    pub provider_id: String,
}

impl InstanceRef {
    pub fn new(location: &str, hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            provider_id: render(location, hostname),
        }
    }

    /// Parse a providerID handed back by the host.
    pub fn from_provider_id(provider_id: &str) -> NamingResult<Self> {
        let (_, hostname) = parse(provider_id)?;
        Ok(Self {
            hostname: hostname.to_string(),
            provider_id: provider_id.to_string(),
        })
    }

    /// Location segment of the providerID.
    pub fn location(&self) -> Option<&str> {
        parse(&self.provider_id).ok().map(|(loc, _)| loc)
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.provider_id)
    }
}

pub fn render(location: &str, hostname: &str) -> String {
    format!("{PROVIDER_ID_SCHEME}{location}/{hostname}")
}

/// Split a providerID into `(location, hostname)`.
pub fn parse(provider_id: &str) -> NamingResult<(&str, &str)> {
    let invalid = || NamingError::InvalidProviderId(provider_id.to_string());
    let rest = provider_id.strip_prefix(PROVIDER_ID_SCHEME).ok_or_else(invalid)?;
    let (location, hostname) = rest.split_once('/').ok_or_else(invalid)?;
    if location.is_empty() || hostname.is_empty() || hostname.contains('/') {
        return Err(invalid());
    }
    Ok((location, hostname))
}
