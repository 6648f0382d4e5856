//! Origin allow-list hook
//!
//! Browsers send an `Origin` header on the WebSocket handshake, and upload
//! requests may name the page origin in their payload. Both are checked
//! against the configured policy. The default policy allows everything.

/// Which origins may talk to the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    #[default]
    AllowAll,
    /// Normalized `scheme://host` keys, see [`origin_key`]
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Build an allow-list from raw origins. An empty list allows everything.
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = origins
            .into_iter()
            .filter_map(|o| origin_key(o.as_ref()))
            .collect();
        if keys.is_empty() {
            Self::AllowAll
        } else {
            Self::AllowList(keys)
        }
    }

    /// Check an origin. A missing origin only passes when everything does.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match self {
            Self::AllowAll => true,
            Self::AllowList(keys) => origin
                .and_then(origin_key)
                .is_some_and(|key| keys.contains(&key)),
        }
    }
}

/// Reduce an origin or URL to `scheme://host`.
///
/// Lowercases, drops credentials, port, path, query and a leading `www.`.
/// A missing scheme is treated as `https`. Non-HTTP schemes yield `None`.
pub fn origin_key(origin: &str) -> Option<String> {
    let lower = origin.trim().to_ascii_lowercase();
    let (scheme, rest) = match lower.split_once("://") {
        Some((scheme @ ("http" | "https"), rest)) => (scheme, rest),
        Some(_) => return None,
        None => ("https", lower.as_str()),
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() {
        None
    } else {
        Some(format!("{}://{}", scheme, host))
    }
}
