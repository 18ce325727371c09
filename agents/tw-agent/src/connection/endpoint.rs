//! Endpoint Resolution
//!
//! Builds the agent connection URL from the server base URL and the
//! connection identifier: `<base>/agent/<id>/connect`.

use reqwest::Url;

use crate::agent::error::AgentError;

/// A validated agent connection URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    url: Url,
}

impl Endpoint {
    /// The URL exactly as composed from its parts
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL with its scheme switched to the websocket equivalent
    /// (`http` -> `ws`, `https` -> `wss`).
    pub fn websocket_url(&self) -> Result<Url, AgentError> {
        let scheme = match self.url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(AgentError::invalid_endpoint(
                    &self.raw,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        };

        let mut url = self.url.clone();
        url.set_scheme(scheme).map_err(|_| {
            AgentError::invalid_endpoint(&self.raw, format!("cannot switch scheme to '{}'", scheme))
        })?;
        Ok(url)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Compose and validate the connection URL for `connection_id` under `base_url`.
pub fn resolve_endpoint(base_url: &str, connection_id: &str) -> Result<Endpoint, AgentError> {
    let raw = format!("{}/agent/{}/connect", base_url, connection_id);

    if connection_id.is_empty() {
        return Err(AgentError::invalid_endpoint(raw, "empty connection identifier"));
    }
    if connection_id == "." || connection_id == ".." {
        return Err(AgentError::invalid_endpoint(raw, "connection identifier is a dot segment"));
    }
    if let Err(reason) = check_path_segment(connection_id) {
        return Err(AgentError::invalid_endpoint(raw, reason));
    }
    // The URL parser would silently rewrite these into a different target.
    if !base_url.contains("://") || base_url.contains('\\') {
        return Err(AgentError::invalid_endpoint(
            raw,
            "base URL must be of the form scheme://host",
        ));
    }
    if let Some(c) = base_url.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(AgentError::invalid_endpoint(
            raw,
            format!("illegal character {:?} in base URL", c),
        ));
    }

    let url = Url::parse(&raw).map_err(|e| AgentError::invalid_endpoint(&raw, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(AgentError::invalid_endpoint(
            &raw,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.has_host() {
        return Err(AgentError::invalid_endpoint(&raw, "missing host"));
    }
    // A query or fragment in the base swallows the agent path.
    if url.query().is_some() || url.fragment().is_some() {
        return Err(AgentError::invalid_endpoint(
            &raw,
            "base URL must not carry a query or fragment",
        ));
    }

    Ok(Endpoint { raw, url })
}

/// Accepts RFC 3986 `pchar`s, with percent escapes only when well formed.
fn check_path_segment(segment: &str) -> Result<(), String> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(format!("malformed escape at index {} in connection identifier", i));
            }
            i += 3;
            continue;
        }
        let allowed = b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&b);
        if !allowed {
            let c = segment[i..].chars().next().unwrap_or('?');
            return Err(format!("illegal character {:?} in connection identifier", c));
        }
        i += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::error::FailureKind;

    #[test]
    fn test_resolve_default_endpoint() {
        let endpoint = resolve_endpoint("https://api.tower.nf", "abc123").unwrap();
        assert_eq!(endpoint.as_str(), "https://api.tower.nf/agent/abc123/connect");
        assert_eq!(endpoint.url().host_str(), Some("api.tower.nf"));
        assert_eq!(endpoint.url().path(), "/agent/abc123/connect");
    }

    #[test]
    fn test_resolve_keeps_exact_concatenation() {
        let cases = [
            ("https://api.tower.nf", "abc123"),
            ("http://localhost:8000", "agent-1_x.y~z"),
            ("https://tower.example.com/api", "A1b2C3"),
            ("wss://tower.example.com:8443", "id%20with%20escapes"),
        ];

        for (base, id) in cases {
            let endpoint = resolve_endpoint(base, id).unwrap();
            assert_eq!(endpoint.as_str(), format!("{}/agent/{}/connect", base, id));
        }
    }

    #[test]
    fn test_identifier_breaking_url_is_rejected() {
        for id in ["a b", "a/b", "a?b", "a#b", "a%zz", "a%2", "", "..", "a\"b", "ä"] {
            let err = resolve_endpoint("https://api.tower.nf", id).unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidEndpoint, "identifier {:?}", id);
        }
    }

    #[test]
    fn test_malformed_base_is_rejected() {
        for base in [
            "",
            "api.tower.nf",
            "not a url",
            "ftp://api.tower.nf",
            "https://api.tower.nf?x=1",
            "https://api.tower.nf#frag",
            "mailto:someone@tower.nf",
            "https:api.tower.nf",
            "https:/api.tower.nf",
            "https:\\\\api.tower.nf",
            "https://api.tower.nf\\evil",
        ] {
            let err = resolve_endpoint(base, "abc123").unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidEndpoint, "base {:?}", base);
        }
    }

    #[test]
    fn test_invalid_endpoint_message_names_url() {
        let err = resolve_endpoint("https://api.tower.nf", "a b").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid URI: https://api.tower.nf/agent/a b/connect - "));
    }

    #[test]
    fn test_websocket_url() {
        let secure = resolve_endpoint("https://api.tower.nf", "abc123").unwrap();
        assert_eq!(
            secure.websocket_url().unwrap().as_str(),
            "wss://api.tower.nf/agent/abc123/connect"
        );

        let plain = resolve_endpoint("http://localhost:8000", "abc123").unwrap();
        assert_eq!(
            plain.websocket_url().unwrap().as_str(),
            "ws://localhost:8000/agent/abc123/connect"
        );
    }
}
