//! Request-target classification per RFC 7230 §5.3.

use std::collections::HashMap;

use crate::error::HttpError;

/// One of the four request-target forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `/where?q=now` — a path plus optional query parameters.
    Origin {
        path: String,
        params: HashMap<String, String>,
    },
    /// `http://www.example.org/pub/WWW/TheProject.html` — full URI,
    /// seen by proxies.
    Absolute(String),
    /// `www.example.com:80` — host and port, only for CONNECT.
    Authority(String),
    /// `*` — the whole server, only for OPTIONS.
    Asterisk,
}

impl Target {
    /// Classify a request target.
    ///
    /// Classification order matters: `*` first, then authority (no
    /// scheme, no slash), then absolute (has a scheme), then origin. An
    /// origin target with a `?` but no parseable `key=value` pair is
    /// invalid, as is the empty string.
    pub fn parse(target: &str) -> Result<Target, HttpError> {
        if target.is_empty() {
            return Err(HttpError::InvalidTarget(target.to_string()));
        }
        if target == "*" {
            return Ok(Target::Asterisk);
        }
        if !target.contains("://") && !target.contains('/') {
            return Ok(Target::Authority(target.to_string()));
        }
        if target.contains("://") {
            return Ok(Target::Absolute(target.to_string()));
        }

        let Some(query_start) = target.find('?') else {
            return Ok(Target::Origin {
                path: target.to_string(),
                params: HashMap::new(),
            });
        };

        let path = target[..query_start].to_string();
        let query = &target[query_start + 1..];
        let mut params = HashMap::new();
        for pair in query.split('&') {
            if let Some(eq) = pair.find('=') {
                params.insert(pair[..eq].to_string(), pair[eq + 1..].to_string());
            }
        }
        // A '?' was present, so empty params mean a malformed query.
        if params.is_empty() {
            return Err(HttpError::InvalidTarget(target.to_string()));
        }
        Ok(Target::Origin { path, params })
    }

    /// The path of an origin-form target.
    pub fn path(&self) -> Option<&str> {
        match self {
            Target::Origin { path, .. } => Some(path),
            _ => None,
        }
    }
}
