//! Probe types and structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Status of a website root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    Online,
    Offline,
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteState::Online => write!(f, "online"),
            SiteState::Offline => write!(f, "offline"),
        }
    }
}

/// Status of a single route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteState {
    Success,
    Failure,
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteState::Success => write!(f, "success"),
            RouteState::Failure => write!(f, "failure"),
        }
    }
}

/// HTTP methods a route may be probed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// What to send when probing a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest<'a> {
    pub method: HttpMethod,
    /// Path relative to the website root
    pub path: &'a str,
    /// Raw request body, parsed as JSON at probe time
    pub body: Option<&'a str>,
}

/// Result of a route probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteProbe {
    pub state: RouteState,

    /// Serialized response payload on success, error description on failure
    pub response: Option<String>,
}

impl RouteProbe {
    /// Create a successful result
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            state: RouteState::Success,
            response: Some(response.into()),
        }
    }

    /// Create a failed result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            state: RouteState::Failure,
            response: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RouteState::Success
    }
}

/// Prober configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Upper bound for a single probe, including reading the body
    pub timeout: Duration,

    /// Captured route responses are truncated to this many characters
    pub max_response_len: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_response_len: 4096,
        }
    }
}
