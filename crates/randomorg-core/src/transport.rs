//! Transport strategy trait and per-call context.
//!
//! Every backend implements [`Transport`]. The client holds one concrete value
//! per [`BackendKind`] and dispatches with a `match`, so the trait is a
//! capability contract rather than a vtable.

use crate::config::{AuthMode, TransportConfig};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::request::{BackendKind, RandomRequest, RandomResult};

/// Everything a backend needs for one call.
pub struct CallContext<'a> {
    pub http: &'a dyn HttpClient,
    /// Effective settings after per-call overrides.
    pub transport: &'a TransportConfig,
    /// Process-wide default key, used when the request carries none.
    pub default_api_key: Option<&'a str>,
}

impl CallContext<'_> {
    /// The request's own key, else the default.
    pub fn api_key<'r>(&'r self, request: &'r RandomRequest) -> Result<&'r str> {
        self.resolve_key(request.api_key.as_deref())
    }

    /// `explicit` if given, else the default. Blank keys count as missing.
    pub fn resolve_key<'r>(&'r self, explicit: Option<&'r str>) -> Result<&'r str> {
        let usable = |k: &&str| !k.trim().is_empty();
        explicit
            .filter(usable)
            .or(self.default_api_key.filter(usable))
            .ok_or_else(|| {
                Error::Auth(format!(
                    "no API key: pass one with the request or set {}",
                    crate::config::API_KEY_ENV
                ))
            })
    }
}

/// Static description of a backend.
#[derive(Debug, Clone, Copy)]
pub struct TransportInfo {
    pub kind: BackendKind,
    pub description: &'static str,
    /// Credentials the backend expects.
    pub auth: AuthMode,
    /// Whether the backend can return signed results.
    pub signing: bool,
}

/// One way of fetching random integers.
pub trait Transport: Send + Sync {
    fn info(&self) -> &TransportInfo;

    fn kind(&self) -> BackendKind {
        self.info().kind
    }

    fn supports_signing(&self) -> bool {
        self.info().signing
    }

    /// Issue one request and decode the reply.
    ///
    /// Implementations enforce [`RandomRequest::check_values`] before
    /// returning, and reject `signed` requests they cannot honor without
    /// touching the network.
    fn fetch(&self, request: &RandomRequest, ctx: &CallContext<'_>) -> Result<RandomResult>;

    /// Fail fast on signed requests this backend cannot sign.
    fn ensure_signing(&self, request: &RandomRequest) -> Result<()> {
        if request.signed && !self.supports_signing() {
            return Err(Error::unsupported(self.kind(), "signed results"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::testing::ScriptedHttp;

    #[test]
    fn request_key_beats_default() {
        let http = ScriptedHttp::default();
        let cfg = TransportConfig::new("http://x", AuthMode::ApiKey);
        let ctx = CallContext {
            http: &http,
            transport: &cfg,
            default_api_key: Some("default"),
        };
        let req = RandomRequest::integers(1, 0, 1).with_api_key("mine");
        assert_eq!(ctx.api_key(&req).unwrap(), "mine");
        let req = RandomRequest::integers(1, 0, 1);
        assert_eq!(ctx.api_key(&req).unwrap(), "default");
    }

    #[test]
    fn blank_request_key_falls_back_to_default() {
        let http = ScriptedHttp::default();
        let cfg = TransportConfig::new("http://x", AuthMode::ApiKey);
        let ctx = CallContext {
            http: &http,
            transport: &cfg,
            default_api_key: Some("default"),
        };
        let req = RandomRequest::integers(1, 0, 1).with_api_key("  ");
        assert_eq!(ctx.api_key(&req).unwrap(), "default");
        assert_eq!(ctx.resolve_key(Some("")).unwrap(), "default");
    }

    #[test]
    fn missing_key_is_auth_error() {
        let http = ScriptedHttp::default();
        let cfg = TransportConfig::new("http://x", AuthMode::ApiKey);
        let ctx = CallContext {
            http: &http,
            transport: &cfg,
            default_api_key: None,
        };
        let req = RandomRequest::integers(1, 0, 1).with_api_key("  ");
        assert_eq!(ctx.api_key(&req).unwrap_err().kind(), ErrorKind::Auth);
    }
}
