//! Unified client over the four backends.
//!
//! Every call goes through the same steps:
//!
//! 1. validate the request locally
//! 2. dispatch to the chosen backend
//! 3. retry once, after a fixed delay, if the failure was a transport error
//! 4. verify the signature of signed results and record the outcome
//!
//! A signature that cannot be checked (no key configured, key unreachable)
//! never fails the call. The result comes back with `verified == Some(false)`.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{ClientConfig, Overrides};
use crate::error::{Error, Result};
use crate::http::{HttpClient, ReqwestHttp};
use crate::request::{BackendKind, RandomRequest, RandomResult};
use crate::rpc::UsageReport;
use crate::signature::{self, KeyCache, PublicKey};
use crate::transport::{CallContext, Transport};
use crate::transports::{
    BasicApi, ConvenienceApi, ConvenienceBackend, HttpGetBackend, JsonRpcBackend, OfficialClient,
    VendorBackend, VendorClient,
};

/// Random.org client.
///
/// Cheap to share across threads; all state is immutable apart from the
/// public key cache.
pub struct Client {
    config: ClientConfig,
    http: Arc<dyn HttpClient>,
    http_get: HttpGetBackend,
    json_rpc: JsonRpcBackend,
    vendor: VendorBackend,
    convenience: ConvenienceBackend,
    keys: Arc<KeyCache>,
}

impl Client {
    /// Client over `reqwest` with the built-in vendor and wrapper clients.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttp::new(&config.user_agent)?);
        Self::with_http(config, http)
    }

    /// Client over a caller-supplied HTTP port.
    ///
    /// Fails with a validation error if `config` does not pass
    /// [`ClientConfig::validate`].
    pub fn with_http(config: ClientConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http_get: HttpGetBackend::new(config.get_options),
            json_rpc: JsonRpcBackend,
            vendor: VendorBackend::new(Box::new(OfficialClient::new(Arc::clone(&http)))),
            convenience: ConvenienceBackend::new(Box::new(BasicApi::new(Arc::clone(&http)))),
            keys: signature::global_cache(),
            config,
            http,
        })
    }

    /// Replace the built-in official client.
    pub fn with_vendor(mut self, client: Box<dyn VendorClient>) -> Self {
        self.vendor = VendorBackend::new(client);
        self
    }

    /// Replace the built-in convenience wrapper.
    pub fn with_convenience(mut self, api: Box<dyn ConvenienceApi>) -> Self {
        self.convenience = ConvenienceBackend::new(api);
        self
    }

    /// Use `keys` instead of the process-wide public key cache.
    pub fn with_key_cache(mut self, keys: Arc<KeyCache>) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether `kind` can return signed results.
    pub fn supports_signing(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::HttpGet => self.http_get.supports_signing(),
            BackendKind::JsonRpc => self.json_rpc.supports_signing(),
            BackendKind::Vendor => self.vendor.supports_signing(),
            BackendKind::Convenience => self.convenience.supports_signing(),
        }
    }

    /// Fetch integers from `kind` with the configured defaults.
    pub fn request(&self, kind: BackendKind, request: &RandomRequest) -> Result<RandomResult> {
        self.request_with(kind, request, &Overrides::default())
    }

    /// Fetch integers from `kind`, overriding endpoint or timeout for this
    /// call only.
    pub fn request_with(
        &self,
        kind: BackendKind,
        request: &RandomRequest,
        overrides: &Overrides,
    ) -> Result<RandomResult> {
        request.validate()?;
        if overrides.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Validation("per-call timeout must be non-zero".into()));
        }
        if request.signed && !self.supports_signing(kind) {
            return Err(Error::unsupported(kind, "signed results"));
        }

        let transport = self.config.transport(kind).apply(overrides);
        let ctx = CallContext {
            http: self.http.as_ref(),
            transport: &transport,
            default_api_key: self.config.api_key.as_deref(),
        };
        debug!(
            "{kind}: requesting {} integers in [{}, {}]",
            request.count, request.minimum, request.maximum
        );

        let mut result = match self.dispatch(kind, request, &ctx) {
            Err(e) if e.is_retryable() => {
                let delay = self.config.retry_delay();
                warn!("{kind} request failed ({e}); retrying once in {delay:?}");
                std::thread::sleep(delay);
                self.dispatch(kind, request, &ctx)?
            }
            other => other?,
        };

        if result.signature.is_some() {
            let verified = self.check_signature(&result);
            if !verified {
                warn!("{kind}: signature did not verify");
            }
            result.verified = Some(verified);
        }
        Ok(result)
    }

    fn dispatch(
        &self,
        kind: BackendKind,
        request: &RandomRequest,
        ctx: &CallContext<'_>,
    ) -> Result<RandomResult> {
        match kind {
            BackendKind::HttpGet => self.http_get.fetch(request, ctx),
            BackendKind::JsonRpc => self.json_rpc.fetch(request, ctx),
            BackendKind::Vendor => self.vendor.fetch(request, ctx),
            BackendKind::Convenience => self.convenience.fetch(request, ctx),
        }
    }

    fn check_signature(&self, result: &RandomResult) -> bool {
        match self.public_key() {
            Ok(key) => result.verify_with(&key),
            Err(e) => {
                warn!("cannot verify signature: {e}");
                false
            }
        }
    }

    /// The service's signing key, from inline PEM or the configured URL.
    ///
    /// Fetched at most once per identity for the life of the key cache.
    pub fn public_key(&self) -> Result<Arc<PublicKey>> {
        let sig = &self.config.signature;
        if let Some(pem) = &sig.public_key_pem {
            return self
                .keys
                .get_or_fetch(&signature::inline_identity(pem), || PublicKey::from_pem(pem));
        }
        if let Some(url) = &sig.public_key_url {
            let timeout = self.config.json_rpc.timeout();
            return self.keys.get_or_fetch(url, || {
                info!("loading public key from {url}");
                signature::fetch_public_key(self.http.as_ref(), url, timeout)
            });
        }
        Err(Error::Validation(
            "no public key configured: set signature.public_key_pem or signature.public_key_url"
                .into(),
        ))
    }

    /// Usage statistics for `api_key`, or the default key.
    pub fn usage(&self, api_key: Option<&str>) -> Result<UsageReport> {
        let transport = &self.config.convenience;
        let ctx = CallContext {
            http: self.http.as_ref(),
            transport,
            default_api_key: self.config.api_key.as_deref(),
        };
        self.convenience.usage(api_key, &ctx)
    }
}
