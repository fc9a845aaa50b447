//! Plain-text GET interface (`/integers/`).
//!
//! Anonymous, unsigned. The service answers with one integer per cell,
//! cells separated by tabs and rows by newlines. Errors come back as a body
//! starting with `Error:`, usually with a 503 status.

use log::debug;

use crate::config::{AuthMode, GetOptions};
use crate::error::{Error, Result};
use crate::http::ServerError;
use crate::request::{BackendKind, RandomRequest, RandomResult};
use crate::transport::{CallContext, Transport, TransportInfo};

pub(crate) static HTTP_GET_INFO: TransportInfo = TransportInfo {
    kind: BackendKind::HttpGet,
    description: "Anonymous plain-text GET interface",
    auth: AuthMode::Anonymous,
    signing: false,
};

const ERROR_PREFIX: &str = "Error:";

/// Backend over the plain-text GET endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpGetBackend {
    options: GetOptions,
}

impl HttpGetBackend {
    pub fn new(options: GetOptions) -> Self {
        Self { options }
    }

    fn query(&self, request: &RandomRequest) -> Vec<(&'static str, String)> {
        vec![
            ("num", request.count.to_string()),
            ("min", request.minimum.to_string()),
            ("max", request.maximum.to_string()),
            ("col", self.options.columns.to_string()),
            ("base", self.options.base.to_string()),
            ("format", "plain".to_string()),
            ("rnd", "new".to_string()),
        ]
    }
}

impl Transport for HttpGetBackend {
    fn info(&self) -> &TransportInfo {
        &HTTP_GET_INFO
    }

    fn fetch(&self, request: &RandomRequest, ctx: &CallContext<'_>) -> Result<RandomResult> {
        self.ensure_signing(request)?;
        // The plain interface always draws with replacement.
        if !request.replacement {
            return Err(Error::unsupported(BackendKind::HttpGet, "draws without replacement"));
        }

        let url = ctx.transport.base_url.as_str();
        let resp = ctx
            .http
            .get(url, &self.query(request), ctx.transport.timeout())?;
        let body = resp.text();
        let body = body.trim();

        if let Some(message) = body.strip_prefix(ERROR_PREFIX) {
            return Err(Error::Protocol {
                code: i64::from(resp.status),
                message: message.trim().to_string(),
            });
        }
        if resp.is_server_error() {
            return Err(Error::transport(ServerError {
                status: resp.status,
                url: url.to_string(),
            }));
        }
        if !resp.is_success() {
            return Err(Error::Protocol {
                code: i64::from(resp.status),
                message: format!("unexpected HTTP {} from {url}", resp.status),
            });
        }

        let values = parse_plain(body, self.options.base)?;
        request.check_values(&values)?;
        debug!("http_get: {} values", values.len());
        Ok(RandomResult::unsigned(BackendKind::HttpGet, values))
    }
}

/// Parse a plain-text body of integers in `base`.
///
/// Tokens may be separated by any whitespace or commas. Any token that is
/// not an integer fails the whole body.
pub fn parse_plain(body: &str, base: u32) -> Result<Vec<i64>> {
    if !(2..=36).contains(&base) {
        return Err(Error::Validation(format!("unsupported number base {base}")));
    }
    body.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            i64::from_str_radix(t, base)
                .map_err(|_| Error::format(format!("non-numeric token {t:?} in GET response")))
        })
        .collect()
}
