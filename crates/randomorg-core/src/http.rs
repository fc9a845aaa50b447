//! HTTP port used by every backend, and its `reqwest` implementation.
//!
//! Only network-level failures (connect, timeout, body read) become errors
//! here. Status codes are handed back untouched so each backend can classify
//! them against its own wire format.

use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A 5xx reply, kept as the cause of the resulting transport error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("HTTP {status} from {url}")]
pub struct ServerError {
    pub status: u16,
    pub url: String,
}

/// Blocking HTTP abstraction.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<HttpResponse>;

    fn post_json(&self, url: &str, body: &[u8], timeout: Duration) -> Result<HttpResponse>;
}

/// `reqwest::blocking` backed client.
pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(120))
            .build()
            .map_err(Error::transport)?;
        Ok(Self { client })
    }

    fn finish(
        url: &str,
        sent: reqwest::Result<reqwest::blocking::Response>,
    ) -> Result<HttpResponse> {
        let resp = sent.map_err(|e| {
            warn!("HTTP request to {url} failed: {e}");
            Error::transport(e)
        })?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| {
            warn!("reading body from {url} failed: {e}");
            Error::transport(e)
        })?;
        debug!("HTTP {status} from {url} ({} bytes)", body.len());
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl HttpClient for ReqwestHttp {
    fn get(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<HttpResponse> {
        debug!("HTTP GET {url}");
        let sent = self.client.get(url).query(query).timeout(timeout).send();
        Self::finish(url, sent)
    }

    fn post_json(&self, url: &str, body: &[u8], timeout: Duration) -> Result<HttpResponse> {
        debug!("HTTP POST {url}");
        let sent = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .timeout(timeout)
            .send();
        Self::finish(url, sent)
    }
}

// ---------------------------------------------------------------------------
// Scripted client for unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// One canned outcome.
    pub enum Reply {
        Ok(u16, Vec<u8>),
        Fail(&'static str),
    }

    impl Reply {
        pub fn ok(body: impl Into<Vec<u8>>) -> Self {
            Self::Ok(200, body.into())
        }

        pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
            Self::Ok(status, body.into())
        }
    }

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: &'static str,
        pub url: String,
        pub query: Vec<(String, String)>,
        pub body: Vec<u8>,
        pub timeout: Duration,
    }

    impl Recorded {
        pub fn query_value(&self, name: &str) -> Option<&str> {
            self.query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// Replays canned replies in order and records every request.
    #[derive(Default)]
    pub struct ScriptedHttp {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedHttp {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn next(&self, recorded: Recorded) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(recorded);
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Ok(status, body)) => Ok(HttpResponse::new(status, body)),
                Some(Reply::Fail(msg)) => Err(Error::transport(msg)),
                None => Err(Error::transport("no scripted reply left")),
            }
        }
    }

    impl HttpClient for ScriptedHttp {
        fn get(
            &self,
            url: &str,
            query: &[(&str, String)],
            timeout: Duration,
        ) -> Result<HttpResponse> {
            self.next(Recorded {
                method: "GET",
                url: url.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                body: Vec::new(),
                timeout,
            })
        }

        fn post_json(&self, url: &str, body: &[u8], timeout: Duration) -> Result<HttpResponse> {
            self.next(Recorded {
                method: "POST",
                url: url.to_string(),
                query: Vec::new(),
                body: body.to_vec(),
                timeout,
            })
        }
    }
}
