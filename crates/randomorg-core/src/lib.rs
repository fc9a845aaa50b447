//! # randomorg-core
//!
//! **True random integers from Random.org, four ways, behind one client.**
//!
//! Backends:
//! - **HttpGet**: the anonymous plain-text `/integers/` interface. Unsigned.
//! - **JsonRpc**: JSON-RPC release 4 with an API key. Optionally signed.
//! - **Vendor**: the official client library's surface ([`VendorClient`]).
//!   Optionally signed.
//! - **Convenience**: a thin wrapper ([`ConvenienceApi`]) for plain integers
//!   and usage statistics. Unsigned.
//!
//! ## Quick Start
//!
//! ```no_run
//! use randomorg_core::{BackendKind, Client, ClientConfig, RandomRequest};
//!
//! let client = Client::new(ClientConfig::from_env()?)?;
//! let result = client.request(BackendKind::HttpGet, &RandomRequest::integers(5, 1, 100))?;
//! assert_eq!(result.values.len(), 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Request → validate → backend (one retry on transport failure) → verify
//! signature → [`RandomResult`]
//!
//! Signed results carry the exact bytes the service signed. The client checks
//! them with RSASSA-PKCS1-v1_5 / SHA-512 against the configured public key and
//! records the outcome in [`RandomResult::verified`]. A bad signature never
//! fails the call; check [`RandomResult::is_trustworthy`] before relying on
//! the values.
//!
//! Every failure is one of the [`ErrorKind`]s. The underlying cause of
//! transport failures is reachable through `std::error::Error::source`.

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod rpc;
pub mod signature;
pub mod transport;
pub mod transports;

pub use analysis::{ByteSummary, StaticFrame, static_frame, summarize};
pub use client::Client;
pub use config::{
    API_KEY_ENV, AuthMode, CONFIG_PATH_ENV, ClientConfig, ConfigError, GetOptions, Overrides,
    SignatureConfig, TransportConfig, default_api_key,
};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpClient, HttpResponse, ReqwestHttp};
pub use request::{
    BackendKind, MAX_BOUND, MAX_COUNT, RandomRequest, RandomResult, SignedPayload, Usage,
};
pub use rpc::UsageReport;
pub use signature::{KeyCache, PublicKey, verify};
pub use transport::{CallContext, Transport, TransportInfo};
pub use transports::{
    BasicApi, ConvenienceApi, ConvenienceCall, ConvenienceError, OfficialClient, VendorCall,
    VendorClient, VendorFault, VendorIntegers, VendorSigned,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
