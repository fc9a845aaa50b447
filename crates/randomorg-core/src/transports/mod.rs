//! The four backends.

use crate::request::BackendKind;
use crate::transport::TransportInfo;

pub mod convenience;
pub mod http_get;
pub mod json_rpc;
pub mod vendor;

pub use convenience::{
    BasicApi, ConvenienceApi, ConvenienceBackend, ConvenienceCall, ConvenienceError,
};
pub use http_get::HttpGetBackend;
pub use json_rpc::JsonRpcBackend;
pub use vendor::{
    OfficialClient, VendorBackend, VendorCall, VendorClient, VendorFault, VendorIntegers,
    VendorSigned,
};

/// Static description of the backend behind `kind`.
pub fn info(kind: BackendKind) -> &'static TransportInfo {
    match kind {
        BackendKind::HttpGet => &http_get::HTTP_GET_INFO,
        BackendKind::JsonRpc => &json_rpc::JSON_RPC_INFO,
        BackendKind::Vendor => &vendor::VENDOR_INFO,
        BackendKind::Convenience => &convenience::CONVENIENCE_INFO,
    }
}
