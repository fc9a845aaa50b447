//! Integration tests for randomorg-core.
//!
//! These tests run the real `reqwest` client against the local stub service:
//! request → backend → wire → stub → decode → verify.

use std::sync::Arc;
use std::time::{Duration, Instant};

use randomorg_core::{
    BackendKind, Client, ClientConfig, ErrorKind, KeyCache, Overrides, RandomRequest,
};
use randomorg_stub::{Fault, StubConfig, StubServer, keys};

fn start(config: StubConfig) -> StubServer {
    StubServer::start(config).unwrap()
}

fn client_config(stub: &StubServer) -> ClientConfig {
    let mut config = ClientConfig::default().with_service_root(&stub.base_url());
    config.api_key = Some("integration-key".into());
    config.retry_delay_ms = 10;
    config.signature.public_key_url = Some(stub.key_url());
    config
}

fn client(stub: &StubServer) -> Client {
    Client::new(client_config(stub))
        .unwrap()
        .with_key_cache(Arc::new(KeyCache::new()))
}

#[test]
fn every_backend_returns_requested_count_in_range() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    for kind in [
        BackendKind::HttpGet,
        BackendKind::JsonRpc,
        BackendKind::Vendor,
        BackendKind::Convenience,
    ] {
        let result = client
            .request(kind, &RandomRequest::integers(50, -20, 20))
            .unwrap();
        assert_eq!(result.values.len(), 50, "{kind}");
        assert!(result.values.iter().all(|v| (-20..=20).contains(v)), "{kind}");
        assert_eq!(result.backend, kind);
        assert!(result.signature.is_none());
        assert_eq!(result.verified, None);
    }
}

#[test]
fn get_stub_values_come_back_verbatim() {
    let stub = start(StubConfig::default().with_values(vec![23, 77, 5, 91, 46]));
    let client = client(&stub);
    let result = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(5, 1, 100))
        .unwrap();
    assert_eq!(result.values, vec![23, 77, 5, 91, 46]);
    assert!(result.signature.is_none());
    assert_eq!(stub.hits().get, 1);
    assert!(stub.api_keys_seen().is_empty());
}

#[test]
fn get_in_base_sixteen() {
    let stub = start(StubConfig::default().with_values(vec![255, 16, 0]));
    let mut config = client_config(&stub);
    config.get_options.base = 16;
    config.get_options.columns = 3;
    let client = Client::new(config).unwrap();
    let result = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(3, 0, 255))
        .unwrap();
    assert_eq!(result.values, vec![255, 16, 0]);
}

#[test]
fn signed_json_rpc_result_verifies() {
    let stub = start(StubConfig::default().with_values(vec![3, 7, 2]));
    let client = client(&stub);
    let result = client
        .request(
            BackendKind::JsonRpc,
            &RandomRequest::integers(3, 0, 10).signed(true),
        )
        .unwrap();
    assert_eq!(result.values, vec![3, 7, 2]);
    assert!(result.signature.is_some());
    assert_eq!(result.verified, Some(true));
    assert!(result.is_trustworthy());
}

#[test]
fn signed_vendor_result_verifies() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    let result = client
        .request(
            BackendKind::Vendor,
            &RandomRequest::integers(8, 1, 6).signed(true),
        )
        .unwrap();
    assert_eq!(result.verified, Some(true));
    let usage = result.usage.unwrap();
    assert_eq!(usage.requests_left, Some(999));
}

#[test]
fn tampered_signed_result_is_flagged() {
    let stub = start(
        StubConfig::default()
            .with_values(vec![3, 7, 2])
            .with_fault(Fault::TamperSigned),
    );
    let client = client(&stub);
    let result = client
        .request(
            BackendKind::JsonRpc,
            &RandomRequest::integers(3, 0, 10).signed(true),
        )
        .unwrap();
    assert_eq!(result.values, vec![4, 7, 2]);
    assert_eq!(result.verified, Some(false));
}

#[test]
fn editing_a_verified_value_breaks_verification() {
    let stub = start(StubConfig::default().with_values(vec![3, 7, 2]));
    let client = client(&stub);
    let mut result = client
        .request(
            BackendKind::JsonRpc,
            &RandomRequest::integers(3, 0, 10).signed(true),
        )
        .unwrap();
    let key = client.public_key().unwrap();
    assert!(result.verify_with(&key));
    assert!(result.verify_with(&key));

    result.values[1] = 8;
    assert!(!result.verify_with(&key));
}

#[test]
fn foreign_key_does_not_verify() {
    let stub = start(StubConfig::default());
    let mut config = client_config(&stub);
    config.signature.public_key_url = None;
    config.signature.public_key_pem = Some(keys::FOREIGN_PUBLIC_PEM.to_string());
    let client = Client::new(config)
        .unwrap()
        .with_key_cache(Arc::new(KeyCache::new()));
    let result = client
        .request(
            BackendKind::JsonRpc,
            &RandomRequest::integers(2, 0, 10).signed(true),
        )
        .unwrap();
    assert_eq!(result.verified, Some(false));
    assert_eq!(stub.hits().key, 0);
}

#[test]
fn public_key_is_fetched_once() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    for _ in 0..3 {
        let result = client
            .request(
                BackendKind::JsonRpc,
                &RandomRequest::integers(1, 0, 10).signed(true),
            )
            .unwrap();
        assert_eq!(result.verified, Some(true));
    }
    assert_eq!(stub.hits().key, 1);
}

#[test]
fn concurrent_signed_requests_share_one_key_fetch() {
    let stub = start(StubConfig::default().with_delay(Duration::from_millis(20)));
    let client = client(&stub);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let result = client
                    .request(
                        BackendKind::JsonRpc,
                        &RandomRequest::integers(4, 0, 100).signed(true),
                    )
                    .unwrap();
                assert_eq!(result.verified, Some(true));
            });
        }
    });

    assert_eq!(stub.hits().key, 1);
    assert_eq!(stub.hits().rpc, 8);
}

#[test]
fn short_response_is_format_error() {
    let stub = start(StubConfig::default().with_fault(Fault::Truncate(1)));
    let client = client(&stub);
    for kind in [BackendKind::HttpGet, BackendKind::JsonRpc] {
        let err = client
            .request(kind, &RandomRequest::integers(5, 1, 100))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{kind}");
    }
}

#[test]
fn out_of_range_values_are_format_error() {
    let stub = start(StubConfig::default().with_values(vec![1, 200]));
    let client = client(&stub);
    let err = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(2, 1, 100))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn rpc_error_envelope_is_protocol_error() {
    let stub = start(StubConfig::default().with_fault(Fault::RpcError {
        code: 300,
        message: "Parameter 'min' must be less than or equal to 'max'".into(),
    }));
    let client = client(&stub);
    let err = client
        .request(BackendKind::JsonRpc, &RandomRequest::integers(1, 0, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("300"));
    assert_eq!(stub.hits().rpc, 1);
}

#[test]
fn unknown_key_is_auth_error_on_every_keyed_backend() {
    let stub = start(StubConfig::default().accepting_keys(&["the-real-key"]));
    let client = client(&stub);
    for kind in [
        BackendKind::JsonRpc,
        BackendKind::Vendor,
        BackendKind::Convenience,
    ] {
        let err = client
            .request(kind, &RandomRequest::integers(1, 0, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth, "{kind}");
    }
    let ok = client
        .request(
            BackendKind::JsonRpc,
            &RandomRequest::integers(1, 0, 1).with_api_key("the-real-key"),
        )
        .unwrap();
    assert_eq!(ok.values.len(), 1);
}

#[test]
fn exhausted_quota_is_protocol_error() {
    let stub = start(StubConfig::default().with_quota(0, 1000));
    let client = client(&stub);
    let err = client
        .request(BackendKind::Vendor, &RandomRequest::integers(1, 0, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn missing_key_is_auth_error_without_io() {
    let stub = start(StubConfig::default());
    let mut config = client_config(&stub);
    config.api_key = None;
    let client = Client::new(config).unwrap();
    let err = client
        .request(BackendKind::JsonRpc, &RandomRequest::integers(1, 0, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(stub.hits().rpc, 0);
}

#[test]
fn get_error_text_is_protocol_error_and_not_retried() {
    let stub = start(StubConfig::default().with_fault(Fault::ErrorText(
        "You have used your daily quota of bits".into(),
    )));
    let client = client(&stub);
    let err = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(1, 0, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("daily quota"));
    assert_eq!(stub.hits().get, 1);
}

#[test]
fn garbage_bodies_are_format_errors() {
    let stub = start(StubConfig::default().with_fault(Fault::Garbage));
    let client = client(&stub);
    for kind in BackendKind::ALL {
        let err = client
            .request(kind, &RandomRequest::integers(1, 0, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{kind}");
    }
}

#[test]
fn mismatched_id_is_format_error() {
    let stub = start(StubConfig::default().with_fault(Fault::WrongId));
    let client = client(&stub);
    let err = client
        .request(BackendKind::JsonRpc, &RandomRequest::integers(1, 0, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn one_transient_failure_is_retried() {
    let stub = start(StubConfig::default().failing_first(1));
    let client = client(&stub);
    let result = client
        .request(BackendKind::JsonRpc, &RandomRequest::integers(3, 1, 6))
        .unwrap();
    assert_eq!(result.values.len(), 3);
    assert_eq!(stub.hits().rpc, 2);
}

#[test]
fn two_transient_failures_surface_as_transport_error() {
    let stub = start(StubConfig::default().failing_first(2));
    let client = client(&stub);
    let err = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(3, 1, 6))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(stub.hits().get, 2);
}

#[test]
fn timeout_is_transport_error() {
    let stub = start(StubConfig::default().with_delay(Duration::from_millis(500)));
    let client = client(&stub);
    let overrides = Overrides {
        base_url: None,
        timeout: Some(Duration::from_millis(50)),
    };
    let started = Instant::now();
    let err = client
        .request_with(
            BackendKind::HttpGet,
            &RandomRequest::integers(1, 0, 1),
            &overrides,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(stub.hits().get, 2);
}

#[test]
fn unreachable_service_is_transport_error() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    let overrides = Overrides {
        base_url: Some("http://127.0.0.1:9/json-rpc/4/invoke".into()),
        timeout: Some(Duration::from_millis(500)),
    };
    let err = client
        .request_with(
            BackendKind::JsonRpc,
            &RandomRequest::integers(1, 0, 1),
            &overrides,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn signed_on_unsigned_backends_never_touches_the_network() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    for kind in [BackendKind::HttpGet, BackendKind::Convenience] {
        let err = client
            .request(kind, &RandomRequest::integers(1, 0, 1).signed(true))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }
    assert_eq!(stub.hits().get + stub.hits().rpc, 0);
}

#[test]
fn unique_draws_without_replacement() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    let request = RandomRequest::integers(10, 1, 10).without_replacement();
    for kind in [BackendKind::JsonRpc, BackendKind::Vendor, BackendKind::Convenience] {
        let result = client.request(kind, &request).unwrap();
        let mut sorted = result.values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=10).collect::<Vec<_>>(), "{kind}");
    }

    let err = client.request(BackendKind::HttpGet, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    assert_eq!(stub.hits().get, 0);
}

#[test]
fn usage_reports_consumption() {
    let stub = start(StubConfig::default());
    let client = client(&stub);
    client
        .request(BackendKind::Convenience, &RandomRequest::integers(2, 0, 1))
        .unwrap();
    let usage = client.usage(None).unwrap();
    assert_eq!(usage.status, "running");
    assert_eq!(usage.requests_left, Some(999));
    assert_eq!(usage.total_requests, Some(1));
}

#[test]
fn config_file_points_client_at_stub() {
    let stub = start(StubConfig::default().with_values(vec![9]));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("randomorg.json");
    let json = serde_json::json!({
        "http_get": { "base_url": stub.get_url(), "timeout_ms": 2000 },
        "retry_delay_ms": 5,
    });
    std::fs::write(&path, json.to_string()).unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.http_get.timeout_ms, 2000);
    let client = Client::new(config).unwrap();
    let result = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(1, 0, 10))
        .unwrap();
    assert_eq!(result.values, vec![9]);
}

#[test]
#[ignore] // Run with: cargo test -- --ignored (hits random.org)
fn live_http_get_smoke() {
    let client = Client::new(ClientConfig::default()).unwrap();
    let result = client
        .request(BackendKind::HttpGet, &RandomRequest::integers(5, 1, 6))
        .unwrap();
    assert_eq!(result.values.len(), 5);
    assert!(result.values.iter().all(|v| (1..=6).contains(v)));
}
