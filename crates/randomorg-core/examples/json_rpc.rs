//! JSON-RPC release 4, signed.
//!
//! Needs `RANDOM_ORG_API_KEY`. Set `signature.public_key_url` (or
//! `public_key_pem`) in the file named by `RANDOM_ORG_CONFIG` to have the
//! signature checked.
//!
//! Run: `RANDOM_ORG_API_KEY=... cargo run --example json_rpc`

use randomorg_core::{BackendKind, Client, ClientConfig, RandomRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ClientConfig::from_env()?;
    if config.api_key.is_none() {
        eprintln!("Set {} to run this example.", randomorg_core::API_KEY_ENV);
        std::process::exit(2);
    }

    let client = Client::new(config)?;
    let request = RandomRequest::integers(5, 0, 10).signed(true);
    let result = client.request(BackendKind::JsonRpc, &request)?;

    println!("Random:   {:?}", result.values);
    if let Some(payload) = &result.signature {
        print!("Signature: ");
        for b in payload.signature.iter().take(16) {
            print!("{b:02x}");
        }
        println!("... ({} bytes)", payload.signature.len());
    }
    match result.verified {
        Some(true) => println!("Verified: yes"),
        Some(false) => println!("Verified: NO (do not rely on these values)"),
        None => println!("Verified: n/a"),
    }
    if let Some(usage) = result.usage {
        println!(
            "Quota:    {} requests, {} bits left",
            usage.requests_left.unwrap_or_default(),
            usage.bits_left.unwrap_or_default()
        );
    }
    Ok(())
}
