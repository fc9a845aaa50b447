//! Plain-text GET interface: no API key, no signature.
//!
//! Run: `cargo run --example http_get`

use randomorg_core::{BackendKind, Client, ClientConfig, RandomRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let client = Client::new(ClientConfig::from_env()?)?;
    let result = client.request(BackendKind::HttpGet, &RandomRequest::integers(5, 1, 100))?;

    println!("Random integers: {:?}", result.values);
    Ok(())
}
