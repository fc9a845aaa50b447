//! Convenience wrapper: integers and usage statistics.
//!
//! Run: `RANDOM_ORG_API_KEY=... cargo run --example convenience`

use randomorg_core::{BackendKind, Client, ClientConfig, RandomRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ClientConfig::from_env()?;
    if config.api_key.is_none() {
        eprintln!("Set {} to run this example.", randomorg_core::API_KEY_ENV);
        std::process::exit(2);
    }
    let client = Client::new(config)?;

    let result = client.request(
        BackendKind::Convenience,
        &RandomRequest::integers(5, 1, 100),
    )?;
    println!("Integers: {:?}", result.values);

    let usage = client.usage(None)?;
    println!("Usage stats: {}", serde_json::to_string_pretty(&usage)?);
    Ok(())
}
