//! Official-client backend, signed and unsigned.
//!
//! Run: `RANDOM_ORG_API_KEY=... cargo run --example official_client`

use randomorg_core::{BackendKind, Client, ClientConfig, RandomRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ClientConfig::from_env()?;
    if config.api_key.is_none() {
        eprintln!("Set {} to run this example.", randomorg_core::API_KEY_ENV);
        std::process::exit(2);
    }
    let client = Client::new(config)?;

    let plain = client.request(BackendKind::Vendor, &RandomRequest::integers(5, 0, 10))?;
    println!("Random: {:?}", plain.values);

    let signed = client.request(
        BackendKind::Vendor,
        &RandomRequest::integers(5, 0, 10).signed(true),
    )?;
    println!(
        "Random: {:?} Signature: {} bytes, verified: {:?}",
        signed.values,
        signed.signature.as_ref().map_or(0, |p| p.signature.len()),
        signed.verified
    );
    Ok(())
}
