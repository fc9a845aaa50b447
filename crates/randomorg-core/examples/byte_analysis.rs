//! Fetch random bytes over the GET interface and summarize them.
//!
//! Prints histogram, bit balance and autocorrelation figures as JSON and
//! writes a square "TV static" frame as a PGM image.
//!
//! Run: `cargo run --example byte_analysis`

use std::time::Duration;

use randomorg_core::{BackendKind, Client, ClientConfig, MAX_COUNT, RandomRequest, analysis};

/// 256 x 256 frame.
const N_BYTES: usize = 256 * 256;
const PAUSE_BETWEEN_CALLS: Duration = Duration::from_millis(500);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let client = Client::new(ClientConfig::from_env()?)?;
    let mut data = Vec::with_capacity(N_BYTES);
    while data.len() < N_BYTES {
        let chunk = (N_BYTES - data.len()).min(MAX_COUNT);
        let result = client.request(BackendKind::HttpGet, &RandomRequest::integers(chunk, 0, 255))?;
        let bytes = result.as_bytes().ok_or("service returned a value outside 0..=255")?;
        data.extend_from_slice(&bytes);
        eprintln!("fetched {}/{N_BYTES} bytes", data.len());
        if data.len() < N_BYTES {
            std::thread::sleep(PAUSE_BETWEEN_CALLS);
        }
    }

    let summary = analysis::summarize(&data, 100);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let frame = analysis::static_frame(&data);
    let out = std::env::temp_dir().join("random_static.pgm");
    std::fs::write(&out, frame.to_pgm())?;
    eprintln!("wrote {}x{} frame to {}", frame.side, frame.side, out.display());
    Ok(())
}
