//! Encode/decode commands - convert envelopes between JSON and wire form.

use anyhow::{Context, Result};
use lanchat_core::Envelope;
use std::io::Read;

pub fn encode(json: Option<String>) -> Result<()> {
    let json = match json {
        Some(json) => json,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read envelope from stdin")?;
            buf
        }
    };

    let envelope: Envelope = serde_json::from_str(&json).context("invalid JSON envelope")?;
    println!("{}", envelope.encode());
    Ok(())
}

pub fn decode(wire: &str) -> Result<()> {
    let envelope = Envelope::decode(wire)?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
