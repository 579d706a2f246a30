//! Session identifier generation.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

/// Number of input bytes encoded into an identifier.
const SEED_LEN: usize = 24;

/// Generate a fresh session identifier.
///
/// The identifier mixes the current wall-clock nanoseconds with 16 random
/// bytes; the first 24 bytes of that text are URL-safe base64 encoded,
/// yielding exactly 32 characters. Generation never fails.
pub fn generate() -> String {
    use rand::Rng;

    let mut rng = rand::rng();

    let mut noise = [0u8; 16];
    rng.fill(&mut noise);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let mut seed = nanos.to_string().into_bytes();
    seed.extend_from_slice(&noise);
    if seed.len() < SEED_LEN {
        let mut pad = [0u8; SEED_LEN];
        rng.fill(&mut pad);
        seed.extend_from_slice(&pad);
    }
    seed.truncate(SEED_LEN);

    URL_SAFE.encode(&seed)
}
