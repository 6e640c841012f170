//! Utilities for testing.

/// Returns some fake data.
///
/// The data is deterministic, so two calls with the same length
/// return identical bytes.
pub fn get_fake_data(len: usize) -> Vec<u8> {
    let mut state = 42u32;
    let mut data = vec![0u8; len];

    for (i, byte) in data.iter_mut().enumerate() {
        (state, _) = state.overflowing_mul(1664525u32);
        (state, _) = state.overflowing_add(1013904223u32);
        *byte = ((state >> (i % 24)) & 0xff) as u8;
    }

    data
}

/// Returns a bearer token and the hash stored for it in the database.
pub fn fake_token(seed: &str) -> (String, String) {
    let token = format!("test-token-{}", seed);
    let hash = crate::hash::Hash::sha256_from_bytes(token.as_bytes()).to_base16();

    (token, hash)
}
