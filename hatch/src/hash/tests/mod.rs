use super::*;

use crate::error::HatchError;

const BLOB: &[u8] = b"hello world";

#[test]
fn test_basic() {
    let hash = Hash::sha256_from_bytes(BLOB);

    let expected_base16 = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    assert_eq!(expected_base16, hash.to_base16());
}

#[test]
fn test_same_bytes_same_hash() {
    let a = Hash::sha256_from_bytes(BLOB);
    let b = Hash::sha256_from_bytes(&BLOB.to_vec());
    let c = Hash::sha256_from_bytes(b"hello world!");

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_from_base16() {
    let base16 = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    assert_eq!(
        Hash::sha256_from_bytes(BLOB),
        Hash::from_base16(base16).unwrap()
    );

    assert!(matches!(
        Hash::from_base16(""),
        Err(HatchError::HashError(Error::InvalidHashStringLength { .. }))
    ));

    assert!(matches!(
        Hash::from_base16("gggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggg"),
        Err(HatchError::HashError(Error::InvalidBase16Hash(_)))
    ));
}

#[test]
fn test_serde() {
    let hash = Hash::sha256_from_bytes(BLOB);
    let json = serde_json::to_string(&hash).unwrap();

    assert_eq!(
        "\"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9\"",
        json
    );

    let back: Hash = serde_json::from_str(&json).unwrap();
    assert_eq!(hash, back);
}
