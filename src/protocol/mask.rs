//! Payload masking (RFC 6455 Section 5.3).

use crate::error::{Error, Result};

/// XOR `data` in place with the 4-byte masking key.
///
/// Masking is its own inverse, so the same call unmasks.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Draw a fresh masking key from the OS entropy source.
///
/// Every outbound frame gets its own key; keys are never cached.
pub fn generate_mask() -> Result<[u8; 4]> {
    let mut mask = [0u8; 4];
    getrandom::getrandom(&mut mask)
        .map_err(|e| Error::Io(format!("entropy source unavailable: {e}")))?;
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mut data: Vec<u8> = vec![];
        apply_mask(&mut data, [0xff; 4]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_wraps_key() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut data = vec![0x00; 6];
        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x11, 0x22, 0x33, 0x44, 0x11, 0x22]);
    }

    #[test]
    fn test_generate_mask_varies() {
        let keys: Vec<[u8; 4]> = (0..16).map(|_| generate_mask().unwrap()).collect();
        // 16 draws from 2^32 all colliding would mean a broken entropy source.
        assert!(keys.windows(2).any(|w| w[0] != w[1]));
    }
}
