use sha2::{Digest, Sha256};

/// Bytes iniciales que participan en la huella.
pub const FINGERPRINT_PREFIX: usize = 1024 * 1024;

/// SHA-256 en hexadecimal de los primeros `FINGERPRINT_PREFIX` bytes.
/// Dos archivos con el mismo primer MiB comparten huella.
pub fn fingerprint(bytes: &[u8]) -> String {
    let prefix = &bytes[..bytes.len().min(FINGERPRINT_PREFIX)];
    format!("{:x}", Sha256::digest(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn only_the_prefix_is_hashed() {
        let mut first = vec![7u8; FINGERPRINT_PREFIX];
        let mut second = first.clone();
        first.extend_from_slice(b"cola uno");
        second.extend_from_slice(b"otra cola distinta");
        assert_eq!(fingerprint(&first), fingerprint(&second));

        second[10] = 8;
        assert_ne!(fingerprint(&first), fingerprint(&second));
        assert_eq!(fingerprint(&first).len(), 64);
    }
}
