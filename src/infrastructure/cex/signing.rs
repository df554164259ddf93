//! HMAC-SHA256 request signing for the exchange v5 API

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign `timestamp + api_key + recv_window + payload`, where payload is
/// the query string for GET requests and the JSON body for POST requests
pub fn sign(
    api_secret: &str,
    api_key: &str,
    timestamp: i64,
    recv_window: u64,
    payload: &str,
) -> String {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}{}{}{}", timestamp, api_key, recv_window, payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_hex() {
        let a = sign("secret", "key", 1700000000000, 5000, "coin=SOL");
        let b = sign("secret", "key", 1700000000000, 5000, "coin=SOL");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn payload_changes_the_signature() {
        let a = sign("secret", "key", 1700000000000, 5000, "coin=SOL");
        let b = sign("secret", "key", 1700000000000, 5000, "coin=ETH");
        assert_ne!(a, b);
    }
}
