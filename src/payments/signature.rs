//! HMAC-SHA256 signatures used by the gateway for checkout callbacks and webhooks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature over `payload`.
pub fn verify(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// The checkout callback signs `"<gateway order id>|<gateway payment id>"`.
pub fn checkout_payload(gateway_order_id: &str, payment_id: &str) -> String {
    format!("{gateway_order_id}|{payment_id}")
}

pub fn verify_checkout(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> bool {
    verify(
        secret,
        checkout_payload(gateway_order_id, payment_id).as_bytes(),
        signature_hex,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn checkout_signature_round_trips() {
        let signature = sign("key_secret", checkout_payload("order_1", "pay_1").as_bytes());
        assert!(verify_checkout("key_secret", "order_1", "pay_1", &signature));
    }

    #[test]
    fn tampered_fields_fail() {
        let signature = sign("key_secret", checkout_payload("order_1", "pay_1").as_bytes());
        assert!(!verify_checkout("key_secret", "order_2", "pay_1", &signature));
        assert!(!verify_checkout("key_secret", "order_1", "pay_2", &signature));
        assert!(!verify_checkout("other_secret", "order_1", "pay_1", &signature));
    }

    #[test]
    fn malformed_signature_fails() {
        assert!(!verify("key_secret", b"payload", "not-hex"));
        assert!(!verify("key_secret", b"payload", ""));
    }

    #[test]
    fn empty_secret_never_verifies() {
        let signature = sign("", b"payload");
        assert!(!verify("", b"payload", &signature));
    }
}
