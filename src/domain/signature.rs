use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the gateway checkout signature.
///
/// The gateway signs `"{gateway_order_id}|{gateway_payment_id}"` with the key
/// secret and sends the tag hex-encoded. The comparison goes through
/// `Mac::verify_slice`, which is constant-time, rather than a string compare.
pub fn verify_checkout_signature(
    key_secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature_hex: &str,
) -> bool {
    let Some(signature) = decode_hex(signature_hex) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(key_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    mac.verify_slice(&signature).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    fn sign(order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        format!("{:x}", mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(verify_checkout_signature(SECRET, "order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn rejects_when_order_id_is_mutated() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!verify_checkout_signature(SECRET, "order_abd", "pay_xyz", &sig));
    }

    #[test]
    fn rejects_when_payment_id_is_mutated() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!verify_checkout_signature(SECRET, "order_abc", "pay_xyy", &sig));
    }

    #[test]
    fn rejects_when_signature_is_mutated() {
        let mut sig = sign("order_abc", "pay_xyz");
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_checkout_signature(SECRET, "order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn rejects_wrong_secret() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!verify_checkout_signature(
            "other_secret",
            "order_abc",
            "pay_xyz",
            &sig
        ));
    }

    #[test]
    fn rejects_garbage_signatures() {
        assert!(!verify_checkout_signature(SECRET, "o", "p", ""));
        assert!(!verify_checkout_signature(SECRET, "o", "p", "zz"));
        assert!(!verify_checkout_signature(SECRET, "o", "p", "abc"));
    }

    #[test]
    fn decode_hex_handles_valid_and_invalid_input() {
        assert_eq!(decode_hex("00ff"), Some(vec![0x00, 0xff]));
        assert_eq!(decode_hex("0"), None);
        assert_eq!(decode_hex("0g"), None);
        assert_eq!(decode_hex(""), Some(vec![]));
    }
}
