use chrono::Utc;
use rand::Rng;

/// Maximum number of candidate references tried before giving up with
/// [`crate::domain::errors::DomainError::OrderRefExhausted`].
pub const MAX_ORDER_REF_ATTEMPTS: usize = 10;

/// Produce one candidate order reference: `ORD-<epoch millis><4 random digits>`.
///
/// Uniqueness is only probabilistic here; the caller checks the candidate
/// against the `orders` table and retries on collision.
pub fn candidate_order_ref() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{millis}{suffix:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_has_expected_shape() {
        let r = candidate_order_ref();
        assert!(r.starts_with("ORD-"));
        let digits = &r[4..];
        assert!(digits.len() >= 16, "epoch millis plus 4-digit suffix: {r}");
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert!(r.len() <= 32, "must fit the order_ref column: {r}");
    }

    #[test]
    fn candidates_differ_in_practice() {
        let a: Vec<String> = (0..50).map(|_| candidate_order_ref()).collect();
        let unique: std::collections::HashSet<&String> = a.iter().collect();
        // 50 draws of a 4-digit suffix within the same millisecond could
        // collide, but all 50 colliding is effectively impossible.
        assert!(unique.len() > 1);
    }
}
