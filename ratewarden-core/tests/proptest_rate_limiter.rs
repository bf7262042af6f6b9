//! Property-based tests for rate limit results and key derivation

use proptest::prelude::*;
use ratewarden_core::domain::rate_limit::{KeyScope, ProfileName, RateLimitKey};
use ratewarden_core::infrastructure::rate_limiter::RateLimitResult;

fn arb_result() -> impl Strategy<Value = RateLimitResult> {
    (
        any::<bool>(),
        0u32..1_000,
        0u64..10_000_000,
        0u32..1_000,
        proptest::option::of(0u64..3_600),
    )
        .prop_map(|(allowed, remaining, reset_time, total_hits, retry_after)| {
            RateLimitResult {
                allowed,
                remaining,
                reset_time,
                total_hits,
                retry_after,
            }
        })
}

proptest! {
    #[test]
    fn test_combined_result_never_more_permissive(a in arb_result(), b in arb_result()) {
        let combined = RateLimitResult::most_restrictive(&a, &b);

        prop_assert!(!combined.allowed || (a.allowed && b.allowed));
        prop_assert!(combined.remaining <= a.remaining);
        prop_assert!(combined.remaining <= b.remaining);
        prop_assert!(combined.reset_time >= a.reset_time);
        prop_assert!(combined.reset_time >= b.reset_time);
        prop_assert!(combined.total_hits >= a.total_hits.max(b.total_hits));
        if let Some(wait) = a.retry_after.or(b.retry_after) {
            prop_assert!(combined.retry_after.unwrap_or(0) >= wait);
        }
    }

    #[test]
    fn test_combined_result_is_symmetric(a in arb_result(), b in arb_result()) {
        prop_assert_eq!(
            RateLimitResult::most_restrictive(&a, &b),
            RateLimitResult::most_restrictive(&b, &a)
        );
    }

    #[test]
    fn test_key_round_trips_through_display(identity in "[a-zA-Z0-9:._-]{1,40}") {
        prop_assume!(!identity.trim().is_empty());

        let key = RateLimitKey::for_user(&identity).unwrap();
        let parsed: RateLimitKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed.scope(), KeyScope::User);
        prop_assert_eq!(parsed.identity(), identity.as_str());
    }

    #[test]
    fn test_window_and_block_keys_are_distinct(ip in "[0-9a-f:.]{1,39}", idx in 0usize..6) {
        let profile = ProfileName::ALL[idx];
        let key = RateLimitKey::for_ip(&ip).unwrap();

        let window = key.window_key("rate_limit", profile);
        let block = key.block_key("rate_limit", profile);
        prop_assert_ne!(&window, &block);
        prop_assert!(window.starts_with("rate_limit:requests:"));
        prop_assert!(block.starts_with("rate_limit:block:"));
        let suffix = format!("ip:{}", ip);
        prop_assert!(window.ends_with(&suffix), "{} does not end with {}", window, suffix);
    }
}
