//! Hierarchical topic matching.
//!
//! Topics are dot-separated segments (`item.add`). Patterns use the same
//! segments plus two wildcards:
//!
//! | segment | matches |
//! |---------|---------|
//! | `*`     | exactly one segment |
//! | `**`    | zero or more trailing segments (only meaningful last) |
//!
//! So `item.*` matches `item.add` and `item.remove` but not `item` or
//! `item.add.extra`, while `notification.**` matches every notification topic.

/// Returns true if `topic` matches `pattern`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_segments = pattern.split('.');
    let mut topic_segments = topic.split('.');

    loop {
        match (pattern_segments.next(), topic_segments.next()) {
            (Some("**"), _) => return true,
            (None, None) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_match() {
        assert!(topic_matches("item.add", "item.add"));
        assert!(!topic_matches("item.add", "item.remove"));
    }

    #[test]
    fn single_segment_wildcard() {
        assert!(topic_matches("item.*", "item.add"));
        assert!(topic_matches("item.*", "item.remove"));
        assert!(!topic_matches("item.*", "item"));
        assert!(!topic_matches("item.*", "item.add.extra"));
        assert!(!topic_matches("item.*", "head.checks"));
        assert!(topic_matches("*.sent.ko", "notification.sent.ko"));
    }

    #[test]
    fn trailing_multi_segment_wildcard() {
        assert!(topic_matches("**", "item.add"));
        assert!(topic_matches("notification.**", "notification.sent.ko"));
        assert!(topic_matches("notification.**", "notification"));
        assert!(!topic_matches("notification.**", "status.report.ko"));
    }

    #[test]
    fn prefix_is_not_enough() {
        assert!(!topic_matches("item", "item.add"));
        assert!(!topic_matches("ite*", "item.add"));
    }

    fn arb_topic() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|s| s.join("."))
    }

    proptest! {
        #[test]
        fn every_topic_matches_itself(topic in arb_topic()) {
            prop_assert!(topic_matches(&topic, &topic));
        }

        #[test]
        fn star_per_segment_matches(topic in arb_topic()) {
            let pattern = topic.split('.').map(|_| "*").collect::<Vec<_>>().join(".");
            prop_assert!(topic_matches(&pattern, &topic));
        }

        #[test]
        fn double_star_matches_everything(topic in arb_topic()) {
            prop_assert!(topic_matches("**", &topic));
        }
    }
}
