use proptest::prelude::*;

use lattice_types::{Account, Amount, BlockBuilder, BlockHash, Timestamp, Vote};

proptest! {
    /// BlockHash text form parses back to the same hash.
    #[test]
    fn block_hash_text_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = BlockHash::new(bytes);
        let parsed: BlockHash = hash.to_string().parse().unwrap();
        prop_assert_eq!(parsed, hash);
    }

    /// Account text form parses back to the same account.
    #[test]
    fn account_text_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let account = Account::new(bytes);
        let parsed: Account = account.to_string().parse().unwrap();
        prop_assert_eq!(parsed, account);
    }

    /// BlockHash::is_zero is true only for all-zero bytes.
    #[test]
    fn block_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        prop_assert_eq!(BlockHash::new(bytes).is_zero(), bytes == [0u8; 32]);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// elapsed_since(now) = now - self, saturating at zero.
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        prop_assert_eq!(t.elapsed_since(Timestamp::new(base + offset)), offset);
        prop_assert_eq!(Timestamp::new(base + offset + 1).elapsed_since(t), 0);
    }

    /// has_expired agrees with manual arithmetic.
    #[test]
    fn timestamp_has_expired_correct(
        start in 0u64..500_000,
        duration in 1u64..500_000,
        offset in 0u64..1_000_000,
    ) {
        let t = Timestamp::new(start);
        let now = Timestamp::new(start.saturating_add(offset));
        prop_assert_eq!(t.has_expired(duration, now), offset >= duration);
    }

    /// checked_add(a, b) == Some(a + b) when no overflow.
    #[test]
    fn amount_checked_add(a in 0u128..u128::MAX / 2, b in 0u128..u128::MAX / 2) {
        prop_assert_eq!(
            Amount::raw(a).checked_add(Amount::raw(b)),
            Some(Amount::raw(a + b))
        );
    }

    /// saturating_sub never panics and returns ZERO on underflow.
    #[test]
    fn amount_saturating_sub(a in 0u128..1_000_000, b in 0u128..1_000_000) {
        let result = Amount::raw(a).saturating_sub(Amount::raw(b));
        if b > a {
            prop_assert_eq!(result, Amount::ZERO);
        } else {
            prop_assert_eq!(result, Amount::raw(a - b));
        }
    }

    /// scale(p, 100) never exceeds the original and matches exact
    /// arithmetic where that cannot overflow.
    #[test]
    fn amount_scale_bounded(raw in 0u128..u128::MAX, pct in 0u128..=100) {
        let scaled = Amount::raw(raw).scale(pct, 100);
        prop_assert!(scaled <= Amount::raw(raw));
        if raw < u128::MAX / 100 {
            prop_assert_eq!(scaled, Amount::raw(raw * pct / 100));
        }
    }

    /// Forks share a qualified root but never a hash.
    #[test]
    fn forks_share_root_not_hash(
        previous in prop::array::uniform32(1u8..),
        link_a in prop::array::uniform32(0u8..),
        link_b in prop::array::uniform32(0u8..),
    ) {
        prop_assume!(link_a != link_b);
        let account = Account::new([3; 32]);
        let a = BlockBuilder::new(account).previous(BlockHash::new(previous)).link(link_a).build();
        let b = BlockBuilder::new(account).previous(BlockHash::new(previous)).link(link_b).build();
        prop_assert_eq!(a.qualified_root(), b.qualified_root());
        prop_assert_ne!(a.hash(), b.hash());
    }

    /// The vote signing hash commits to the timestamp.
    #[test]
    fn vote_signing_hash_covers_timestamp(t1 in 0u64..u64::MAX, t2 in 0u64..u64::MAX) {
        prop_assume!(t1 != t2);
        let rep = Account::new([1; 32]);
        let hashes = vec![BlockHash::new([2; 32])];
        let v1 = Vote::new(rep, t1, 0, hashes.clone());
        let v2 = Vote::new(rep, t2, 0, hashes);
        prop_assert_ne!(v1.signing_hash(), v2.signing_hash());
    }
}
