//! Balance reconciliation against the transaction log.

use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::WalletId;

use super::types::TransactionType;

/// Persisted balance compared with the sum of completed transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Wallet checked.
    pub wallet_id: WalletId,
    /// Balance column value.
    pub persisted: Decimal,
    /// Credits minus debits over completed transactions.
    pub computed: Decimal,
    /// `persisted - computed`.
    pub drift: Decimal,
    /// True when drift is zero.
    pub is_consistent: bool,
    /// Completed transactions summed.
    pub transaction_count: u64,
}

impl Reconciliation {
    /// Sums `(type, amount)` pairs of completed transactions and compares with `persisted`.
    #[must_use]
    pub fn compute<I>(wallet_id: WalletId, persisted: Decimal, entries: I) -> Self
    where
        I: IntoIterator<Item = (TransactionType, Decimal)>,
    {
        let (computed, transaction_count) = entries
            .into_iter()
            .fold((Decimal::ZERO, 0_u64), |(sum, count), (kind, amount)| {
                (sum + kind.signed(amount), count + 1)
            });
        let drift = persisted - computed;
        Self {
            wallet_id,
            persisted,
            computed,
            drift,
            is_consistent: drift.is_zero(),
            transaction_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_consistent_log() {
        let r = Reconciliation::compute(
            WalletId::new(),
            dec!(70),
            [
                (TransactionType::Credit, dec!(100)),
                (TransactionType::Debit, dec!(30)),
            ],
        );
        assert!(r.is_consistent);
        assert_eq!(r.computed, dec!(70));
        assert_eq!(r.transaction_count, 2);
    }

    #[test]
    fn test_drift_detected() {
        let r = Reconciliation::compute(WalletId::new(), dec!(75), [(TransactionType::Credit, dec!(70))]);
        assert!(!r.is_consistent);
        assert_eq!(r.drift, dec!(5));
    }

    #[test]
    fn test_empty_log() {
        let r = Reconciliation::compute(WalletId::new(), Decimal::ZERO, []);
        assert!(r.is_consistent);
        assert_eq!(r.transaction_count, 0);
    }
}
