//! Property-based tests for wallet arithmetic.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::wallet::operation::{WalletOperation, apply_delta};

/// Amounts between 0.01 and 100,000.00 in minor units.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000).prop_map(|minor| Decimal::new(minor, 2))
}

fn arb_operation() -> impl Strategy<Value = WalletOperation> {
    prop_oneof![
        arb_amount().prop_map(WalletOperation::Deposit),
        arb_amount().prop_map(WalletOperation::Withdrawal),
        arb_amount().prop_map(WalletOperation::TransferIn),
        (arb_amount(), arb_amount())
            .prop_map(|(amount, fee)| WalletOperation::TransferOut { amount, fee }),
        arb_amount().prop_map(WalletOperation::ReferralCredit),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Applying any sequence never yields a negative balance, and the final
    /// balance equals the initial balance plus every accepted delta.
    #[test]
    fn prop_balance_never_negative(
        initial in arb_amount(),
        ops in prop::collection::vec(arb_operation(), 1..50),
    ) {
        let mut balance = initial;
        let mut applied = Decimal::ZERO;

        for op in ops {
            let delta = op.delta().unwrap();
            if let Ok(next) = apply_delta(balance, delta) {
                balance = next;
                applied += delta;
            }
            prop_assert!(balance >= Decimal::ZERO);
        }

        prop_assert_eq!(balance, initial + applied);
    }

    /// A rejected debit leaves the balance untouched.
    #[test]
    fn prop_rejected_debit_reports_balance(balance in arb_amount(), extra in arb_amount()) {
        let delta = -(balance + extra);
        let err = apply_delta(balance, delta).unwrap_err();
        let reports_balance = matches!(
            err,
            crate::wallet::WalletError::InsufficientFunds { balance: b, .. } if b == balance
        );
        prop_assert!(reports_balance);
    }

    /// Credits always succeed.
    #[test]
    fn prop_credits_always_apply(balance in arb_amount(), amount in arb_amount()) {
        let delta = WalletOperation::Deposit(amount).delta().unwrap();
        prop_assert_eq!(apply_delta(balance, delta).unwrap(), balance + amount);
    }
}
