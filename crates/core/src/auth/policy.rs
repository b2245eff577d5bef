//! Central access policy.
//!
//! Every privileged route asks this table instead of comparing role strings
//! inline, so the set of roles allowed to perform an action is defined once.

use super::UserRole;

/// Privileged actions exposed by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read user accounts.
    ViewUsers,
    /// Enable or disable a user account.
    SetUserStatus,
    /// Change a user's role.
    ChangeUserRole,
    /// Inspect any user's transactions.
    ViewTransactions,
    /// Credit, debit, or overwrite a wallet balance.
    AdjustWallet,
    /// Create, edit, or deactivate coupons.
    ManageCoupons,
    /// Create or edit subscription plans.
    ManagePlans,
    /// Publish exchange rates.
    ManageExchangeRates,
    /// Complete or cancel pending exchanges.
    SettleExchanges,
}

impl Action {
    /// Roles allowed to perform this action.
    #[must_use]
    pub const fn allowed_roles(self) -> &'static [UserRole] {
        use UserRole::{Admin, Manager, Moderator, SuperAdmin, Support};

        match self {
            Self::ViewUsers => &[SuperAdmin, Admin, Moderator, Manager, Support],
            Self::ViewTransactions => &[SuperAdmin, Admin, Manager, Support],
            Self::SetUserStatus => &[SuperAdmin, Admin],
            Self::ChangeUserRole => &[SuperAdmin],
            Self::AdjustWallet
            | Self::ManageCoupons
            | Self::ManagePlans
            | Self::ManageExchangeRates
            | Self::SettleExchanges => &[SuperAdmin, Admin, Manager],
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ViewUsers => "view_users",
            Self::SetUserStatus => "set_user_status",
            Self::ChangeUserRole => "change_user_role",
            Self::ViewTransactions => "view_transactions",
            Self::AdjustWallet => "adjust_wallet",
            Self::ManageCoupons => "manage_coupons",
            Self::ManagePlans => "manage_plans",
            Self::ManageExchangeRates => "manage_exchange_rates",
            Self::SettleExchanges => "settle_exchanges",
        };
        f.write_str(name)
    }
}

/// Stateless policy checks.
pub struct Policy;

impl Policy {
    /// Returns true if `role` may perform `action`.
    #[must_use]
    pub fn allows(role: UserRole, action: Action) -> bool {
        action.allowed_roles().contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::SuperAdmin, Action::ChangeUserRole, true)]
    #[case(UserRole::Admin, Action::ChangeUserRole, false)]
    #[case(UserRole::Manager, Action::AdjustWallet, true)]
    #[case(UserRole::Support, Action::AdjustWallet, false)]
    #[case(UserRole::Support, Action::ViewTransactions, true)]
    #[case(UserRole::Moderator, Action::ViewUsers, true)]
    #[case(UserRole::Moderator, Action::ManageCoupons, false)]
    #[case(UserRole::Manager, Action::SettleExchanges, true)]
    #[case(UserRole::User, Action::ViewUsers, false)]
    fn test_policy_table(#[case] role: UserRole, #[case] action: Action, #[case] allowed: bool) {
        assert_eq!(Policy::allows(role, action), allowed);
    }

    #[test]
    fn test_regular_users_have_no_admin_actions() {
        let actions = [
            Action::ViewUsers,
            Action::SetUserStatus,
            Action::ChangeUserRole,
            Action::ViewTransactions,
            Action::AdjustWallet,
            Action::ManageCoupons,
            Action::ManagePlans,
            Action::ManageExchangeRates,
            Action::SettleExchanges,
        ];
        for action in actions {
            assert!(!Policy::allows(UserRole::User, action), "{action}");
        }
    }
}
