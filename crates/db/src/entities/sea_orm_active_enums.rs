//! Stored enum types and their conversions to the core domain enums.
//!
//! Enums are stored as `TEXT` guarded by `CHECK` constraints.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use cambio_core::auth::UserRole as CoreUserRole;
use cambio_core::coupon::{CouponStatus as CoreCouponStatus, CouponType as CoreCouponType};
use cambio_core::subscription::{
    PlanStatus as CorePlanStatus, ReferralStatus as CoreReferralStatus,
    UserPlanStatus as CoreUserPlanStatus,
};
use cambio_core::transaction::{
    TransactionStatus as CoreTransactionStatus, TransactionType as CoreTransactionType,
};

/// Maps a stored enum onto its core counterpart and back, variant by variant.
macro_rules! mirror_enum {
    ($db:ident <=> $core:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$db> for $core {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$core> for $db {
            fn from(value: $core) -> Self {
                match value {
                    $($core::$variant => Self::$variant,)+
                }
            }
        }
    };
}

/// Platform role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Super administrator.
    #[sea_orm(string_value = "super_admin")]
    SuperAdmin,
    /// Administrator.
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Moderator.
    #[sea_orm(string_value = "moderator")]
    Moderator,
    /// Manager.
    #[sea_orm(string_value = "manager")]
    Manager,
    /// Support agent.
    #[sea_orm(string_value = "support")]
    Support,
    /// Customer.
    #[sea_orm(string_value = "user")]
    User,
}

mirror_enum!(UserRole <=> CoreUserRole { SuperAdmin, Admin, Moderator, Manager, Support, User });

/// Transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Deposit.
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Withdrawal.
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Exchange.
    #[sea_orm(string_value = "exchange")]
    Exchange,
    /// Transfer.
    #[sea_orm(string_value = "transfer")]
    Transfer,
    /// Referral commission.
    #[sea_orm(string_value = "referral")]
    Referral,
    /// Plan purchase.
    #[sea_orm(string_value = "subscription")]
    Subscription,
}

mirror_enum!(TransactionType <=> CoreTransactionType {
    Deposit, Withdrawal, Exchange, Transfer, Referral, Subscription
});

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Pending.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Completed.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Failed.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Cancelled.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

mirror_enum!(TransactionStatus <=> CoreTransactionStatus { Pending, Completed, Failed, Cancelled });

/// Plan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Draft.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Active.
    #[sea_orm(string_value = "active")]
    Active,
    /// Inactive.
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

mirror_enum!(PlanStatus <=> CorePlanStatus { Draft, Active, Inactive });

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UserPlanStatus {
    /// Active.
    #[sea_orm(string_value = "active")]
    Active,
    /// Cancelled.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Expired.
    #[sea_orm(string_value = "expired")]
    Expired,
    /// Awaiting payment.
    #[sea_orm(string_value = "pending")]
    Pending,
}

mirror_enum!(UserPlanStatus <=> CoreUserPlanStatus { Active, Cancelled, Expired, Pending });

/// Coupon type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// Percentage off.
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Fixed amount off.
    #[sea_orm(string_value = "fixed")]
    Fixed,
    /// Whole purchase waived.
    #[sea_orm(string_value = "free_trial")]
    FreeTrial,
}

mirror_enum!(CouponType <=> CoreCouponType { Percentage, Fixed, FreeTrial });

/// Coupon status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    /// Active.
    #[sea_orm(string_value = "active")]
    Active,
    /// Inactive.
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

mirror_enum!(CouponStatus <=> CoreCouponStatus { Active, Inactive });

/// Coupon redemption status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// Counted against the coupon.
    #[sea_orm(string_value = "applied")]
    Applied,
    /// Given back after a failed payment.
    #[sea_orm(string_value = "reversed")]
    Reversed,
}

/// Referral status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    /// Waiting for the referred user's first payment.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Commission paid.
    #[sea_orm(string_value = "rewarded")]
    Rewarded,
    /// Voided.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

mirror_enum!(ReferralStatus <=> CoreReferralStatus { Pending, Rewarded, Cancelled });

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_status_mirrors_core() {
        for status in TransactionStatus::iter() {
            let core: CoreTransactionStatus = status.into();
            assert_eq!(TransactionStatus::from(core), status);
            assert_eq!(status.to_value(), core.as_str());
        }
    }

    #[test]
    fn test_role_mirrors_core() {
        for role in UserRole::iter() {
            let core: CoreUserRole = role.into();
            assert_eq!(role.to_value(), core.as_str());
        }
    }
}
