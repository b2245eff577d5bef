//! `SeaORM` Entity for coupons table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use cambio_core::coupon::CouponRules;

use super::sea_orm_active_enums::{CouponStatus, CouponType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub coupon_type: CouponType,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub value: Decimal,
    pub max_redemptions: Option<i32>,
    pub usage_count: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))", nullable)]
    pub min_purchase_amount: Option<Decimal>,
    pub status: CouponStatus,
    pub starts_at: Option<DateTimeWithTimeZone>,
    pub ends_at: Option<DateTimeWithTimeZone>,
    pub is_stackable: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// The fields coupon validation depends on.
    #[must_use]
    pub fn rules(&self) -> CouponRules {
        CouponRules {
            code: self.code.clone(),
            kind: self.coupon_type.into(),
            value: self.value,
            status: self.status.into(),
            max_redemptions: self.max_redemptions,
            usage_count: self.usage_count,
            min_purchase_amount: self.min_purchase_amount,
            starts_at: self.starts_at.map(Into::into),
            ends_at: self.ends_at.map(Into::into),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_redemptions::Entity")]
    CouponRedemptions,
}

impl Related<super::coupon_redemptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponRedemptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
