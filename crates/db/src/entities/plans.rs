//! `SeaORM` Entity for plans table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use cambio_core::subscription::PlanTerms;

use super::sea_orm_active_enums::PlanStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub price: Decimal,
    pub currency: String,
    /// Ordered list of feature strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub features: Json,
    pub status: PlanStatus,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub referral_commission_rate: Decimal,
    pub duration_days: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// The commercial terms used for charging and referral rewards.
    #[must_use]
    pub fn terms(&self) -> PlanTerms {
        PlanTerms {
            price: self.price,
            duration_days: self.duration_days,
            referral_commission_rate: self.referral_commission_rate,
            status: self.status.into(),
        }
    }

    /// Feature list as strings, skipping anything malformed.
    #[must_use]
    pub fn feature_list(&self) -> Vec<String> {
        self.features
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_plans::Entity")]
    UserPlans,
}

impl Related<super::user_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserPlans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
