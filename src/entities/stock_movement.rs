use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of stock movement. Stored as a string but closed at the type level
/// so an invalid movement kind is unrepresentable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    /// Restock into on-hand quantity
    #[sea_orm(string_value = "IN")]
    In,
    /// Confirmed sale out of on-hand quantity
    #[sea_orm(string_value = "OUT")]
    Out,
    /// Manual correction
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
    /// Units claimed by a reservation
    #[sea_orm(string_value = "RESERVED")]
    Reserved,
    /// Reserved units returned to the available pool
    #[sea_orm(string_value = "RELEASED")]
    Released,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementType::In => write!(f, "IN"),
            MovementType::Out => write!(f, "OUT"),
            MovementType::Adjustment => write!(f, "ADJUSTMENT"),
            MovementType::Reserved => write!(f, "RESERVED"),
            MovementType::Released => write!(f, "RELEASED"),
        }
    }
}

/// One immutable audit-trail entry. Rows are inserted and never updated or
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    /// Idempotency/correlation key, e.g. an order or cart id
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::InventoryItemId",
        to = "super::inventory_item::Column::Id"
    )]
    InventoryItem,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItem.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveEnum;

    #[test]
    fn movement_type_round_trips_through_storage_values() {
        assert_eq!(MovementType::In.to_value(), "IN");
        assert_eq!(MovementType::Released.to_value(), "RELEASED");
        assert_eq!(
            MovementType::try_from_value(&"OUT".to_string()).unwrap(),
            MovementType::Out
        );
        assert!(MovementType::try_from_value(&"BOGUS".to_string()).is_err());
    }

    #[test]
    fn movement_type_json_matches_storage_values() {
        assert_eq!(serde_json::to_string(&MovementType::In).unwrap(), "\"IN\"");
        assert_eq!(
            serde_json::to_string(&MovementType::Released).unwrap(),
            "\"RELEASED\""
        );
    }
}
