use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{product_design_files, products};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Product {
    pub id: Uuid,
    pub product_name: String,
    pub category: String,
    pub design_type: String,
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProduct {
    pub id: Uuid,
    pub product_name: String,
    pub category: String,
    pub design_type: String,
    pub price: BigDecimal,
}

/// One design-file slot of a product: the file for a single machine format,
/// with its own price. UNIQUE (product_id, machine_type) keeps the six slots
/// distinct.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = product_design_files)]
#[diesel(belongs_to(Product, foreign_key = product_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductDesignFile {
    pub id: Uuid,
    pub product_id: Uuid,
    pub machine_type: String,
    pub file_ref: String,
    pub file_name: String,
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_design_files)]
pub struct NewProductDesignFile {
    pub id: Uuid,
    pub product_id: Uuid,
    pub machine_type: String,
    pub file_ref: String,
    pub file_name: String,
    pub price: BigDecimal,
}
