use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::InventoryItem,
    services::{Resource, require},
    table::Searchable,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForm {
    pub name: String,
    pub quantity: i32,
    pub min_quantity: i32,
    pub unit_price_cents: i64,
}

impl ItemForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        require("name", &self.name)?;
        if self.quantity < 0 || self.min_quantity < 0 {
            return Err(ClientError::validation("quantities cannot be negative"));
        }
        Ok(())
    }
}

impl From<&InventoryItem> for ItemForm {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity,
            min_quantity: item.min_quantity,
            unit_price_cents: item.unit_price_cents,
        }
    }
}

impl Searchable for InventoryItem {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

impl InventoryItem {
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_quantity
    }

    pub fn stock_value_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }
}

/// Items at or below their minimum quantity.
pub fn low_stock(items: &[InventoryItem]) -> Vec<&InventoryItem> {
    items.iter().filter(|i| i.is_low()).collect()
}

#[derive(Clone)]
pub struct InventoryService {
    resource: Resource<InventoryItem>,
}

impl InventoryService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "items"),
        }
    }

    pub async fn list(&self) -> Result<Vec<InventoryItem>, ClientError> {
        self.resource.list().await
    }

    pub async fn create(&self, form: &ItemForm) -> Result<InventoryItem, ClientError> {
        form.validate()?;
        self.resource.create(form).await
    }

    pub async fn update(&self, id: Uuid, form: &ItemForm) -> Result<InventoryItem, ClientError> {
        form.validate()?;
        self.resource.update(id, form).await
    }

    /// Add (or with a negative delta, remove) stock.
    pub async fn adjust(&self, item: &InventoryItem, delta: i32) -> Result<InventoryItem, ClientError> {
        let mut form = ItemForm::from(item);
        form.quantity = item
            .quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| ClientError::validation("not enough stock"))?;
        self.update(item.id, &form).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: i32, min: i32) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: "gloves".into(),
            quantity: qty,
            min_quantity: min,
            unit_price_cents: 25,
        }
    }

    #[test]
    fn low_stock_includes_threshold() {
        let items = [item(5, 10), item(10, 10), item(11, 10)];
        assert_eq!(low_stock(&items).len(), 2);
        assert_eq!(items[0].stock_value_cents(), 125);
    }
}
