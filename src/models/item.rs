//! Cosmos DB item model.

use azure_data_cosmos::prelude::CosmosEntity;
use serde::{Deserialize, Serialize};

/// A product document stored in Cosmos DB, partitioned by `pk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "pk")]
    pub partition_key: String,
    pub category: String,
    pub name: String,
    pub quantity: i32,
    pub price: f32,
    pub clearance: bool,
}

impl Item {
    /// The item the Cosmos scenario writes, reads back, and deletes.
    pub fn sample() -> Self {
        Self {
            id: "1".to_string(),
            partition_key: "1".to_string(),
            category: "category1".to_string(),
            name: "name1".to_string(),
            quantity: 10,
            price: 100.0,
            clearance: true,
        }
    }
}

impl CosmosEntity for Item {
    type Entity = String;

    fn partition_key(&self) -> Self::Entity {
        self.partition_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_wire_names() {
        let value = serde_json::to_value(Item::sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1",
                "pk": "1",
                "category": "category1",
                "name": "name1",
                "quantity": 10,
                "price": 100.0,
                "clearance": true,
            })
        );
    }

    #[test]
    fn test_item_ignores_system_properties() {
        let doc = json!({
            "id": "1",
            "pk": "1",
            "category": "category1",
            "name": "name1",
            "quantity": 10,
            "price": 100.0,
            "clearance": true,
            "_rid": "abc",
            "_etag": "\"00000000-0000\"",
            "_ts": 1700000000,
        });
        let item: Item = serde_json::from_value(doc).unwrap();
        assert_eq!(item, Item::sample());
        assert_eq!(CosmosEntity::partition_key(&item), "1");
    }
}
