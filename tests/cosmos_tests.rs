//! Cosmos DB scenario against the Cosmos DB emulator.

mod common;

use azure_smoke::clients::cosmos_client;
use azure_smoke::models::Item;
use azure_smoke::services::cosmos;
use common::TestEmulator;

const COSMOS_EMULATOR_URI: &str = "http://localhost:8081/";

#[tokio::test]
#[ignore = "requires the Cosmos DB emulator"]
async fn test_cosmos_scenario() {
    TestEmulator::require(COSMOS_EMULATOR_URI).await;
    let emulator = TestEmulator::new();

    cosmos::cleanup(&emulator.config).await.unwrap();
    cosmos::run(&emulator.config).await.unwrap();

    let client = cosmos_client(&emulator.config).unwrap();
    let collection = client
        .database_client(emulator.config.names.cosmos_database.clone())
        .collection_client(emulator.config.names.cosmos_container.clone());
    let item = Item::sample();
    assert_eq!(
        cosmos::read_item(&collection, &item.id, &item.partition_key)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
#[ignore = "requires the Cosmos DB emulator"]
async fn test_create_is_conflict_tolerant() {
    TestEmulator::require(COSMOS_EMULATOR_URI).await;
    let emulator = TestEmulator::new();
    let client = cosmos_client(&emulator.config).unwrap();
    let names = &emulator.config.names;

    let database = cosmos::create_database(&client, &names.cosmos_database).await.unwrap();
    cosmos::create_database(&client, &names.cosmos_database).await.unwrap();
    let collection = cosmos::create_container(&database, &names.cosmos_container)
        .await
        .unwrap();
    cosmos::create_container(&database, &names.cosmos_container)
        .await
        .unwrap();

    let item = Item::sample();
    cosmos::create_item(&collection, &item).await.unwrap();
    let err = cosmos::create_item(&collection, &item).await.unwrap_err();
    assert!(err.is_conflict());

    // Same id in another partition stays out of the query
    let neighbour = Item {
        partition_key: "2".to_string(),
        ..item.clone()
    };
    cosmos::create_item(&collection, &neighbour).await.unwrap();

    assert_eq!(
        cosmos::query_items(&collection, &item.partition_key).await.unwrap(),
        vec![item.clone()]
    );
    assert_eq!(
        cosmos::query_items(&collection, &neighbour.partition_key)
            .await
            .unwrap(),
        vec![neighbour.clone()]
    );

    for doc in [&item, &neighbour] {
        cosmos::delete_item(&collection, &doc.id, &doc.partition_key)
            .await
            .unwrap();
    }
}
