//! Cosmos DB scenario.

use azure_data_cosmos::prelude::*;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::Item;

/// Manually provisioned throughput, in request units per second.
pub const THROUGHPUT: u64 = 400;

/// Partition key path of the scenario container.
pub const PARTITION_KEY_PATH: &str = "/pk";

/// Query the scenario runs against the container.
pub const SELECT_ALL: &str = "SELECT * FROM c";

/// Creates the database. A 409 Conflict means it already exists.
///
/// The database carries no offer of its own: the database builder has no
/// throughput setter, so the 400 RU/s offer is set by [`create_container`].
pub async fn create_database(client: &CosmosClient, name: &str) -> Result<DatabaseClient> {
    match client.create_database(name).await {
        Ok(_) => info!(database = name, "created database"),
        Err(e) => {
            let err = Error::from(e);
            if !err.is_conflict() {
                return Err(err);
            }
            debug!(database = name, "database already exists");
        }
    }

    Ok(client.database_client(name.to_string()))
}

/// Creates the container partitioned on `/pk` with manual throughput. A 409
/// Conflict means it already exists.
pub async fn create_container(database: &DatabaseClient, name: &str) -> Result<CollectionClient> {
    let created = database
        .create_collection(name, PARTITION_KEY_PATH)
        .offer(Offer::Throughput(THROUGHPUT))
        .await;

    match created {
        Ok(_) => info!(container = name, throughput = THROUGHPUT, "created container"),
        Err(e) => {
            let err = Error::from(e);
            if !err.is_conflict() {
                return Err(err);
            }
            debug!(container = name, "container already exists");
        }
    }

    Ok(database.collection_client(name.to_string()))
}

/// Creates an item in its partition.
pub async fn create_item(collection: &CollectionClient, item: &Item) -> Result<()> {
    collection.create_document(item.clone()).await?;
    info!(id = %item.id, pk = %item.partition_key, "created item");
    Ok(())
}

/// Reads an item by id and partition key. Returns `None` if it is missing.
pub async fn read_item(
    collection: &CollectionClient,
    id: &str,
    partition_key: &str,
) -> Result<Option<Item>> {
    let document = collection.document_client(id, &partition_key)?;

    match document.get_document::<Item>().await? {
        GetDocumentResponse::Found(found) => {
            let item = found.document.document;
            info!(item = ?item, "read item");
            Ok(Some(item))
        }
        GetDocumentResponse::NotFound(_) => Ok(None),
    }
}

/// Returns every item in `partition_key`. The query runs inside that
/// partition only.
pub async fn query_items(collection: &CollectionClient, partition_key: &str) -> Result<Vec<Item>> {
    let mut stream = collection
        .query_documents(Query::new(SELECT_ALL.to_string()))
        .partition_key(&partition_key)?
        .into_stream::<Item>();
    let mut items = Vec::new();

    while let Some(page) = stream.next().await {
        for (item, _) in page?.results {
            info!(item = ?item, "queried item");
            items.push(item);
        }
    }

    Ok(items)
}

/// Deletes an item.
pub async fn delete_item(collection: &CollectionClient, id: &str, partition_key: &str) -> Result<()> {
    collection
        .document_client(id, &partition_key)?
        .delete_document()
        .await?;
    info!(id, pk = partition_key, "deleted item");
    Ok(())
}

/// Creates the database and container, then writes, reads back, queries, and
/// deletes the sample item.
pub async fn run(config: &Config) -> Result<()> {
    let client = crate::clients::cosmos_client(config)?;
    let database = create_database(&client, &config.names.cosmos_database).await?;
    let collection = create_container(&database, &config.names.cosmos_container).await?;

    let item = Item::sample();
    create_item(&collection, &item).await?;

    match read_item(&collection, &item.id, &item.partition_key).await? {
        Some(read) if read == item => {}
        Some(read) => {
            return Err(Error::Mismatch(format!(
                "item read back as {:?}, expected {:?}",
                read, item
            )))
        }
        None => return Err(Error::Mismatch(format!("item '{}' not found", item.id))),
    }

    for found in query_items(&collection, &item.partition_key).await? {
        delete_item(&collection, &found.id, &found.partition_key).await?;
    }

    Ok(())
}

/// Removes the sample item left behind by an interrupted run. Failures are
/// logged, not returned.
pub async fn cleanup(config: &Config) -> Result<()> {
    let client = crate::clients::cosmos_client(config)?;
    let collection = client
        .database_client(config.names.cosmos_database.clone())
        .collection_client(config.names.cosmos_container.clone());

    let item = Item::sample();
    if let Err(e) = delete_item(&collection, &item.id, &item.partition_key).await {
        warn!(error = %e, "cleanup delete failed");
    }

    Ok(())
}
