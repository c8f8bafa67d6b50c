//! Table Storage scenario.

use azure_data_tables::prelude::*;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};
use crate::models::{EdmEntity, MyEntity, RAW_ENTITY_ROW_KEY};

/// Creates the table, treating `TableAlreadyExists` as success.
pub async fn create_table_if_not_exists(
    service: &TableServiceClient,
    name: &str,
) -> Result<TableClient> {
    let table = service.table_client(name);

    match table.create().await {
        Ok(_) => info!(table = name, "created table"),
        Err(e) => {
            let err = Error::from(e);
            if !err.has_code(ErrorCode::TableAlreadyExists) {
                return Err(err);
            }
            debug!(table = name, "table already exists");
        }
    }

    Ok(table)
}

/// Inserts any serializable entity.
pub async fn add_entity<E>(table: &TableClient, entity: &E) -> Result<()>
where
    E: Serialize,
{
    table.insert::<_, serde_json::Value>(entity)?.await?;
    Ok(())
}

/// OData filter matching one row key. Single quotes are doubled.
pub fn row_key_filter(row_key: &str) -> String {
    format!("RowKey eq '{}'", row_key.replace('\'', "''"))
}

/// Returns every entity whose row key equals `row_key`, across partitions.
pub async fn query_by_row_key(table: &TableClient, row_key: &str) -> Result<Vec<MyEntity>> {
    let mut stream = table
        .query()
        .filter(row_key_filter(row_key))
        .into_stream::<MyEntity>();
    let mut found = Vec::new();

    while let Some(page) = stream.next().await {
        for entity in page?.entities {
            info!(
                partition_key = %entity.partition_key,
                row_key = %entity.row_key,
                stock = entity.stock,
                "found entity"
            );
            found.push(entity);
        }
    }

    Ok(found)
}

/// Deletes one entity.
pub async fn delete_entity(table: &TableClient, partition_key: &str, row_key: &str) -> Result<()> {
    table
        .partition_key_client(partition_key)
        .entity_client(row_key)
        .delete()
        .await?;
    debug!(partition_key, row_key, "deleted entity");
    Ok(())
}

/// Deletes the table.
pub async fn delete_table(table: &TableClient) -> Result<()> {
    table.delete().await?;
    info!("deleted table");
    Ok(())
}

/// Creates the table, adds a raw and a typed entity, queries by row key, and
/// deletes what it wrote.
pub async fn run(config: &Config) -> Result<()> {
    let service = crate::clients::table_service_client(config)?;
    let table = create_table_if_not_exists(&service, &config.names.table).await?;

    let raw = EdmEntity::sample(Uuid::new_v4().to_string());
    add_entity(&table, &raw).await?;

    let typed = MyEntity::sample(Uuid::new_v4().to_string());
    add_entity(&table, &typed).await?;
    info!(raw = %raw.partition_key, typed = %typed.partition_key, "added entities");

    let found = query_by_row_key(&table, RAW_ENTITY_ROW_KEY).await?;
    if !found.iter().any(|e| e.partition_key == raw.partition_key) {
        return Err(Error::Mismatch(format!(
            "entity {}/{} missing from query results",
            raw.partition_key, raw.row_key
        )));
    }

    for entity in &found {
        delete_entity(&table, &entity.partition_key, &entity.row_key).await?;
    }
    delete_entity(&table, &typed.partition_key, &typed.row_key).await?;

    Ok(())
}
