use crate::alert::entity::{alert_definition, alert_trigger};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema, Statement};
use std::env;
use tracing::info;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    info!("Successfully connected to the database.");

    // Check if schema update is enabled
    let should_update_schema = env::var("DB_SCHEMA_UPDATE")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid DB_SCHEMA_UPDATE value, defaulting to false. Use 'true' or 'false'."
            );
            false
        });

    if should_update_schema {
        create_tables(&db).await?;
    } else {
        info!("Skipping database schema synchronization (DB_SCHEMA_UPDATE is not true).");
    }

    Ok(db)
}

async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Starting database schema synchronization...");

    // Parent first, then child
    create_table_if_not_exists(db, &schema, alert_definition::Entity).await?;
    create_table_if_not_exists(db, &schema, alert_trigger::Entity).await?;

    // (정의, 이벤트) 당 트리거 1회 보장
    create_unique_index_if_not_exists(
        db,
        "uq_alert_trigger_definition_event",
        "alert_trigger",
        &["alert_definition_id", "event_id"],
    )
    .await?;

    info!("Database schema synchronization completed.");
    Ok(())
}

async fn create_unique_index_if_not_exists(
    db: &DatabaseConnection,
    index_name: &str,
    table_name: &str,
    columns: &[&str],
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let sql = format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        index_name,
        table_name,
        columns.join(", ")
    );
    let stmt = Statement::from_string(backend, sql);
    match db.execute(stmt).await {
        Ok(_) => Ok(()),
        Err(e) => {
            // Ignore duplicate index errors for idempotency.
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("duplicate") || err_str.contains("exists") {
                Ok(())
            } else {
                tracing::error!("Failed to create unique index {}: {}", index_name, e);
                Err(e)
            }
        }
    }
}

async fn create_table_if_not_exists<E>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr>
where
    E: sea_orm::EntityTrait,
{
    let backend = db.get_database_backend();
    let create_stmt: Statement =
        backend.build(schema.create_table_from_entity(entity).if_not_exists());

    db.execute(create_stmt).await.map(|_| ()).map_err(|e| {
        tracing::error!("Failed to create table {}: {}", entity.table_name(), e);
        e
    })
}
