use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Schema,
    Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{account_record, department, finance, role, team_account, user};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    let mut opt = ConnectOptions::new(&database_url);
    if config.is_sqlite() {
        info!("Opening SQLite database: {}", config.path);
        // A single connection keeps an in-memory database alive and serializes writers
        opt.max_connections(1).min_connections(1);
    } else {
        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8))
            .set_schema_search_path("public");
    }
    opt.sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    // Auto-migrate tables
    auto_migrate(&db).await?;

    Ok(db)
}

/// Auto-migrate database tables
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Tables reference each other by id only, so order is informational
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(department::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(team_account::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(finance::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(account_record::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_migrate_sqlite_memory() {
        let db = init_database(&DatabaseConfig::sqlite_memory()).await.unwrap();
        let departments = department::Entity::find().all(&db).await.unwrap();
        assert!(departments.is_empty());
        // Second run is a no-op
        auto_migrate(&db).await.unwrap();
    }
}
