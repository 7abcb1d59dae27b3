use sqlgold::config::{Config, DatabaseConfig};
use sqlgold::factory::{CreateOptions, DbFactory};
use sqlgold::manager::DbManager;
use sqlgold::orm::{Base, Column, Table};
use sqlgold::testing::{TestDbOptions, count, create_test_db};
use std::sync::Arc;
use tempfile::TempDir;

fn base() -> Arc<Base> {
    let base = Base::new("Base");
    base.add_table(
        Table::new("tclass")
            .column(Column::new("id", "INTEGER").primary_key())
            .column(Column::new("label", "TEXT")),
    )
    .unwrap();
    Arc::new(base)
}

#[tokio::test]
async fn test_create_test_db_from_section() {
    let dir = TempDir::new().unwrap();
    let factory = DbFactory::new(
        DbManager::new(),
        Config::from_toml_str(
            r#"
            default = "sqlite3"

            [sqlite3.test]
            driver = "sqlite"
            "#,
        )
        .unwrap(),
    );
    let path = dir.path().join("section.db");

    let options = TestDbOptions::new()
        .with_database(path.to_str().unwrap())
        .with_create(CreateOptions::new().with_base(base()));
    let test_db = create_test_db(&factory, options).await.unwrap();

    assert!(path.exists());
    assert_eq!(count(&test_db, "tclass").await.unwrap(), 0);
    assert!(factory.manager().has_database(test_db.alias()));

    let alias = test_db.alias().to_string();
    test_db.finish().await.unwrap();
    assert!(!path.exists());
    assert!(!factory.manager().has_database(&alias));
}

#[tokio::test]
async fn test_create_test_db_keep() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kept.db");
    let factory = DbFactory::new(DbManager::new(), Config::default());

    let options = TestDbOptions::new()
        .with_config(DatabaseConfig {
            driver: Some("sqlite".to_string()),
            database: Some(path.to_str().unwrap().to_string()),
            ..DatabaseConfig::default()
        })
        .with_create(CreateOptions::new().with_base(base()))
        .with_drop(false);
    let test_db = create_test_db(&factory, options).await.unwrap();

    let mut session = test_db.session().await.unwrap();
    session
        .execute("INSERT INTO tclass (id, label) VALUES (1, 'one')")
        .await
        .unwrap();
    session.commit().await.unwrap();
    assert_eq!(count(&test_db, "tclass").await.unwrap(), 1);

    test_db.close().await;
    test_db.finish().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_create_test_db_from_url() {
    let factory = DbFactory::new(DbManager::new(), Config::default());
    let options = TestDbOptions::new()
        .with_url("sqlite:///:memory:")
        .with_create(CreateOptions::new().with_base(base()));
    let test_db = create_test_db(&factory, options).await.unwrap();
    assert_eq!(test_db.alias(), "sqlite:///:memory:");
    assert_eq!(count(&test_db, "tclass").await.unwrap(), 0);
    test_db.finish().await.unwrap();
}

#[tokio::test]
async fn test_default_must_name_a_driver() {
    let factory = DbFactory::new(
        DbManager::new(),
        Config::from_toml_str("[default]\nurl = \"sqlite://\"").unwrap(),
    );
    let result = create_test_db(&factory, TestDbOptions::new()).await;
    assert!(matches!(result, Err(sqlgold::DbError::Config { .. })));
}
