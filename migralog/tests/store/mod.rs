use migralog::{Engine, EventType, Migration, Provenance, Store, StoreError};
use serde_json::json;

pub const LEGACY_TITLES: [&str; 3] = ["1-first", "2-second", "3-third"];

pub fn legacy_state() -> String {
    json!({
        "lastRun": "3-third",
        "migrations": LEGACY_TITLES
            .iter()
            .map(|title| json!({ "title": title, "timestamp": 1500000000000u64 }))
            .collect::<Vec<_>>(),
    })
    .to_string()
}

pub fn create_store<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
    context: &str,
) -> anyhow::Result<Store> {
    Ok(Store::builder()
        .engine(engine.clone())
        .table_name(table)
        .context(context)
        .legacy_table(None::<String>)
        .provenance(Provenance::new("ci-host", "ci-user"))
        .build()?)
}

pub async fn test_first_run<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    assert!(!engine.table_exists(table).await?);

    let store = create_store(engine, table, "foo")?;

    assert_eq!(store.executed().await?, Vec::<String>::new());
    assert!(engine.table_exists(table).await?);
    assert!(store.history().await?.is_empty());

    Ok(())
}

pub async fn test_log_migration<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "foo")?;
    store.executed().await?;

    let err = store
        .log_migration(json!({ "foo": "1-first" }))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.history().await?.is_empty());

    store.log_migration("1-first").await?;
    store.log_migration(json!({ "name": "1-first" })).await?;
    store
        .log_migration(Migration {
            name: "2-second".to_owned(),
        })
        .await?;

    let migrations = store.executed().await?;

    assert_eq!(migrations, vec!["1-first", "2-second"]);

    store.log_migration("b").await?;
    store.log_migration("a").await?;

    let migrations = store.executed().await?;

    assert_eq!(migrations[migrations.len() - 2], "b");
    assert_eq!(migrations[migrations.len() - 1], "a");

    let history = store.history().await?;

    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|event| event.context == "foo"
        && event.host.as_deref() == Some("ci-host")
        && event.user.as_deref() == Some("ci-user")));

    Ok(())
}

pub async fn test_unlog_migration<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "foo")?;
    let total = store.executed().await?.len();

    store.log_migration(json!({ "name": "unlogTest" })).await?;

    assert_eq!(
        store.executed().await?.last().map(String::as_str),
        Some("unlogTest")
    );

    store.unlog_migration(json!({ "name": "unlogTest" })).await?;

    assert!(!store.executed().await?.contains(&"unlogTest".to_owned()));

    store.log_migration("unlog-first").await?;
    store.log_migration("unlog-second").await?;
    store.unlog_migration("unlog-second").await?;

    let migrations = store.executed().await?;

    assert_eq!(migrations.len(), total + 1);
    assert_eq!(migrations.last().map(String::as_str), Some("unlog-first"));

    let err = store.unlog_migration(json!({ "name": 42 })).await.unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));

    Ok(())
}

pub async fn test_history<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "history-test")?;

    store.log_migration(json!({ "name": "first" })).await?;
    store.log_migration(json!({ "name": "second" })).await?;
    store.log_migration(json!({ "name": "third" })).await?;
    store.unlog_migration(json!({ "name": "third" })).await?;
    store.log_migration(json!({ "name": "fourth" })).await?;

    let history = store.history().await?;

    assert_eq!(
        history
            .iter()
            .map(|event| (event.name.as_str(), event.kind))
            .collect::<Vec<_>>(),
        vec![
            ("first", EventType::Up),
            ("second", EventType::Up),
            ("third", EventType::Up),
            ("third", EventType::Down),
            ("fourth", EventType::Up),
        ]
    );
    assert!(history.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(history.iter().all(|event| event.id.is_some()));

    assert_eq!(store.executed().await?, vec!["first", "second", "fourth"]);

    Ok(())
}

pub async fn test_idempotent_up<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "idempotent")?;

    store.log_migration("a").await?;
    store.log_migration("b").await?;

    let once = store.executed().await?;

    store.log_migration("a").await?;
    store.log_migration("a").await?;

    assert_eq!(store.executed().await?, once);
    assert_eq!(store.history().await?.len(), 4);

    Ok(())
}

pub async fn test_unlog_unknown<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "unknown")?;

    store.log_migration("a").await?;
    store.unlog_migration("never-applied").await?;

    assert_eq!(store.executed().await?, vec!["a"]);

    let history = store.history().await?;
    let last = history.last().expect("down event");

    assert_eq!(history.len(), 2);
    assert_eq!(last.name, "never-applied");
    assert_eq!(last.kind, EventType::Down);

    Ok(())
}

pub async fn test_ordering<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "ordering")?;

    store.log_migration("a").await?;
    store.log_migration("b").await?;
    store.unlog_migration("a").await?;

    assert_eq!(store.executed().await?, vec!["b"]);

    store.log_migration("a").await?;

    assert_eq!(store.executed().await?, vec!["b", "a"]);

    Ok(())
}

pub async fn test_context_isolation<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let a = create_store(engine, table, "tenant-a")?;
    let b = create_store(engine, table, "tenant-b")?;

    a.log_migration("1-shared").await?;
    a.log_migration("2-only-a").await?;
    b.log_migration("1-shared").await?;
    b.unlog_migration("2-only-a").await?;

    assert_eq!(a.executed().await?, vec!["1-shared", "2-only-a"]);
    assert_eq!(b.executed().await?, vec!["1-shared"]);

    assert_eq!(a.history().await?.len(), 2);
    assert!(a
        .history()
        .await?
        .iter()
        .all(|event| event.context == "tenant-a"));
    assert_eq!(b.history().await?.len(), 2);

    let c = create_store(engine, table, "tenant-c")?;

    assert!(c.executed().await?.is_empty());

    Ok(())
}

pub async fn test_write_bootstraps<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = create_store(engine, table, "write-first")?;

    store.log_migration("1-first").await?;

    assert!(engine.table_exists(table).await?);
    assert_eq!(store.executed().await?, vec!["1-first"]);

    Ok(())
}

/// Expects `legacy_table` to hold [`legacy_state`] under the `system` key.
pub async fn test_legacy_import<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
    legacy_table: &str,
) -> anyhow::Result<()> {
    let store = Store::builder()
        .engine(engine.clone())
        .table_name(table)
        .context("legacy")
        .legacy_table(Some(legacy_table))
        .build()?;

    assert_eq!(store.executed().await?, LEGACY_TITLES);

    let history = store.history().await?;

    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|event| event.kind == EventType::Up));

    store.log_migration("4-fourth").await?;
    store.unlog_migration("2-second").await?;

    assert_eq!(
        store.executed().await?,
        vec!["1-first", "3-third", "4-fourth"]
    );

    // imported once, at creation
    let again = Store::builder()
        .engine(engine.clone())
        .table_name(table)
        .context("legacy")
        .legacy_table(Some(legacy_table))
        .build()?;

    assert_eq!(again.history().await?.len(), 5);

    Ok(())
}

/// Expects `legacy_table` to hold invalid JSON under the `system` key.
pub async fn test_legacy_malformed<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
    legacy_table: &str,
) -> anyhow::Result<()> {
    let store = Store::builder()
        .engine(engine.clone())
        .table_name(table)
        .legacy_table(Some(legacy_table))
        .build()?;

    let err = store.executed().await.unwrap_err();

    assert!(matches!(err, StoreError::SerdeJson(_)));
    assert!(!engine.table_exists(table).await?);

    // still failing, nothing imported or logged in the meantime
    let err = store.executed().await.unwrap_err();

    assert!(matches!(err, StoreError::SerdeJson(_)));

    let err = store.log_migration("1-first").await.unwrap_err();

    assert!(matches!(err, StoreError::SerdeJson(_)));
    assert!(!engine.table_exists(table).await?);

    Ok(())
}

pub async fn test_legacy_absent<E: Engine + Clone + 'static>(
    engine: &E,
    table: &str,
) -> anyhow::Result<()> {
    let store = Store::builder()
        .engine(engine.clone())
        .table_name(table)
        .legacy_table(Some("no_such_legacy_table"))
        .build()?;

    assert!(store.history().await?.is_empty());

    Ok(())
}
