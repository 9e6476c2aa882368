use std::sync::Arc;
use std::thread;

use lore_core::StoreConfig;
use lore_store::ResourceStore;
use rusqlite::Connection;

fn file_config(dir: &tempfile::TempDir, pool_size: usize) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("lore.db"),
        pool_size,
        busy_timeout_ms: 5000,
    }
}

#[test]
fn resources_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir, 2);

    let id = {
        let store = ResourceStore::open_with(&config).unwrap();
        store
            .insert_resource("Persisted", "Still here after restart.", None, Some("disk"))
            .unwrap()
    };

    let store = ResourceStore::open_with(&config).unwrap();
    let resource = store.get_resource(id).unwrap().unwrap();
    assert_eq!(resource.name, "Persisted");
    assert_eq!(resource.tags.as_deref(), Some("disk"));
}

#[test]
fn legacy_database_gains_tags_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    // Schema as written before tags existed, with SQLite-default timestamps.
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                content TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO resources (name, description, content)
            VALUES ('Old Entry', NULL, 'Written by an older version.');
            ",
        )
        .unwrap();
    }

    let store = ResourceStore::open(&path).unwrap();
    let untagged = store.list_untagged().unwrap();
    assert_eq!(untagged.len(), 1);
    assert_eq!(untagged[0].name, "Old Entry");
    assert!(untagged[0].tags.is_none());

    store.update_tags(untagged[0].id, "legacy").unwrap();
    assert!(store.list_untagged().unwrap().is_empty());

    // Column order stays id, name, description, content, created_at, tags.
    let conn = Connection::open(&path).unwrap();
    let mut stmt = conn.prepare("PRAGMA table_info(resources)").unwrap();
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get(1))
        .unwrap()
        .map(|c| c.unwrap())
        .collect();
    assert_eq!(
        columns,
        vec!["id", "name", "description", "content", "created_at", "tags"]
    );
}

#[test]
fn concurrent_inserts_keep_ids_unique() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ResourceStore::open_with(&file_config(&dir, 4)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        store
                            .insert_resource(&format!("r-{t}-{i}"), "body", None, None)
                            .unwrap()
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut ids: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 100);

    let listed = store.list_resources().unwrap();
    assert_eq!(listed.len(), 100);
    assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
}

#[test]
fn reads_interleave_with_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ResourceStore::open_with(&file_config(&dir, 4)).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..50 {
                store
                    .insert_resource(&format!("w{i}"), "content", None, None)
                    .unwrap();
            }
        })
    };

    // A concurrent listing may observe any prefix of the writes, never an error.
    for _ in 0..20 {
        let seen = store.list_resources().unwrap().len();
        assert!(seen <= 50);
    }

    writer.join().unwrap();
    assert_eq!(store.stats().unwrap().total_resources, 50);
}
