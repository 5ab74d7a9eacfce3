// Both backends must behave identically for every operation the schedule
// store relies on.

use convoy_records::{
    KeyValueStore, LabelIndex, MemoryBackend, Record, RecordBackend, SqliteBackend,
};

fn sqlite(namespace: &str) -> SqliteBackend {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    SqliteBackend::new(conn, namespace).unwrap()
}

fn sample(name: &str, kind: &str) -> Record {
    Record::new(name, format!(r#"{{"name":"{name}"}}"#))
        .with_label("kind", kind)
        .with_label("owner", "alice")
}

async fn exercise(backend: &dyn RecordBackend) {
    backend.create(&sample("a", "schedule")).await.unwrap();
    backend.create(&sample("b", "schedule")).await.unwrap();
    backend.create(&sample("c", "other")).await.unwrap();

    let dup = backend.create(&sample("a", "schedule")).await.unwrap_err();
    assert!(dup.is_already_exists());

    let got = backend.get("a").await.unwrap().expect("record a");
    assert_eq!(got, sample("a", "schedule"));
    assert!(backend.get("missing").await.unwrap().is_none());

    let listed = backend.list_by_label("kind", "schedule").await.unwrap();
    let names: Vec<_> = listed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    // relabel b out of the schedule set
    let moved = Record::new("b", "{}").with_label("kind", "other");
    backend.update(&moved).await.unwrap();
    let listed = backend.list_by_label("kind", "schedule").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(backend.get("b").await.unwrap().unwrap().data, "{}");

    let missing = backend.update(&sample("zzz", "schedule")).await.unwrap_err();
    assert!(missing.is_not_found());

    backend.delete("a").await.unwrap();
    assert!(backend.get("a").await.unwrap().is_none());
    assert!(backend.delete("a").await.unwrap_err().is_not_found());
    assert!(backend.list_by_label("kind", "schedule").await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_backend_contract() {
    exercise(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn sqlite_backend_contract() {
    exercise(&sqlite("default")).await;
}

#[tokio::test]
async fn sqlite_namespaces_are_isolated() {
    let uri = "file:convoy-ns-test?mode=memory&cache=shared";
    let a = SqliteBackend::new(rusqlite::Connection::open(uri).unwrap(), "team-a").unwrap();
    let b = SqliteBackend::new(rusqlite::Connection::open(uri).unwrap(), "team-b").unwrap();

    a.create(&sample("x", "schedule")).await.unwrap();
    assert_eq!(a.namespace(), "team-a");
    assert_eq!(a.list_by_label("kind", "schedule").await.unwrap().len(), 1);

    assert!(b.get("x").await.unwrap().is_none());
    assert!(b.list_by_label("kind", "schedule").await.unwrap().is_empty());
    // same name in another namespace is not a conflict
    b.create(&sample("x", "schedule")).await.unwrap();
}
