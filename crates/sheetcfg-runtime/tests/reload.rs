//! Hot-reload behavior across multiple tables.

use std::sync::Arc;

use serde::Deserialize;
use sheetcfg_runtime::{ConfigStore, ListTable, MapTable};

#[derive(Deserialize, Debug)]
struct Monster {
    id: i32,
    name: String,
}

#[derive(Deserialize, Debug)]
struct Stage {
    id: i32,
}

fn write(dir: &std::path::Path, file: &str, content: &str) {
    std::fs::write(dir.join(file), content).unwrap();
}

#[test]
fn test_load_publishes_all_tables() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Monster.json",
        r#"{"1": {"id": 1, "name": "slime"}}"#,
    );
    write(dir.path(), "Stage.json", r#"[{"id": 10}, {"id": 11}]"#);

    let monsters: Arc<MapTable<i32, Monster>> = MapTable::new();
    let stages: Arc<ListTable<Stage>> = ListTable::with_id(|s| i64::from(s.id));
    let mut store = ConfigStore::new();
    store.register("Monster.json", monsters.clone());
    store.register("Stage.json", stages.clone());

    let generation = store.load_all(dir.path()).unwrap();
    assert_eq!(generation, 1);
    assert_eq!(monsters.get(&1).unwrap().name, "slime");
    assert_eq!(stages.len(), 2);
}

#[test]
fn test_failed_reload_leaves_every_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Monster.json",
        r#"{"1": {"id": 1, "name": "slime"}}"#,
    );
    write(dir.path(), "Stage.json", r#"[{"id": 10}]"#);

    let monsters: Arc<MapTable<i32, Monster>> = MapTable::new();
    let stages: Arc<ListTable<Stage>> = ListTable::new();
    let mut store = ConfigStore::new();
    store.register("Monster.json", monsters.clone());
    store.register("Stage.json", stages.clone());
    store.load_all(dir.path()).unwrap();

    // Monster decodes fine, Stage is truncated: nothing may change, not
    // even the successfully decoded Monster table.
    write(
        dir.path(),
        "Monster.json",
        r#"{"1": {"id": 1, "name": "renamed"}, "2": {"id": 2, "name": "bat"}}"#,
    );
    write(dir.path(), "Stage.json", r#"[{"id": 10}"#);

    assert!(store.load_all(dir.path()).is_err());
    assert_eq!(store.generation(), 1);
    assert_eq!(monsters.len(), 1);
    assert_eq!(monsters.get(&1).unwrap().name, "slime");
    assert_eq!(stages.len(), 1);
}

#[test]
fn test_generation_increments_per_successful_reload() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Stage.json", r#"[{"id": 10}]"#);

    let stages: Arc<ListTable<Stage>> = ListTable::new();
    let mut store = ConfigStore::new();
    store.register("Stage.json", stages.clone());

    assert_eq!(store.generation(), 0);
    assert_eq!(store.load_all(dir.path()).unwrap(), 1);
    assert_eq!(store.load_all(dir.path()).unwrap(), 2);
    assert_eq!(store.generation(), 2);
}

#[test]
fn test_concurrent_readers_never_see_a_torn_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Monster.json",
        r#"{"1": {"id": 1, "name": "gen-a"}, "2": {"id": 2, "name": "gen-a"}}"#,
    );

    let monsters: Arc<MapTable<i32, Monster>> = MapTable::new();
    let mut store = ConfigStore::new();
    store.register("Monster.json", monsters.clone());
    let store = Arc::new(store);
    store.load_all(dir.path()).unwrap();

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let monsters = monsters.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let mut names = Vec::new();
                    monsters.for_each(|_, m| {
                        names.push(m.name.clone());
                        true
                    });
                    // Every read sees one generation, never a mix.
                    assert!(
                        names.windows(2).all(|w| w[0] == w[1]),
                        "torn snapshot observed: {names:?}"
                    );
                }
            })
        })
        .collect();

    for generation in ["gen-b", "gen-c", "gen-d"] {
        write(
            dir.path(),
            "Monster.json",
            &format!(
                r#"{{"1": {{"id": 1, "name": "{generation}"}}, "2": {{"id": 2, "name": "{generation}"}}}}"#
            ),
        );
        store.load_all(dir.path()).unwrap();
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
}
