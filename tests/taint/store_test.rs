//! Variable store contract tests.

use std::sync::Arc;

use trustflow::taint::{TaintedValue, VariableStore, MAIN_KEY};

// ---------- lookup ----------

#[test]
fn lookups_are_case_insensitive() {
    let store = VariableStore::new();
    store.set("Foo", Some("v".to_owned()), true);
    assert_eq!(store.get("foo").content(), "v");

    store.set("FOO", Some("w".to_owned()), true);
    assert_eq!(store.len(), 2, "main plus one slot");
    assert_eq!(store.get("fOo").content(), "w");
}

#[test]
fn missing_key_reports_trusted_sentinel() {
    let store = VariableStore::new();
    let missing = store.get("missing");
    assert!(missing.is_trusted());
    assert_eq!(missing.content(), "");
    assert!(store.try_get("missing").is_none());
    assert!(!store.contains("missing"));
}

// ---------- set ----------

#[test]
fn set_none_deletes_slot() {
    let store = VariableStore::new();
    store.set("tmp", Some("x".to_owned()), false);
    assert!(store.contains("tmp"));
    store.set("TMP", None, true);
    assert!(!store.contains("tmp"));
}

#[test]
fn set_replaces_content_and_trust_together() {
    let store = VariableStore::new();
    store.set("k", Some("a".to_owned()), false);
    store.set("k", Some("b".to_owned()), true);
    assert_eq!(store.get("k"), TaintedValue::trusted("b"));
}

#[test]
fn insert_always_stamps_trusted() {
    let store = VariableStore::new();
    store.set("k", Some("tainted".to_owned()), false);
    store.insert("k", "overwritten");
    assert_eq!(store.get("k"), TaintedValue::trusted("overwritten"));
}

// ---------- main slot ----------

#[test]
fn preserving_update_cannot_restore_trust() {
    let store = VariableStore::with_main(TaintedValue::untrusted("old"));
    store.update_main_preserving_trust("new", true);
    assert_eq!(store.main(), TaintedValue::untrusted("new"));
}

#[test]
fn plain_update_restores_trust() {
    let store = VariableStore::with_main(TaintedValue::untrusted("old"));
    store.update_main("new", true);
    assert_eq!(store.main(), TaintedValue::trusted("new"));
}

#[test]
fn preserving_update_can_taint() {
    let store = VariableStore::with_main(TaintedValue::trusted("old"));
    store.update_main_preserving_trust("new", false);
    assert_eq!(store.main(), TaintedValue::untrusted("new"));
}

#[test]
fn update_main_leaves_other_slots() {
    let store = VariableStore::new();
    store.set("other", Some("o".to_owned()), false);
    store.update_main("m", true);
    assert_eq!(store.get("other"), TaintedValue::untrusted("o"));
    assert_eq!(store.get(MAIN_KEY), TaintedValue::trusted("m"));
}

// ---------- merge ----------

#[test]
fn merge_overwrites_trust_on_collision() {
    let target = VariableStore::new();
    target.set("x", Some("1".to_owned()), true);
    let source = VariableStore::new();
    source.set("x", Some("2".to_owned()), false);

    target.merge(&source, false);
    assert_eq!(target.get("x"), TaintedValue::untrusted("2"));
}

#[test]
fn merge_can_upgrade_trust_on_collision() {
    let target = VariableStore::new();
    target.set("x", Some("1".to_owned()), false);
    let source = VariableStore::new();
    source.set("X", Some("2".to_owned()), true);

    target.merge(&source, false);
    assert_eq!(target.get("x"), TaintedValue::trusted("2"));
}

#[test]
fn merge_keeps_non_colliding_slots_unless_discarding() {
    let target = VariableStore::new();
    target.insert("keep", "k");
    let source = VariableStore::new();
    source.insert("new", "n");

    target.merge(&source, false);
    assert!(target.contains("keep"));
    assert!(target.contains("new"));

    let discarding = VariableStore::new();
    discarding.insert("gone", "g");
    discarding.merge(&source, true);
    assert!(!discarding.contains("gone"));
    assert!(discarding.contains("new"));
    assert!(discarding.contains(MAIN_KEY));
}

// ---------- bulk trust ----------

#[test]
fn force_all_untrusted_keeps_content() {
    let store = VariableStore::with_main(TaintedValue::trusted("m"));
    store.insert("a", "1");
    assert!(store.is_all_trusted());

    store.force_all_untrusted();
    assert!(!store.is_all_trusted());
    assert_eq!(store.get("a"), TaintedValue::untrusted("1"));
    assert_eq!(store.main(), TaintedValue::untrusted("m"));
}

#[test]
fn one_untrusted_slot_breaks_all_trusted() {
    let store = VariableStore::new();
    store.insert("a", "1");
    store.set("b", Some("2".to_owned()), false);
    assert!(!store.is_all_trusted());
}

// ---------- clone / iteration ----------

#[test]
fn clone_is_deep() {
    let store = VariableStore::new();
    store.insert("a", "1");
    let copy = store.clone();
    copy.set("a", Some("2".to_owned()), false);
    copy.insert("b", "3");

    assert_eq!(store.get("a"), TaintedValue::trusted("1"));
    assert!(!store.contains("b"));
}

#[test]
fn iteration_yields_names_and_content() {
    let store = VariableStore::with_main(TaintedValue::trusted("m"));
    store.set("Secret", Some("s".to_owned()), false);
    let mut pairs: Vec<(String, String)> = store.iter().collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("Secret".to_owned(), "s".to_owned()),
            (MAIN_KEY.to_owned(), "m".to_owned()),
        ]
    );
}

#[test]
fn display_prints_main_content() {
    let store = VariableStore::with_main(TaintedValue::untrusted("shown"));
    assert_eq!(store.to_string(), "shown");
}

// ---------- concurrency ----------

#[tokio::test]
async fn concurrent_writers_land_in_one_store() {
    let store = Arc::new(VariableStore::new());
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.set(&format!("key{i}"), Some(i.to_string()), i % 2 == 0);
        }));
    }
    for handle in handles {
        handle.await.expect("writer task");
    }
    assert_eq!(store.len(), 17);
    assert_eq!(store.get("KEY3"), TaintedValue::untrusted("3"));
    assert_eq!(store.get("key4"), TaintedValue::trusted("4"));
}

#[tokio::test]
async fn concurrent_preserving_updates_never_lose_taint() {
    let store = Arc::new(VariableStore::new());
    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.update_main_preserving_trust(format!("v{i}"), i != 7);
        }));
    }
    for handle in handles {
        handle.await.expect("updater task");
    }
    assert!(!store.main().is_trusted());
}
