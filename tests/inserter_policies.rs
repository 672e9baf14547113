mod common;

use serde_json::Value;
use slotbase::construct::{Database, Node, Slot};
use slotbase::insert::{Cell, ErrorPolicy, Inserter};
use slotbase::persist::{Filter, StoreExt};
use slotbase::SlotbaseError;

use common::{admin, database, node_with, reader};

// five single-cell rows, the third of which is not an integer
fn batch() -> Vec<Vec<Cell>> {
    ["1", "2", "three", "4", "5"]
        .into_iter()
        .map(|v| vec![Cell::new("n", v)])
        .collect()
}

fn stored_slots(db: &Database) -> Vec<Slot> {
    db.store().find::<Slot>(&Filter::all()).expect("slots")
}

fn numbers() -> (Database, Node) {
    let db = database();
    let node = node_with(&db, "numbers", &[("n", "INTEGER", 5)]);
    (db, node)
}

#[test]
fn rollback_is_the_default() {
    let (db, mut node) = numbers();
    let inserter = Inserter::new(&db);
    assert_eq!(inserter.policy(), ErrorPolicy::Rollback);
    let count_before = db.row_count(&node).expect("count");
    assert!(matches!(
        inserter.insert(&admin(), &mut node, batch()),
        Err(SlotbaseError::ValidationFailed(_))
    ));
    assert!(stored_slots(&db).is_empty());
    // the three attempted rows stay listed until the node is synchronized
    assert_eq!(node.len(), 3);
    assert_eq!(db.node(node.id().expect("id")).expect("stored").len(), 3);
    assert!(!db.verify_rows(&node).expect("verify"));

    db.synchronize_rows(&mut node).expect("sync");
    assert!(node.is_empty());
    assert_eq!(db.row_count(&node).expect("count"), count_before);
    assert!(db.verify_rows(&node).expect("verify"));
}

#[test]
fn rollback_leaves_earlier_inserts_alone() {
    let (db, mut node) = numbers();
    Inserter::new(&db)
        .insert(&admin(), &mut node, vec![vec![Cell::new("n", 10)]])
        .expect("first batch");
    let count_before = db.row_count(&node).expect("count");
    assert!(Inserter::new(&db).insert(&admin(), &mut node, batch()).is_err());
    let slots = stored_slots(&db);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].value(), &Value::from(10));
    assert_eq!(node.len(), 4);

    db.synchronize_rows(&mut node).expect("sync");
    assert_eq!(node.len(), 1);
    assert_eq!(db.row_count(&node).expect("count"), count_before);
}

#[test]
fn give_up_keeps_what_was_saved() {
    let (db, mut node) = numbers();
    assert!(Inserter::new(&db)
        .with_policy(ErrorPolicy::GiveUp)
        .insert(&admin(), &mut node, batch())
        .is_err());
    let values: Vec<Value> = stored_slots(&db).iter().map(|s| s.value().clone()).collect();
    assert_eq!(values, vec![Value::from(1), Value::from(2)]);
}

#[test]
fn swallow_counts_every_attempt() {
    let (db, mut node) = numbers();
    let attempts = Inserter::new(&db)
        .with_policy(ErrorPolicy::Swallow)
        .insert(&admin(), &mut node, batch())
        .expect("swallowed");
    assert_eq!(attempts, 5);
    assert_eq!(stored_slots(&db).len(), 4);
    assert_eq!(node.len(), 5);
    // the row whose only cell failed has no slot, so synchronizing drops it
    db.synchronize_rows(&mut node).expect("sync");
    assert_eq!(node.len(), 4);
}

#[test]
fn unknown_keys_fail_like_invalid_values() {
    let (db, mut node) = numbers();
    let attempts = Inserter::new(&db)
        .with_policy(ErrorPolicy::Swallow)
        .insert(
            &admin(),
            &mut node,
            vec![vec![Cell::new("n", 1), Cell::new("missing", 2)]],
        )
        .expect("swallowed");
    assert_eq!(attempts, 2);
    assert!(matches!(
        Inserter::new(&db).insert(&admin(), &mut node, vec![vec![Cell::new("missing", 2)]]),
        Err(SlotbaseError::UnknownKey(_))
    ));
}

#[test]
fn each_row_gets_its_own_identity() {
    let (db, mut node) = numbers();
    let attempts = Inserter::new(&db)
        .insert(&admin(), &mut node, vec![vec![Cell::new("n", 1)], vec![Cell::new("n", 2)]])
        .expect("insert");
    assert_eq!(attempts, 2);
    let slots = stored_slots(&db);
    assert_ne!(slots[0].row_id(), slots[1].row_id());
    assert_eq!(node.rows(), &[slots[0].row_id(), slots[1].row_id()]);
    assert_eq!(db.node(node.id().expect("id")).expect("stored").len(), 2);
}

#[test]
fn inserting_needs_the_capability() {
    let (db, mut node) = numbers();
    assert!(matches!(
        Inserter::new(&db).insert(&reader(), &mut node, batch()),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
    assert!(node.is_empty());
}
