mod common;

use slotbase::audit::{Event, Group, Historical, User, SAVE_DOCUMENT, SET_VISIBILITY};
use slotbase::construct::{Key, Node};
use slotbase::insert::{Cell, Inserter};
use slotbase::SlotbaseError;

use common::{admin, database, node_with, reader, writer};

#[test]
fn creation_is_recorded() {
    let db = database();
    let node = db.create_node(&writer(), Node::new("notes")).expect("node");
    assert_eq!(node.creator(), Some("writer"));
    assert_eq!(node.history()[0].event, Event::Create);
    assert!(matches!(
        db.create_node(&reader(), Node::new("drafts")),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
}

#[test]
fn node_names_are_unique_slugs() {
    let db = database();
    db.create_node(&admin(), Node::new("notes")).expect("node");
    assert!(matches!(
        db.create_node(&admin(), Node::new("notes")),
        Err(SlotbaseError::DuplicatePath(_))
    ));
    assert!(matches!(
        db.create_node(&admin(), Node::new("My Notes")),
        Err(SlotbaseError::ValidationFailed(_))
    ));
}

#[test]
fn key_names_are_unique_within_a_node() {
    let db = database();
    let mut node = node_with(&db, "notes", &[("title", "STRING", 40)]);
    assert!(matches!(
        db.create_key(&admin(), &mut node, Key::new("title", "STRING", 80)),
        Err(SlotbaseError::DuplicatePath(_))
    ));
    assert_eq!(node.keys().len(), 1);
}

#[test]
fn readonly_nodes_refuse_writes() {
    let db = database();
    let mut node = node_with(&db, "notes", &[("title", "STRING", 40)]);
    db.set_readonly(&admin(), &mut node).expect("readonly");
    let stored = db.node(node.id().expect("id")).expect("stored");
    assert!(stored.is_readonly());

    assert!(matches!(
        Inserter::new(&db).insert(&writer(), &mut node, vec![vec![Cell::new("title", "x")]]),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
    assert!(matches!(
        db.create_key(&admin(), &mut node, Key::new("body", "STRING", 400)),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
    assert!(matches!(
        db.set_writable(&writer(), &mut node),
        Err(SlotbaseError::PermissionDenied { .. })
    ));

    db.set_writable(&admin(), &mut node).expect("writable");
    Inserter::new(&db)
        .insert(&writer(), &mut node, vec![vec![Cell::new("title", "x")]])
        .expect("insert");
}

#[test]
fn visibility_needs_its_own_capability() {
    let db = database();
    let mut node = node_with(&db, "notes", &[]);
    assert!(matches!(
        db.hide(&writer(), &mut node),
        Err(SlotbaseError::PermissionDenied { .. })
    ));
    let curator = User::new("cu", vec![Group::new("curators", [SAVE_DOCUMENT, SET_VISIBILITY])]);
    db.hide(&curator, &mut node).expect("hide");
    assert!(db.node(node.id().expect("id")).expect("stored").is_hidden());
    db.show(&curator, &mut node).expect("show");
    assert!(!db.node(node.id().expect("id")).expect("stored").is_hidden());
}

#[test]
fn keys_can_be_moved() {
    let db = database();
    let mut node = node_with(&db, "notes", &[("a", "STRING", 5), ("b", "STRING", 5), ("c", "STRING", 5)]);
    let c = db.key_by_name(&node, "c").expect("c").id().expect("id");
    db.move_key(&admin(), &mut node, c, 0).expect("move");
    let names: Vec<String> = db
        .keys_of(&node)
        .expect("keys")
        .iter()
        .map(|k| format!("{}{}", k.name(), k.position()))
        .collect();
    assert_eq!(names, vec!["c0", "a1", "b2"]);
    assert_eq!(db.key_owner(c).expect("owner").expect("node").name(), "notes");
}
