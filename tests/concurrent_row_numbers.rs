mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use slotbase::construct::Slot;

use common::{admin, database, key_id, node_with};

#[test]
fn concurrent_saves_never_share_a_row_number() {
    let db = Arc::new(database());
    let node = node_with(&db, "tally", &[("n", "INTEGER", 5)]);
    let n = key_id(&db, &node, "n");

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let mut slot = Slot::new(n, worker * 10 + i);
                        db.save_slot(&admin(), &mut slot).expect("slot");
                        slot.row_num()
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut taken = HashSet::new();
    for worker in workers {
        for row_num in worker.join().expect("worker") {
            assert!(taken.insert(row_num), "row number {} handed out twice", row_num);
        }
    }
    assert_eq!(taken.len(), 40);
    assert_eq!(db.row_count(&node).expect("count"), 40);
}
