#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::Value;
use slotbase::audit::{Auditor, Group, User, SAVE_DOCUMENT};
use slotbase::construct::{Database, Key, Node};
use slotbase::datatype::TypeRegistry;
use slotbase::persist::{PersistenceMode, Persistor};
use slotbase::remote::{Reply, Transport};

pub fn admin() -> User {
    User::new("root", vec![Group::new("admin", Vec::<String>::new())])
}

pub fn writer() -> User {
    User::new("writer", vec![Group::new("writers", [SAVE_DOCUMENT])])
}

pub fn reader() -> User {
    User::new("reader", vec![Group::new("readers", Vec::<String>::new())])
}

/// Answers every post with 200 unless the rule says otherwise, and keeps
/// every request it sees.
pub struct RecordingTransport {
    rule: fn(&str, &Value) -> Reply,
    pub seen: Mutex<Vec<(String, Value)>>,
}
impl RecordingTransport {
    pub fn new(rule: fn(&str, &Value) -> Reply) -> Arc<Self> {
        Arc::new(Self {
            rule,
            seen: Mutex::new(Vec::new()),
        })
    }
    pub fn accepting() -> Arc<Self> {
        Self::new(|_, body| Reply {
            status: 200,
            body: format!("<b>{}</b>", body["value"]),
        })
    }
    pub fn calls_to(&self, url: &str) -> Vec<Value> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, body)| body.clone())
            .collect()
    }
}
impl Transport for RecordingTransport {
    fn post(&self, url: &str, body: &Value) -> slotbase::Result<Reply> {
        self.seen.lock().unwrap().push((url.to_owned(), body.clone()));
        Ok((self.rule)(url, body))
    }
}

pub fn database() -> Database {
    database_with(RecordingTransport::accepting())
}

pub fn database_with(transport: Arc<dyn Transport>) -> Database {
    let persistor = Persistor::new(&PersistenceMode::InMemory).expect("persistor");
    Database::with_parts(
        Arc::new(persistor),
        TypeRegistry::with_builtins(),
        transport,
        Auditor::default(),
    )
    .expect("database")
}

/// A node named `name` with the given (key name, type name, size) columns.
pub fn node_with(db: &Database, name: &str, keys: &[(&str, &str, usize)]) -> Node {
    let mut node = db.create_node(&admin(), Node::new(name)).expect("node");
    for (key, soft_type, size) in keys {
        db.create_key(&admin(), &mut node, Key::new(key, *soft_type, *size))
            .expect("key");
    }
    node
}

pub fn key_id(db: &Database, node: &Node, name: &str) -> u64 {
    db.key_by_name(node, name).expect("key").id().expect("key identity")
}
