//! Bulk insertion of rows into a node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::audit::{User, SAVE_DOCUMENT};
use crate::construct::{Database, Key, Node, RowId, Slot, Thing};
use crate::error::{Result, SlotbaseError};
use crate::persist::{Filter, StoreExt};

/// What happens to a batch when one of its slots fails to save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Stop and keep what was saved.
    GiveUp,
    /// Stop and delete the slots this call saved. The row identities it
    /// appended stay until the node is synchronized.
    #[default]
    Rollback,
    /// Log the failure and carry on.
    Swallow,
}

/// A key addressed by name or by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyRef {
    Id(Thing),
    Name(String),
}
impl From<&str> for KeyRef {
    fn from(name: &str) -> Self {
        KeyRef::Name(name.to_owned())
    }
}
impl From<String> for KeyRef {
    fn from(name: String) -> Self {
        KeyRef::Name(name)
    }
}
impl From<Thing> for KeyRef {
    fn from(id: Thing) -> Self {
        KeyRef::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub key: KeyRef,
    pub value: Value,
}
impl Cell {
    pub fn new(key: impl Into<KeyRef>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub struct Inserter<'db> {
    database: &'db Database,
    policy: ErrorPolicy,
}

impl<'db> Inserter<'db> {
    pub fn new(database: &'db Database) -> Self {
        Self {
            database,
            policy: ErrorPolicy::default(),
        }
    }
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Inserts each row under a fresh row identity. Returns the number of
    /// slot saves attempted, failures included.
    pub fn insert<R>(&self, user: &User, node: &mut Node, rows: R) -> Result<usize>
    where
        R: IntoIterator<Item = Vec<Cell>>,
    {
        self.database.auditor().authorize(user, &[SAVE_DOCUMENT])?;
        self.database.auditor().permit(user, &*node, false)?;
        let keys = self.database.keys_of(node)?;
        let mut attempts = 0;
        let mut saved: Vec<Thing> = Vec::new();
        for cells in rows {
            let row_id = RowId::generate();
            node.rows.push(row_id);
            for cell in cells {
                attempts += 1;
                let outcome = resolve(node, &keys, &cell.key).and_then(|key| {
                    let mut slot =
                        Slot::new(key.id().unwrap_or_default(), cell.value).in_row(row_id);
                    self.database.store_slot(key, &mut slot)
                });
                match outcome {
                    Ok(id) => saved.push(id),
                    Err(e) => match self.policy {
                        ErrorPolicy::Swallow => {
                            warn!(
                                node = %node.name(),
                                key = ?cell.key,
                                error = %e,
                                "slot not saved, continuing"
                            );
                        }
                        ErrorPolicy::GiveUp => {
                            warn!(
                                node = %node.name(),
                                key = ?cell.key,
                                error = %e,
                                attempts,
                                "giving up"
                            );
                            self.finish(node);
                            return Err(e);
                        }
                        ErrorPolicy::Rollback => {
                            warn!(
                                node = %node.name(),
                                key = ?cell.key,
                                error = %e,
                                saved = saved.len(),
                                "rolling back"
                            );
                            self.roll_back(&saved);
                            self.finish(node);
                            return Err(e);
                        }
                    },
                }
            }
        }
        self.database.persist_rows(node)?;
        info!(node = %node.name(), attempts, saved = saved.len(), "rows inserted");
        Ok(attempts)
    }

    fn roll_back(&self, saved: &[Thing]) {
        for id in saved {
            if let Err(e) = self
                .database
                .store()
                .delete_documents::<Slot>(&Filter::identity(*id))
            {
                warn!(id, error = %e, "rollback could not delete slot");
            }
        }
    }

    // the node's row list is kept even when the batch fails
    fn finish(&self, node: &mut Node) {
        if let Err(e) = self.database.persist_rows(node) {
            warn!(node = %node.name(), error = %e, "could not save row list");
        }
    }
}

fn resolve<'k>(node: &Node, keys: &'k [Key], key: &KeyRef) -> Result<&'k Key> {
    keys.iter()
        .find(|k| match key {
            KeyRef::Id(id) => k.id() == Some(*id),
            KeyRef::Name(name) => k.name() == name.as_str(),
        })
        .ok_or_else(|| {
            SlotbaseError::UnknownKey(match key {
                KeyRef::Id(id) => format!("{}/#{}", node.name(), id),
                KeyRef::Name(name) => format!("{}/{}", node.name(), name),
            })
        })
}
