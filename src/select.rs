//! Windowed reads of a node's rows.
//!
//! A [`Selector`] walks row numbers `offset..min(offset + limit, row_count)`
//! and, for each chosen key, picks up the slot stored at that row number.
//! Cells without a slot are left out of the row. The output shape depends on
//! two switches:
//!
//! | `expand_keys` | `expand_slots` | row shape                         |
//! |---------------|----------------|-----------------------------------|
//! | false         | false          | key name to stored value          |
//! | true          | false          | key position to (key, value)      |
//! | false         | true           | key name to rendition             |
//! | true          | true           | key position to (key, rendition)  |

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::construct::{referenced, Database, Key, Node, Slot, Thing};
use crate::datatype::{Attrs, Environment, Representation, SoftType};
use crate::error::{Result, SlotbaseError};

/// A rendered cell, addressed by the identity of the slot it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendition {
    pub slot: Thing,
    pub representation: Representation,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowView {
    Values(BTreeMap<String, Value>),
    KeyedValues(BTreeMap<usize, (Key, Value)>),
    Renditions(BTreeMap<String, Rendition>),
    KeyedRenditions(BTreeMap<usize, (Key, Rendition)>),
}
impl RowView {
    /// Number of cells present in the row.
    pub fn len(&self) -> usize {
        match self {
            RowView::Values(cells) => cells.len(),
            RowView::KeyedValues(cells) => cells.len(),
            RowView::Renditions(cells) => cells.len(),
            RowView::KeyedRenditions(cells) => cells.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub rows: BTreeMap<u64, RowView>,
    /// Set when a predicate was given; predicates are not evaluated.
    pub predicate_ignored: bool,
}

pub struct Selector<'db> {
    database: &'db Database,
    keys: Option<Vec<String>>,
    limit: Option<u64>,
    offset: u64,
    expand_keys: bool,
    expand_slots: bool,
    environment: Environment,
    predicate: Option<String>,
}

impl<'db> Selector<'db> {
    pub fn new(database: &'db Database) -> Self {
        Self {
            database,
            keys: None,
            limit: None,
            offset: 0,
            expand_keys: false,
            expand_slots: false,
            environment: Environment::new(),
            predicate: None,
        }
    }
    /// Restricts the output to these keys, in this order. All keys otherwise.
    pub fn keys<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(names.into_iter().map(Into::into).collect());
        self
    }
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
    pub fn expand_keys(mut self, expand: bool) -> Self {
        self.expand_keys = expand;
        self
    }
    pub fn expand_slots(mut self, expand: bool) -> Self {
        self.expand_slots = expand;
        self
    }
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
    /// Accepted but not applied.
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn select(&self, node: &Node) -> Result<Projection> {
        if let Some(predicate) = &self.predicate {
            warn!(node = %node.name(), %predicate, "row predicates are not evaluated, returning the unfiltered window");
        }
        let keys = match &self.keys {
            None => self.database.keys_of(node)?,
            Some(names) => names
                .iter()
                .map(|name| self.database.key_by_name(node, name))
                .collect::<Result<Vec<_>>>()?,
        };
        let types = if self.expand_slots {
            keys.iter()
                .map(|key| self.database.key_type(key))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let count = self.database.row_count(node)?;
        let end = match self.limit {
            Some(limit) => self.offset.saturating_add(limit).min(count),
            None => count,
        };
        debug!(node = %node.name(), offset = self.offset, end, count, "selecting window");

        let mut rows = BTreeMap::new();
        for row_num in self.offset..end {
            let mut view = match (self.expand_keys, self.expand_slots) {
                (false, false) => RowView::Values(BTreeMap::new()),
                (true, false) => RowView::KeyedValues(BTreeMap::new()),
                (false, true) => RowView::Renditions(BTreeMap::new()),
                (true, true) => RowView::KeyedRenditions(BTreeMap::new()),
            };
            for (index, key) in keys.iter().enumerate() {
                let Some(slot) = self.cell(key, row_num)? else {
                    continue;
                };
                match &mut view {
                    RowView::Values(cells) => {
                        cells.insert(key.name().to_owned(), slot.value().clone());
                    }
                    RowView::KeyedValues(cells) => {
                        cells.insert(key.position(), (key.clone(), slot.value().clone()));
                    }
                    RowView::Renditions(cells) => {
                        cells.insert(key.name().to_owned(), self.render(&types[index], &slot)?);
                    }
                    RowView::KeyedRenditions(cells) => {
                        cells.insert(key.position(), (key.clone(), self.render(&types[index], &slot)?));
                    }
                }
            }
            rows.insert(row_num, view);
        }
        Ok(Projection {
            rows,
            predicate_ignored: self.predicate.is_some(),
        })
    }

    fn cell(&self, key: &Key, row_num: u64) -> Result<Option<Slot>> {
        let id = key
            .id()
            .ok_or_else(|| SlotbaseError::UnknownKey(key.name().to_owned()))?;
        let mut slots = self.database.slots_at(id, row_num)?.into_iter();
        let first = slots.next();
        if slots.next().is_some() {
            warn!(key = %key.name(), row_num, "several slots share a row number, using the first");
        }
        Ok(first)
    }

    // references are rendered through the type of the slot they point at
    fn render(&self, soft_type: &Arc<dyn SoftType>, slot: &Slot) -> Result<Rendition> {
        let id = slot.id().unwrap_or_default();
        let (target, soft_type) = if referenced(slot.value()).is_some() {
            let target = self.database.resolve(slot)?;
            let target_key = self.database.key(target.key())?;
            let target_type = self.database.key_type(&target_key)?;
            (target, target_type)
        } else {
            (slot.clone(), Arc::clone(soft_type))
        };
        Ok(Rendition {
            slot: id,
            representation: soft_type.render(target.value(), &self.environment)?,
            attrs: soft_type.attrs(target.value(), &self.environment)?,
        })
    }
}
