use std::sync::{Arc, Mutex};

// used to keep the one-to-one mapping between type names and their identities
use bimap::BiMap;

// other keepers use HashSet or HashMap
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::{HashMap, HashSet};

// used to print out readable forms of a construct
use std::fmt;

// row numbers already taken by a key
use roaring::RoaringTreemap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

// our own stuff that we need
use crate::audit::{Action, Auditor, Historical, SAVE_DOCUMENT, User};
use crate::datatype::{RE_REFERENCE, SoftType, TypeRegistry};
use crate::error::{Result, SlotbaseError};
use crate::persist::{Document, Filter, PersistenceMode, Persistor, Store, StoreExt};
use crate::remote::{HttpTransport, RemoteType, Transport};
use crate::settings::Settings;

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

// ------------- Thing -------------
pub type Thing = u64;

pub type ThingHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub const REFERENCE_SCHEME: &str = "slot";

/// The reference URL addressing a slot.
pub fn reference_to(slot: Thing) -> String {
    format!("{}://{}", REFERENCE_SCHEME, slot)
}

/// The slot identity a value refers to, if the value is a reference.
pub fn referenced(value: &Value) -> Option<Thing> {
    let captures = RE_REFERENCE.captures(value.as_str()?)?;
    captures.get(1)?.as_str().parse().ok()
}

// ------------- RowId -------------
/// Identity shared by all slots of one logical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(Uuid);
impl RowId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}
impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<RowId> for Value {
    fn from(row_id: RowId) -> Self {
        Value::String(row_id.0.to_string())
    }
}

macro_rules! document {
    ($entity:ty, $kind:literal) => {
        impl Document for $entity {
            const KIND: &'static str = $kind;
            fn id(&self) -> Option<Thing> {
                self.id
            }
            fn set_id(&mut self, id: Thing) {
                self.id = Some(id);
            }
        }
    };
}

macro_rules! historical {
    ($entity:ty) => {
        impl Historical for $entity {
            fn history(&self) -> &[Action] {
                &self.history
            }
            fn history_mut(&mut self) -> &mut Vec<Action> {
                &mut self.history
            }
        }
    };
}

// ------------- TypeDef -------------
/// A named type. Local types are resolved through the registry, remote
/// ones through their endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Thing>,
    name: String,
    validator: Option<String>,
    representer: Option<String>,
    #[serde(default)]
    is_primitive: bool,
    #[serde(default)]
    history: Vec<Action>,
}
impl TypeDef {
    pub fn local(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_uppercase(),
            validator: None,
            representer: None,
            is_primitive: false,
            history: Vec::new(),
        }
    }
    pub fn remote(name: &str, validator: &str, representer: &str) -> Self {
        Self {
            validator: Some(validator.to_owned()),
            representer: Some(representer.to_owned()),
            ..Self::local(name)
        }
    }
    pub fn primitive(mut self) -> Self {
        self.is_primitive = true;
        self
    }
    pub fn id(&self) -> Option<Thing> {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }
    pub fn representer(&self) -> Option<&str> {
        self.representer.as_deref()
    }
    pub fn is_primitive(&self) -> bool {
        self.is_primitive
    }
    pub fn is_remote(&self) -> bool {
        self.validator.is_some() || self.representer.is_some()
    }
}
document!(TypeDef, "Type");
historical!(TypeDef);

/// How a key names its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Id(Thing),
    Name(String),
}
impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_owned())
    }
}
impl From<Thing> for TypeRef {
    fn from(id: Thing) -> Self {
        TypeRef::Id(id)
    }
}
impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeRef::Id(id) => write!(f, "#{}", id),
            TypeRef::Name(name) => write!(f, "{}", name),
        }
    }
}

// ------------- Key -------------
/// A column: a name, a soft type and a size limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Thing>,
    name: String,
    #[serde(default)]
    comment: String,
    soft_type: TypeRef,
    size: usize,
    #[serde(default)]
    pub(crate) position: usize,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    history: Vec<Action>,
    #[serde(default)]
    discussions: Vec<Thing>,
}
impl Key {
    pub fn new(name: &str, soft_type: impl Into<TypeRef>, size: usize) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            comment: String::new(),
            soft_type: soft_type.into(),
            size,
            position: 0,
            primary: false,
            history: Vec::new(),
            discussions: Vec::new(),
        }
    }
    pub fn commented(mut self, comment: &str) -> Self {
        self.comment = comment.to_owned();
        self
    }
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
    pub fn id(&self) -> Option<Thing> {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn comment(&self) -> &str {
        &self.comment
    }
    pub fn soft_type(&self) -> &TypeRef {
        &self.soft_type
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn is_primary(&self) -> bool {
        self.primary
    }
    pub fn discussions(&self) -> &[Thing] {
        &self.discussions
    }
    fn identity(&self) -> Result<Thing> {
        self.id
            .ok_or_else(|| SlotbaseError::UnknownKey(format!("{} has not been created", self.name)))
    }
}
document!(Key, "Key");
historical!(Key);

// ------------- Node -------------
/// A table: an ordered list of keys and the logical rows spanning them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Thing>,
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pub(crate) keys: Vec<Thing>,
    #[serde(default)]
    pub(crate) rows: Vec<RowId>,
    #[serde(default)]
    history: Vec<Action>,
    #[serde(default)]
    discussions: Vec<Thing>,
}
impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            title: String::new(),
            description: String::new(),
            keys: Vec::new(),
            rows: Vec::new(),
            history: Vec::new(),
            discussions: Vec::new(),
        }
    }
    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }
    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }
    pub fn id(&self) -> Option<Thing> {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn keys(&self) -> &[Thing] {
        &self.keys
    }
    pub fn rows(&self) -> &[RowId] {
        &self.rows
    }
    pub fn discussions(&self) -> &[Thing] {
        &self.discussions
    }
    /// Number of logical rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
document!(Node, "Node");
historical!(Node);

// ------------- Slot -------------
/// One cell: the value of a key at a row number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<Thing>,
    key: Thing,
    pub(crate) row_num: u64,
    row_id: RowId,
    pub(crate) value: Value,
    #[serde(default)]
    discussions: Vec<Thing>,
}
impl Slot {
    /// A slot for a fresh row, asking for row number 0.
    pub fn new(key: Thing, value: impl Into<Value>) -> Self {
        Self {
            id: None,
            key,
            row_num: 0,
            row_id: RowId::generate(),
            value: value.into(),
            discussions: Vec::new(),
        }
    }
    /// Asks for a starting row number; the first free one from here is taken.
    pub fn at(mut self, row_num: u64) -> Self {
        self.row_num = row_num;
        self
    }
    pub fn in_row(mut self, row_id: RowId) -> Self {
        self.row_id = row_id;
        self
    }
    pub fn id(&self) -> Option<Thing> {
        self.id
    }
    pub fn key(&self) -> Thing {
        self.key
    }
    pub fn row_num(&self) -> u64 {
        self.row_num
    }
    pub fn row_id(&self) -> RowId {
        self.row_id
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }
    pub fn discussions(&self) -> &[Thing] {
        &self.discussions
    }
    pub fn reference(&self) -> Option<String> {
        self.id.map(reference_to)
    }
}
document!(Slot, "Slot");

// ------------- Database -------------
pub struct Database {
    // responsible for the the persistence layer
    store: Arc<dyn Store>,
    // local handlers and the transport used by remote types
    registry: TypeRegistry,
    transport: Arc<dyn Transport>,
    auditor: Auditor,
    // owns lookups between type names and type identities
    type_lookup: Mutex<BiMap<String, Thing>>,
    // serializes row number probing per key
    key_latches: Mutex<HashMap<Thing, Arc<Mutex<()>>, ThingHasher>>,
}

impl Database {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        Self::with_parts(
            Arc::new(Persistor::new(&mode)?),
            TypeRegistry::with_builtins(),
            Arc::new(HttpTransport::new(None)?),
            Auditor::default(),
        )
    }
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_parts(
            Arc::new(Persistor::new(&settings.database.mode())?),
            TypeRegistry::with_builtins(),
            Arc::new(HttpTransport::new(settings.types.timeout())?),
            Auditor::new(settings.audit.admin_groups.clone()),
        )
    }
    pub fn with_parts(
        store: Arc<dyn Store>,
        registry: TypeRegistry,
        transport: Arc<dyn Transport>,
        auditor: Auditor,
    ) -> Result<Self> {
        let database = Self {
            store,
            registry,
            transport,
            auditor,
            type_lookup: Mutex::new(BiMap::new()),
            key_latches: Mutex::new(HashMap::default()),
        };
        database.restore_types()?;
        Ok(database)
    }
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    fn restore_types(&self) -> Result<()> {
        let mut lookup = self.type_lookup.lock()?;
        for def in self.store.find::<TypeDef>(&Filter::all())? {
            if let Some(id) = def.id {
                lookup.insert(def.name.clone(), id);
            }
        }
        let restored = lookup.len();
        for name in self.registry.names() {
            if !lookup.contains_left(&name) {
                let mut def = TypeDef::local(&name).primitive();
                let id = self.store.save_document(&mut def)?;
                lookup.insert(def.name, id);
            }
        }
        info!(restored, total = lookup.len(), "types ready");
        Ok(())
    }

    // ------------- Types -------------
    pub fn create_type(&self, user: &User, mut def: TypeDef) -> Result<TypeDef> {
        if !def.is_remote() && self.registry.get(&def.name).is_none() {
            return Err(SlotbaseError::UnknownType(def.name));
        }
        let mut lookup = self.type_lookup.lock()?;
        if lookup.contains_left(&def.name) {
            return Err(SlotbaseError::DuplicateType(def.name));
        }
        self.auditor.record(user, &mut def, false)?;
        let id = self.store.save_document(&mut def)?;
        lookup.insert(def.name.clone(), id);
        info!(name = %def.name, id, remote = def.is_remote(), "type created");
        Ok(def)
    }
    pub fn type_def(&self, type_ref: &TypeRef) -> Result<TypeDef> {
        let id = match type_ref {
            TypeRef::Id(id) => *id,
            TypeRef::Name(name) => *self
                .type_lookup
                .lock()?
                .get_by_left(&name.to_uppercase())
                .ok_or_else(|| SlotbaseError::UnknownType(name.clone()))?,
        };
        self.store.first::<TypeDef>(&Filter::identity(id))?
            .ok_or_else(|| SlotbaseError::UnknownType(type_ref.to_string()))
    }
    /// Resolves a type reference to the handler doing the work.
    pub fn soft_type(&self, type_ref: &TypeRef) -> Result<Arc<dyn SoftType>> {
        let def = self.type_def(type_ref)?;
        if def.is_remote() {
            return Ok(Arc::new(RemoteType::new(
                &def.name,
                def.validator,
                def.representer,
                Arc::clone(&self.transport),
            )));
        }
        self.registry
            .get(&def.name)
            .ok_or(SlotbaseError::UnknownType(def.name))
    }
    pub fn key_type(&self, key: &Key) -> Result<Arc<dyn SoftType>> {
        self.soft_type(&key.soft_type)
    }

    // ------------- Nodes -------------
    pub fn create_node(&self, user: &User, mut node: Node) -> Result<Node> {
        if node.name.is_empty() || !node.name.chars().all(is_slug_char) {
            return Err(SlotbaseError::ValidationFailed(format!(
                "'{}' is not a valid node name",
                node.name
            )));
        }
        if self.store.count_documents::<Node>(&Filter::by("name", node.name.as_str()))? > 0 {
            return Err(SlotbaseError::DuplicatePath(node.name));
        }
        self.auditor.record(user, &mut node, false)?;
        let id = self.store.save_document(&mut node)?;
        info!(name = %node.name, id, "node created");
        Ok(node)
    }
    pub fn node(&self, id: Thing) -> Result<Node> {
        self.store.fetch(id)
    }
    pub fn node_by_name(&self, name: &str) -> Result<Option<Node>> {
        self.store.first(&Filter::by("name", name))
    }
    /// Saves descriptive changes made to a node.
    pub fn save_node(&self, user: &User, node: &mut Node) -> Result<Thing> {
        self.auditor.record(user, node, false)?;
        self.store.save_document(node)
    }
    pub fn set_readonly<D>(&self, user: &User, entity: &mut D) -> Result<()>
    where
        D: Document + Historical,
    {
        self.auditor.set_readonly(user, entity)?;
        self.store.save_document(entity)?;
        Ok(())
    }
    pub fn set_writable<D>(&self, user: &User, entity: &mut D) -> Result<()>
    where
        D: Document + Historical,
    {
        self.auditor.set_writable(user, entity)?;
        self.store.save_document(entity)?;
        Ok(())
    }
    pub fn hide<D: Document + Historical>(&self, user: &User, entity: &mut D) -> Result<()> {
        self.auditor.hide(user, entity)?;
        self.store.save_document(entity)?;
        Ok(())
    }
    pub fn show<D: Document + Historical>(&self, user: &User, entity: &mut D) -> Result<()> {
        self.auditor.show(user, entity)?;
        self.store.save_document(entity)?;
        Ok(())
    }

    // ------------- Keys -------------
    /// Adds a key to the end of a node's schema.
    pub fn create_key(&self, user: &User, node: &mut Node, mut key: Key) -> Result<Key> {
        self.key_type(&key)?;
        self.auditor.permit(user, &*node, false)?;
        if self.keys_of(node)?.iter().any(|k| k.name == key.name) {
            return Err(SlotbaseError::DuplicatePath(format!("{}/{}", node.name, key.name)));
        }
        key.position = node.keys.len();
        self.auditor.record(user, &mut key, false)?;
        let id = self.store.save_document(&mut key)?;
        node.keys.push(id);
        self.auditor.record(user, node, false)?;
        self.store.save_document(node)?;
        info!(node = %node.name, key = %key.name, id, "key created");
        Ok(key)
    }
    pub fn key(&self, id: Thing) -> Result<Key> {
        self.store.fetch(id)
    }
    /// The keys of a node in schema order.
    pub fn keys_of(&self, node: &Node) -> Result<Vec<Key>> {
        node.keys.iter().map(|id| self.key(*id)).collect()
    }
    pub fn key_by_name(&self, node: &Node, name: &str) -> Result<Key> {
        self.keys_of(node)?
            .into_iter()
            .find(|k| k.name == name)
            .ok_or_else(|| SlotbaseError::UnknownKey(format!("{}/{}", node.name, name)))
    }
    /// The node whose schema lists the key.
    pub fn key_owner(&self, key: Thing) -> Result<Option<Node>> {
        Ok(self
            .store
            .find::<Node>(&Filter::all())?
            .into_iter()
            .find(|n| n.keys.contains(&key)))
    }
    /// Moves a key to another position in its node's schema, renumbering the rest.
    pub fn move_key(&self, user: &User, node: &mut Node, key: Thing, index: usize) -> Result<()> {
        let from = node
            .keys
            .iter()
            .position(|k| *k == key)
            .ok_or_else(|| SlotbaseError::UnknownKey(format!("{}/#{}", node.name, key)))?;
        self.auditor.permit(user, &*node, false)?;
        node.keys.remove(from);
        let index = index.min(node.keys.len());
        node.keys.insert(index, key);
        for (position, id) in node.keys.clone().into_iter().enumerate() {
            let mut key = self.key(id)?;
            if key.position != position {
                key.position = position;
                self.auditor.record(user, &mut key, false)?;
                self.store.save_document(&mut key)?;
            }
        }
        self.auditor.record(user, node, false)?;
        self.store.save_document(node)?;
        Ok(())
    }

    // ------------- Slots -------------
    pub fn slot(&self, id: Thing) -> Result<Slot> {
        self.store.fetch(id)
    }
    /// The slots stored for a key at a row number. More than one means the
    /// per-key uniqueness of row numbers was broken from outside.
    pub fn slots_at(&self, key: Thing, row_num: u64) -> Result<Vec<Slot>> {
        self.store.find(&Filter::by("key", key).and("row_num", row_num))
    }
    /// Type validation followed by reference resolution.
    pub fn validate_value(&self, key: &Key, value: &Value) -> Result<()> {
        self.key_type(key)?.validate(value, key.size)?;
        if let Some(url) = value.as_str().filter(|_| referenced(value).is_some()) {
            self.resolve_reference(url)?;
        }
        Ok(())
    }
    /// Validates a slot's value against its key.
    pub fn validate_slot(&self, slot: &Slot) -> Result<()> {
        let key = self.key(slot.key)?;
        self.validate_value(&key, &slot.value)
    }
    pub fn resolve_reference(&self, url: &str) -> Result<Slot> {
        let target = referenced(&Value::from(url))
            .ok_or_else(|| SlotbaseError::BrokenReference(url.to_owned()))?;
        self.store
            .first::<Slot>(&Filter::identity(target))?
            .ok_or_else(|| SlotbaseError::BrokenReference(url.to_owned()))
    }
    /// Follows a reference one level, or returns the slot itself.
    pub fn resolve(&self, slot: &Slot) -> Result<Slot> {
        match slot.value.as_str() {
            Some(url) if referenced(&slot.value).is_some() => self.resolve_reference(url),
            _ => Ok(slot.clone()),
        }
    }
    /// Validates, prepares and saves a new slot at the first free row number
    /// at or above the one it asks for.
    pub fn save_slot(&self, user: &User, slot: &mut Slot) -> Result<Thing> {
        if slot.id.is_some() {
            self.update_slot(user, slot)?;
            return slot.id.ok_or(SlotbaseError::NotFound { kind: Slot::KIND, id: 0 });
        }
        self.auditor.authorize(user, &[SAVE_DOCUMENT])?;
        let key = self.key(slot.key)?;
        self.store_slot(&key, slot)
    }
    pub(crate) fn store_slot(&self, key: &Key, slot: &mut Slot) -> Result<Thing> {
        let key_id = key.identity()?;
        if slot.key != key_id {
            return Err(SlotbaseError::UnknownKey(format!("{} is not #{}", key.name, slot.key)));
        }
        let soft_type = self.key_type(key)?;
        self.validate_value(key, &slot.value)?;
        slot.value = soft_type.prepare(&slot.value)?;
        let latch = self.latch(key_id)?;
        let _guard = latch.lock()?;
        slot.row_num = self.probe(key_id, slot.row_num)?;
        let id = self.store.save_document(slot)?;
        debug!(key = %key.name, id, row_num = slot.row_num, "slot saved");
        Ok(id)
    }
    /// Replaces the value of an existing slot, keeping its row number.
    pub fn update_slot(&self, user: &User, slot: &mut Slot) -> Result<()> {
        let id = slot.id.ok_or(SlotbaseError::NotFound { kind: Slot::KIND, id: 0 })?;
        self.auditor.authorize(user, &[SAVE_DOCUMENT])?;
        let stored = self.slot(id)?;
        let key = self.key(stored.key)?;
        self.validate_value(&key, &slot.value)?;
        slot.value = self.key_type(&key)?.prepare(&slot.value)?;
        slot.key = stored.key;
        slot.row_num = stored.row_num;
        slot.row_id = stored.row_id;
        self.store.save_document(slot)?;
        Ok(())
    }
    fn latch(&self, key: Thing) -> Result<Arc<Mutex<()>>> {
        let mut latches = self.key_latches.lock()?;
        Ok(Arc::clone(latches.entry(key).or_default()))
    }
    fn probe(&self, key: Thing, requested: u64) -> Result<u64> {
        let taken: RoaringTreemap = self
            .store
            .project_documents::<Slot>("row_num", &Filter::by("key", key))?
            .iter()
            .filter_map(Value::as_u64)
            .collect();
        let mut row_num = requested;
        while taken.contains(row_num) {
            row_num += 1;
        }
        if row_num != requested {
            debug!(key, requested, row_num, "row number taken, probed forward");
        }
        Ok(row_num)
    }

    // ------------- Rows -------------
    /// One more than the highest row number used by any key of the node.
    pub fn row_count(&self, node: &Node) -> Result<u64> {
        let filter = Filter::all().within("key", node.keys.iter().copied());
        Ok(self
            .store
            .project_documents::<Slot>("row_num", &filter)?
            .iter()
            .filter_map(Value::as_u64)
            .map(|row_num| row_num + 1)
            .max()
            .unwrap_or(0))
    }
    fn scanned_rows(&self, node: &Node) -> Result<Vec<RowId>> {
        let mut slots = self
            .store
            .find::<Slot>(&Filter::all().within("key", node.keys.iter().copied()))?;
        slots.sort_by_key(|s| (s.row_num, s.id));
        let mut seen = HashSet::<RowId, OtherHasher>::default();
        Ok(slots
            .into_iter()
            .map(|s| s.row_id)
            .filter(|r| seen.insert(*r))
            .collect())
    }
    /// Rebuilds the node's row list from the slots of its keys.
    pub fn synchronize_rows(&self, node: &mut Node) -> Result<()> {
        let rows = self.scanned_rows(node)?;
        if rows != node.rows {
            info!(
                node = %node.name,
                before = node.rows.len(),
                after = rows.len(),
                "rows synchronized"
            );
        }
        node.rows = rows;
        self.store.save_document(node)?;
        Ok(())
    }
    /// Whether the stored row list agrees with the slots.
    pub fn verify_rows(&self, node: &Node) -> Result<bool> {
        let scanned = self.scanned_rows(node)?;
        let consistent = scanned == node.rows;
        if !consistent {
            warn!(
                node = %node.name,
                stored = node.rows.len(),
                scanned = scanned.len(),
                "row list out of sync"
            );
        }
        Ok(consistent)
    }
    /// Deletes every slot of the given rows and synchronizes the node.
    pub fn drop_rows(&self, user: &User, node: &mut Node, rows: &[RowId]) -> Result<usize> {
        self.auditor.permit(user, &*node, false)?;
        let deleted = self.store.delete_documents::<Slot>(
            &Filter::all()
                .within("key", node.keys.iter().copied())
                .within("row_id", rows.iter().copied()),
        )?;
        info!(node = %node.name, rows = rows.len(), deleted, "rows dropped");
        self.synchronize_rows(node)?;
        Ok(deleted)
    }
    pub(crate) fn persist_rows(&self, node: &mut Node) -> Result<Thing> {
        self.store.save_document(node)
    }
}
