//! Slotbase – a schema-flexible tabular store.
//!
//! Data lives in *nodes* (tables) whose columns are *keys*. Every cell is
//! a separately stored *slot* holding the value of one key at one row number:
//! * A [`construct::Node`] has an ordered list of keys and the identities of its logical rows.
//! * A [`construct::Key`] names a soft type and the maximum serialized size of its values.
//! * A [`construct::Slot`] holds a value, the row number it was stored at, and the
//!   [`construct::RowId`] shared with the other cells of its row.
//!
//! Row numbers are per key. A slot asking for row number `n` is stored at the
//! first row number at or above `n` not yet used by its key, so cells of one
//! logical row may end up at different row numbers in different keys.
//!
//! ## Modules
//! * [`construct`] – Entities and the [`construct::Database`] tying them together:
//!   type resolution, slot probing, references and row synchronization.
//! * [`datatype`] – The [`datatype::SoftType`] trait, mimetype dispatch and the built-in
//!   local types (STRING, INTEGER, FLOAT, DECIMAL, BOOLEAN, COLOR, IMAGE, REFERENCE).
//! * [`remote`] – Types validated and rendered by HTTP endpoints.
//! * [`insert`] – Batch insertion with give-up, rollback and swallow error policies.
//! * [`select`] – Windowed reads in four output shapes.
//! * [`audit`] – Users, capabilities and the action history of auditable entities.
//! * [`persist`] – Documents in SQLite, behind the [`persist::Store`] trait.
//! * [`settings`] – File and environment configuration.
//! * [`server`] – The local registry served over the remote type protocol.
//!
//! ## References
//! A string value of the form `slot://<identity>` refers to another slot. It is
//! checked when saved and rendered through the type of the slot it points at.
//!
//! ## Quick Start
//! ```
//! use slotbase::audit::{Group, User};
//! use slotbase::construct::{Database, Key, Node};
//! use slotbase::insert::{Cell, Inserter};
//! use slotbase::persist::PersistenceMode;
//! use slotbase::select::Selector;
//! let db = Database::new(PersistenceMode::InMemory).unwrap();
//! let admin = User::new("admin", vec![Group::new("admin", Vec::<String>::new())]);
//! let mut node = db.create_node(&admin, Node::new("people")).unwrap();
//! db.create_key(&admin, &mut node, Key::new("name", "STRING", 40)).unwrap();
//! let attempts = Inserter::new(&db)
//!     .insert(&admin, &mut node, vec![vec![Cell::new("name", "Alice")]])
//!     .unwrap();
//! assert_eq!(attempts, 1);
//! let projection = Selector::new(&db).select(&node).unwrap();
//! assert_eq!(projection.rows.len(), 1);
//! ```

pub mod audit;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod insert;
pub mod persist;
pub mod remote;
pub mod select;
pub mod server;
pub mod settings;

pub use error::{Result, SlotbaseError};
