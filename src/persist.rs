//! Document persistence on SQLite.
//!
//! Every entity is stored as a JSON document in a single `Document` table,
//! partitioned by kind. Filters are evaluated with SQLite's JSON functions,
//! which keeps the store ignorant of the entities it holds.

use std::sync::Mutex;

// used for persistence
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::construct::Thing;
use crate::error::{Result, SlotbaseError};

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Filters -------------
#[derive(Debug, Clone)]
enum Condition {
    Identity(Thing),
    Equals(&'static str, Value),
    Within(&'static str, Vec<Value>),
}

/// A conjunction of conditions on documents of one kind.
///
/// Field names are always static identifiers chosen by this crate; values
/// are bound as parameters.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}
impl Filter {
    pub fn all() -> Self {
        Self::default()
    }
    pub fn identity(id: Thing) -> Self {
        Self {
            conditions: vec![Condition::Identity(id)],
        }
    }
    pub fn by(field: &'static str, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }
    pub fn and(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals(field, value.into()));
        self
    }
    pub fn within<I, V>(mut self, field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::Within(
            field,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }
    fn clause(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut bound = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::Identity(id) => {
                    sql += " and Document_Identity = ?";
                    bound.push(SqlValue::Integer(*id as i64));
                }
                Condition::Equals(field, value) => {
                    sql += &format!(" and json_extract(Body, '$.{}') = ?", field);
                    bound.push(sql_value(value));
                }
                Condition::Within(_, values) if values.is_empty() => {
                    sql += " and 0";
                }
                Condition::Within(field, values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    sql += &format!(" and json_extract(Body, '$.{}') in ({})", field, marks);
                    bound.extend(values.iter().map(sql_value));
                }
            }
        }
        (sql, bound)
    }
}

// json_extract yields integers for booleans and plain text for strings,
// so parameters are bound the same way
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => SqlValue::Integer(i),
            (None, Some(u), _) => SqlValue::Integer(u as i64),
            (_, _, Some(f)) => SqlValue::Real(f),
            _ => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ------------- Store -------------
/// The persistence collaborator consumed by the data engine.
pub trait Store: Send + Sync {
    /// Inserts a document when `id` is `None`, otherwise replaces it. Returns its identity.
    fn save(&self, kind: &str, id: Option<Thing>, body: &Value) -> Result<Thing>;
    /// Matching documents in identity order.
    fn query(&self, kind: &str, filter: &Filter) -> Result<Vec<(Thing, Value)>>;
    fn count(&self, kind: &str, filter: &Filter) -> Result<usize>;
    /// One field of every matching document, skipping documents without it.
    fn project(&self, kind: &str, field: &'static str, filter: &Filter) -> Result<Vec<Value>>;
    /// Returns the number of deleted documents.
    fn delete(&self, kind: &str, filter: &Filter) -> Result<usize>;
}

/// An entity that can be kept in a [`Store`].
pub trait Document: Serialize + DeserializeOwned {
    const KIND: &'static str;
    fn id(&self) -> Option<Thing>;
    fn set_id(&mut self, id: Thing);
}

/// Typed access on top of the untyped [`Store`] contract.
pub trait StoreExt: Store {
    fn save_document<D: Document>(&self, document: &mut D) -> Result<Thing> {
        let body = serde_json::to_value(&*document)?;
        let id = self.save(D::KIND, document.id(), &body)?;
        document.set_id(id);
        Ok(id)
    }
    fn find<D: Document>(&self, filter: &Filter) -> Result<Vec<D>> {
        self.query(D::KIND, filter)?
            .into_iter()
            .map(|(id, body)| {
                let mut document: D = serde_json::from_value(body)?;
                document.set_id(id);
                Ok(document)
            })
            .collect()
    }
    fn first<D: Document>(&self, filter: &Filter) -> Result<Option<D>> {
        Ok(self.find::<D>(filter)?.into_iter().next())
    }
    fn fetch<D: Document>(&self, id: Thing) -> Result<D> {
        self.first::<D>(&Filter::identity(id))?
            .ok_or(SlotbaseError::NotFound { kind: D::KIND, id })
    }
    fn count_documents<D: Document>(&self, filter: &Filter) -> Result<usize> {
        self.count(D::KIND, filter)
    }
    fn project_documents<D>(&self, field: &'static str, filter: &Filter) -> Result<Vec<Value>>
    where
        D: Document,
    {
        self.project(D::KIND, field, filter)
    }
    fn delete_documents<D: Document>(&self, filter: &Filter) -> Result<usize> {
        self.delete(D::KIND, filter)
    }
}
impl<S: Store + ?Sized> StoreExt for S {}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Mutex<Connection>,
}
impl Persistor {
    pub fn new(mode: &PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists Document (
                Document_Identity integer not null,
                Kind text not null,
                Body text not null,
                constraint referenceable_Document_Identity primary key (
                    Document_Identity
                )
            );-- STRICT;
            create index if not exists Document_by_Kind on Document (
                Kind
            );
            ",
        )?;
        info!(?mode, "persistor ready");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}
impl Store for Persistor {
    fn save(&self, kind: &str, id: Option<Thing>, body: &Value) -> Result<Thing> {
        let connection = self.connection.lock()?;
        let body = body.to_string();
        match id {
            Some(id) => {
                connection
                    .prepare_cached(
                        "
                    insert into Document (
                        Document_Identity,
                        Kind,
                        Body
                    ) values (?, ?, ?)
                    on conflict (Document_Identity) do update set Body = excluded.Body
                ",
                    )?
                    .execute(params![id as i64, kind, body])?;
                Ok(id)
            }
            None => {
                connection
                    .prepare_cached(
                        "
                    insert into Document (
                        Kind,
                        Body
                    ) values (?, ?)
                ",
                    )?
                    .execute(params![kind, body])?;
                Ok(connection.last_insert_rowid() as Thing)
            }
        }
    }
    fn query(&self, kind: &str, filter: &Filter) -> Result<Vec<(Thing, Value)>> {
        let (clause, mut bound) = filter.clause();
        bound.insert(0, SqlValue::Text(kind.to_owned()));
        let sql = format!(
            "select Document_Identity, Body from Document where Kind = ?{} order by Document_Identity",
            clause
        );
        debug!(%sql, "query");
        let connection = self.connection.lock()?;
        let mut statement = connection.prepare_cached(&sql)?;
        let mut rows = statement.query(params_from_iter(bound))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let body: String = row.get(1)?;
            documents.push((id as Thing, serde_json::from_str(&body)?));
        }
        Ok(documents)
    }
    fn count(&self, kind: &str, filter: &Filter) -> Result<usize> {
        let (clause, mut bound) = filter.clause();
        bound.insert(0, SqlValue::Text(kind.to_owned()));
        let sql = format!("select count(*) from Document where Kind = ?{}", clause);
        let connection = self.connection.lock()?;
        let count: Option<i64> = connection
            .prepare_cached(&sql)?
            .query_row(params_from_iter(bound), |r| r.get(0))
            .optional()?;
        Ok(count.unwrap_or(0) as usize)
    }
    fn project(&self, kind: &str, field: &'static str, filter: &Filter) -> Result<Vec<Value>> {
        let (clause, mut bound) = filter.clause();
        bound.insert(0, SqlValue::Text(kind.to_owned()));
        let sql = format!(
            "
            select json_extract(Body, '$.{0}')
              from Document
             where Kind = ?{1}
               and json_extract(Body, '$.{0}') is not null
             order by Document_Identity
            ",
            field, clause
        );
        debug!(%sql, "project");
        let connection = self.connection.lock()?;
        let mut statement = connection.prepare_cached(&sql)?;
        let mut rows = statement.query(params_from_iter(bound))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(match row.get::<_, SqlValue>(0)? {
                SqlValue::Integer(i) => Value::from(i),
                SqlValue::Real(f) => Value::from(f),
                SqlValue::Text(t) => Value::from(t),
                SqlValue::Null | SqlValue::Blob(_) => Value::Null,
            });
        }
        Ok(values)
    }
    fn delete(&self, kind: &str, filter: &Filter) -> Result<usize> {
        let (clause, mut bound) = filter.clause();
        bound.insert(0, SqlValue::Text(kind.to_owned()));
        let sql = format!("delete from Document where Kind = ?{}", clause);
        debug!(%sql, "delete");
        let connection = self.connection.lock()?;
        let deleted = connection
            .prepare_cached(&sql)?
            .execute(params_from_iter(bound))?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_on_document_fields() {
        let persistor = Persistor::new(&PersistenceMode::InMemory).unwrap();
        let a = persistor.save("Slot", None, &json!({"key": 1, "row_num": 0})).unwrap();
        persistor.save("Slot", None, &json!({"key": 1, "row_num": 1})).unwrap();
        persistor.save("Slot", None, &json!({"key": 2, "row_num": 0})).unwrap();
        persistor.save("Key", None, &json!({"key": 1})).unwrap();

        assert_eq!(persistor.count("Slot", &Filter::by("key", 1)).unwrap(), 2);
        assert_eq!(persistor.count("Slot", &Filter::all()).unwrap(), 3);
        let found = persistor
            .query("Slot", &Filter::by("key", 1).and("row_num", 0))
            .unwrap();
        assert_eq!(found, vec![(a, json!({"key": 1, "row_num": 0}))]);
        assert_eq!(
            persistor
                .count("Slot", &Filter::all().within("key", Vec::<Value>::new()))
                .unwrap(),
            0
        );
        assert_eq!(persistor.delete("Slot", &Filter::all().within("key", [1, 2])).unwrap(), 3);
        assert_eq!(persistor.count("Key", &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn save_with_identity_replaces() {
        let persistor = Persistor::new(&PersistenceMode::InMemory).unwrap();
        let id = persistor.save("Node", None, &json!({"name": "a"})).unwrap();
        persistor.save("Node", Some(id), &json!({"name": "b"})).unwrap();
        let found = persistor.query("Node", &Filter::identity(id)).unwrap();
        assert_eq!(found, vec![(id, json!({"name": "b"}))]);
    }

    #[test]
    fn projects_a_single_field() {
        let persistor = Persistor::new(&PersistenceMode::InMemory).unwrap();
        persistor.save("Slot", None, &json!({"key": 1, "row_num": 4, "value": "x"})).unwrap();
        persistor.save("Slot", None, &json!({"key": 1, "row_num": 0})).unwrap();
        persistor.save("Slot", None, &json!({"key": 2, "row_num": 9})).unwrap();
        persistor.save("Slot", None, &json!({"key": 1})).unwrap();
        assert_eq!(
            persistor.project("Slot", "row_num", &Filter::by("key", 1)).unwrap(),
            vec![json!(4), json!(0)]
        );
        assert_eq!(
            persistor.project("Slot", "value", &Filter::all()).unwrap(),
            vec![json!("x")]
        );
    }
}
