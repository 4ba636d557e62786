use crate::document::{Document, Value};
use crate::error::{Error, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};

pub const USERS: &str = "users";
pub const FRIENDS: &str = "friends";
pub const MOVIE_LISTS: &str = "movieLists";

/// Filter applied by [`DocumentStore::query`].
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String, Value),
    /// Inclusive on both ends.
    Range {
        field: String,
        lower: Value,
        upper: Value,
    },
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.to_owned(), value.into())
    }

    pub fn range(field: &str, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Predicate::Range {
            field: field.to_owned(),
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Predicate::Eq(field, value) => doc.get(field) == Some(value),
            Predicate::Range {
                field,
                lower,
                upper,
            } => match doc.get(field) {
                Some(v) => {
                    matches!(v.compare(lower), Some(Greater) | Some(Equal))
                        && matches!(v.compare(upper), Some(Less) | Some(Equal))
                }
                None => false,
            },
        }
    }
}

/// Collections of schemaless documents addressed by slash separated paths,
/// e.g. `movieLists` or `movieLists/<id>/movies`.
pub trait DocumentStore {
    fn read_collection(&self, path: &str) -> Result<Vec<(String, Document)>>;
    fn read_document(&self, path: &str, id: &str) -> Result<Option<Document>>;
    fn query(&self, path: &str, predicates: &[Predicate]) -> Result<Vec<(String, Document)>>;
    fn create(&self, path: &str, data: Document) -> Result<String>;
    /// Writes the given fields, keeping every other field of an existing
    /// document. Creates the document if needed.
    fn upsert_merge(&self, path: &str, id: &str, data: Document) -> Result<()>;
    /// Like `upsert_merge` but fails with `NotFound` if the document is absent.
    fn update(&self, path: &str, id: &str, patch: Document) -> Result<()>;
    /// Deleting an absent document is not an error.
    fn delete(&self, path: &str, id: &str) -> Result<()>;
    fn array_union(&self, path: &str, id: &str, field: &str, value: Value) -> Result<()>;
    fn array_remove(&self, path: &str, id: &str, field: &str, value: Value) -> Result<()>;
    /// Removes a whole collection. Dropping an absent collection is not an
    /// error.
    fn delete_collection(&self, path: &str) -> Result<()>;
}

fn serialize_doc(doc: &Document) -> bincode::Result<Vec<u8>> {
    bincode::serialize(doc)
}

fn deserialize_doc<V: AsRef<[u8]>>(bytes: V) -> bincode::Result<Document> {
    bincode::deserialize(bytes.as_ref())
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> String {
    String::from_utf8_lossy(id.as_ref()).into_owned()
}

#[derive(Debug)]
enum Abort {
    Missing,
    Codec(bincode::Error),
}

fn codec_abort(err: bincode::Error) -> ConflictableTransactionError<Abort> {
    ConflictableTransactionError::Abort(Abort::Codec(err))
}

trait TreeExt {
    /// Looks a collection up without creating it.
    fn existing_tree(&self, path: &str) -> Result<Option<sled::Tree>>;
    fn modify<F>(&self, path: &str, id: &str, upsert: bool, f: F) -> Result<()>
    where
        F: Fn(&mut Document);
}

impl TreeExt for sled::Db {
    fn existing_tree(&self, path: &str) -> Result<Option<sled::Tree>> {
        let exists = self
            .tree_names()
            .iter()
            .any(|name| &name[..] == path.as_bytes());
        if exists {
            Ok(Some(self.open_tree(path)?))
        } else {
            Ok(None)
        }
    }

    /// Read-modify-write of a single document inside a sled transaction.
    fn modify<F>(&self, path: &str, id: &str, upsert: bool, f: F) -> Result<()>
    where
        F: Fn(&mut Document),
    {
        let tree = if upsert {
            self.open_tree(path)?
        } else {
            match self.existing_tree(path)? {
                Some(tree) => tree,
                None => return Err(Error::not_found("document", format!("{}/{}", path, id))),
            }
        };
        let result = tree.transaction(|tree| {
            let mut doc = match tree.get(id.as_bytes())? {
                Some(bytes) => deserialize_doc(&bytes).map_err(codec_abort)?,
                None if upsert => Document::new(),
                None => return Err(ConflictableTransactionError::Abort(Abort::Missing)),
            };
            f(&mut doc);
            tree.insert(id.as_bytes(), serialize_doc(&doc).map_err(codec_abort)?)?;
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(Abort::Missing)) => {
                Err(Error::not_found("document", format!("{}/{}", path, id)))
            }
            Err(TransactionError::Abort(Abort::Codec(err))) => Err(err.into()),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}

impl DocumentStore for sled::Db {
    fn read_collection(&self, path: &str) -> Result<Vec<(String, Document)>> {
        self.query(path, &[])
    }

    fn read_document(&self, path: &str, id: &str) -> Result<Option<Document>> {
        let tree = match self.existing_tree(path)? {
            Some(tree) => tree,
            None => return Ok(None),
        };
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize_doc(&bytes)?)),
            None => Ok(None),
        }
    }

    fn query(&self, path: &str, predicates: &[Predicate]) -> Result<Vec<(String, Document)>> {
        let tree = match self.existing_tree(path)? {
            Some(tree) => tree,
            None => return Ok(Vec::new()),
        };
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (id, bytes) = entry?;
            let doc = deserialize_doc(&bytes)?;
            if predicates.iter().all(|p| p.matches(&doc)) {
                docs.push((deserialize_id(id), doc));
            }
        }
        Ok(docs)
    }

    fn create(&self, path: &str, data: Document) -> Result<String> {
        let tree = self.open_tree(path)?;
        let id = format!("{:016x}", self.generate_id()?);
        tree.insert(id.as_bytes(), serialize_doc(&data)?)?;
        Ok(id)
    }

    fn upsert_merge(&self, path: &str, id: &str, data: Document) -> Result<()> {
        self.modify(path, id, true, |doc| {
            doc.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())))
        })
    }

    fn update(&self, path: &str, id: &str, patch: Document) -> Result<()> {
        self.modify(path, id, false, |doc| {
            doc.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())))
        })
    }

    fn delete(&self, path: &str, id: &str) -> Result<()> {
        if let Some(tree) = self.existing_tree(path)? {
            tree.remove(id.as_bytes())?;
        }
        Ok(())
    }

    fn delete_collection(&self, path: &str) -> Result<()> {
        self.drop_tree(path)?;
        Ok(())
    }

    fn array_union(&self, path: &str, id: &str, field: &str, value: Value) -> Result<()> {
        self.modify(path, id, false, |doc| {
            let mut values = doc
                .get(field)
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .unwrap_or_default();
            if !values.contains(&value) {
                values.push(value.clone());
            }
            doc.insert(field.to_owned(), Value::Array(values));
        })
    }

    fn array_remove(&self, path: &str, id: &str, field: &str, value: Value) -> Result<()> {
        self.modify(path, id, false, |doc| {
            let values: Vec<Value> = doc
                .get(field)
                .and_then(Value::as_array)
                .map(|values| values.iter().filter(|v| **v != value).cloned().collect())
                .unwrap_or_default();
            doc.insert(field.to_owned(), Value::Array(values));
        })
    }
}
