//! The storage collaborator seen from the search side: get/put/getAll/delete by id.

use crate::error::StoreError;
use crate::Document;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

pub trait DocumentStore: Send + Sync {
    fn get_all(&self) -> Result<Vec<Document>, StoreError>;
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;
    /// Insert or overwrite by id.
    fn put(&self, doc: Document) -> Result<(), StoreError>;
    /// Returns whether a document was removed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Box<T> {
    fn get_all(&self) -> Result<Vec<Document>, StoreError> { (**self).get_all() }
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> { (**self).get(id) }
    fn put(&self, doc: Document) -> Result<(), StoreError> { (**self).put(doc) }
    fn delete(&self, id: &str) -> Result<bool, StoreError> { (**self).delete(id) }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get_all(&self) -> Result<Vec<Document>, StoreError> { (**self).get_all() }
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> { (**self).get(id) }
    fn put(&self, doc: Document) -> Result<(), StoreError> { (**self).put(doc) }
    fn delete(&self, id: &str) -> Result<bool, StoreError> { (**self).delete(id) }
}

fn require_id(doc: &Document) -> Result<(), StoreError> {
    if doc.has_valid_id() {
        Ok(())
    } else {
        Err(StoreError::MissingId { title: doc.title.clone() })
    }
}

/// In-memory store keeping insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seed with documents as-is, including ones without an id.
    pub fn from_documents(docs: Vec<Document>) -> Self { Self { docs: RwLock::new(docs) } }

    pub fn len(&self) -> usize { self.docs.read().len() }

    pub fn is_empty(&self) -> bool { self.docs.read().is_empty() }
}

impl DocumentStore for MemoryStore {
    fn get_all(&self) -> Result<Vec<Document>, StoreError> { Ok(self.docs.read().clone()) }

    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.docs.read().iter().find(|d| d.id == id).cloned())
    }

    fn put(&self, doc: Document) -> Result<(), StoreError> {
        require_id(&doc)?;
        let mut docs = self.docs.write();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(slot) => *slot = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }
}

/// sled-backed store; values are JSON documents keyed by id.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Document, StoreError> {
        serde_json::from_slice(value).map_err(|source| StoreError::Codec {
            id: String::from_utf8_lossy(key).into_owned(),
            source,
        })
    }
}

impl DocumentStore for SledStore {
    /// Oldest first, ties broken by id.
    fn get_all(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::with_capacity(self.db.len());
        for entry in self.db.iter() {
            let (key, value) = entry?;
            docs.push(Self::decode(&key, &value)?);
        }
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        match self.db.get(id.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(id.as_bytes(), &value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, doc: Document) -> Result<(), StoreError> {
        require_id(&doc)?;
        let bytes = serde_json::to_vec(&doc)
            .map_err(|source| StoreError::Codec { id: doc.id.clone(), source })?;
        self.db.insert(doc.id.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.db.remove(id.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(removed)
    }
}
