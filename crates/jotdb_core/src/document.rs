//! Documents: schema-less field maps addressed by id.

use jotdb_codec::{Fields, Value};

use crate::types::DocId;

/// A single document held by a [`Collection`](crate::Collection).
///
/// A document is an id plus an arbitrary map of named field values.
/// It carries no schema: two documents in the same collection may have
/// entirely different fields. Mutating a document only changes the
/// in-hand copy; call [`Collection::save`](crate::Collection::save) to
/// make the change visible to the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocId,
    fields: Fields,
}

impl Document {
    /// Ids are assigned by the collection, so assembly stays internal.
    pub(crate) fn new(id: DocId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Returns the document id.
    #[must_use]
    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// Returns all fields of the document.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Returns one field value, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Consumes the document, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_field_access() {
        let mut doc = Document::new(DocId::from("a"), Fields::new());
        doc.set("name", "Compl");
        doc.set("age", 37);

        assert_eq!(doc.get("name"), Some(&Value::from("Compl")));
        assert_eq!(doc.get("age"), Some(&Value::from(37)));
        assert_eq!(doc.get("missing"), None);

        assert_eq!(doc.remove("age"), Some(Value::from(37)));
        assert_eq!(doc.get("age"), None);
    }

    #[test]
    fn document_clone_is_independent() {
        let mut doc = Document::new(DocId::from("a"), Fields::new());
        doc.set("n", 1);
        let mut copy = doc.clone();
        copy.set("n", 2);

        assert_eq!(doc.get("n"), Some(&Value::from(1)));
        assert_eq!(copy.get("n"), Some(&Value::from(2)));
    }
}
