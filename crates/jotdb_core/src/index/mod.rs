//! Secondary ordered indices over a collection's documents.
//!
//! An index derives one key per document through a caller-supplied
//! keyer closure and keeps the keyed documents in an ordered tree.
//! Several documents may share a key; within one key they stay in
//! insertion order. Documents whose keyer yields nothing are either
//! dropped from the index or, when configured, kept in a separate
//! unkeyed list.
//!
//! Indices are registered on a collection through [`IndexSpec`] and
//! queried through [`IndexQuery`](crate::IndexQuery); this module owns
//! the tree bookkeeping.

mod bounds;
mod order;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

pub use bounds::{Bounds, KeyBounds};
pub use order::default_compare;

use jotdb_codec::{Fields, Value};

use crate::error::{CoreError, CoreResult};
use crate::types::DocId;

/// Derives the index key for a document, or `None` to leave the
/// document out of the keyed tree.
pub type Keyer = Arc<dyn Fn(&Fields) -> Option<Value> + Send + Sync>;

/// Orders two index keys.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Description of one index: its name, how to key documents, and how
/// to order the keys.
///
/// ```
/// use jotdb_core::IndexSpec;
///
/// // index `age` over the numeric field "age", rejecting duplicates
/// let spec = IndexSpec::field("age", "age").unique();
/// assert_eq!(spec.name(), "age");
/// ```
#[derive(Clone)]
pub struct IndexSpec {
    name: String,
    keyer: Keyer,
    comparator: Comparator,
    unique: bool,
    retain_unkeyed: bool,
}

impl IndexSpec {
    /// Creates a spec with a custom keyer and the default ordering.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        keyer: impl Fn(&Fields) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            keyer: Arc::new(keyer),
            comparator: Arc::new(default_compare),
            unique: false,
            retain_unkeyed: false,
        }
    }

    /// Creates a spec keyed by one top-level field.
    #[must_use]
    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(name, move |fields: &Fields| fields.get(&field).cloned())
    }

    /// Rejects documents whose key is already present.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Keeps documents without a key in a separate unkeyed list
    /// instead of dropping them from the index.
    #[must_use]
    pub fn retain_unkeyed(mut self) -> Self {
        self.retain_unkeyed = true;
        self
    }

    /// Replaces the default key ordering.
    #[must_use]
    pub fn comparator(
        mut self,
        comparator: impl Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSpec")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("retain_unkeyed", &self.retain_unkeyed)
            .finish_non_exhaustive()
    }
}

/// Tree key that orders itself through the index comparator.
struct TreeKey {
    value: Value,
    cmp: Comparator,
}

impl PartialEq for TreeKey {
    fn eq(&self, other: &Self) -> bool {
        (self.cmp)(&self.value, &other.value) == Ordering::Equal
    }
}

impl Eq for TreeKey {}

impl PartialOrd for TreeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.cmp)(&self.value, &other.value)
    }
}

/// One secondary index: ordered tree of keyed ids, reverse key map,
/// and optionally the unkeyed ids.
///
/// Mutations follow a validate-then-apply discipline: callers run
/// [`check_add`](Index::check_add) or [`check_save`](Index::check_save)
/// first, so the apply methods themselves cannot fail.
pub(crate) struct Index {
    name: String,
    keyer: Keyer,
    cmp: Comparator,
    unique: bool,
    tree: BTreeMap<TreeKey, Vec<DocId>>,
    last_keys: HashMap<DocId, Value>,
    unkeyed: Option<Vec<DocId>>,
}

impl Index {
    pub(crate) fn from_spec(spec: IndexSpec) -> Self {
        Self {
            name: spec.name,
            keyer: spec.keyer,
            cmp: spec.comparator,
            unique: spec.unique,
            tree: BTreeMap::new(),
            last_keys: HashMap::new(),
            unkeyed: spec.retain_unkeyed.then(Vec::new),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The key this index derives for `fields`. A `null` key counts
    /// as no key.
    pub(crate) fn key_for(&self, fields: &Fields) -> Option<Value> {
        (self.keyer)(fields).filter(|key| !key.is_null())
    }

    fn probe(&self, value: Value) -> TreeKey {
        TreeKey {
            value,
            cmp: Arc::clone(&self.cmp),
        }
    }

    /// Rejects a new document whose key would land in an occupied
    /// unique slot.
    pub(crate) fn check_add(&self, fields: &Fields) -> CoreResult<()> {
        if !self.unique {
            return Ok(());
        }
        if let Some(key) = self.key_for(fields) {
            let occupied = self
                .tree
                .get(&self.probe(key.clone()))
                .is_some_and(|ids| !ids.is_empty());
            if occupied {
                return Err(CoreError::unique_violation(&self.name, key.to_json_text()));
            }
        }
        Ok(())
    }

    /// Rejects an update that would move `id` onto a unique key held
    /// by a different document.
    pub(crate) fn check_save(&self, id: &DocId, fields: &Fields) -> CoreResult<()> {
        if !self.unique {
            return Ok(());
        }
        if let Some(key) = self.key_for(fields) {
            let taken = self
                .tree
                .get(&self.probe(key.clone()))
                .is_some_and(|ids| ids.iter().any(|held| held != id));
            if taken {
                return Err(CoreError::unique_violation(&self.name, key.to_json_text()));
            }
        }
        Ok(())
    }

    /// Indexes a document not seen before. Run `check_add` first.
    pub(crate) fn add(&mut self, id: &DocId, fields: &Fields) {
        match self.key_for(fields) {
            Some(key) => self.insert_key(id, key),
            None => self.push_unkeyed(id),
        }
    }

    /// Re-keys a known document after its fields changed. Run
    /// `check_save` first.
    pub(crate) fn update(&mut self, id: &DocId, fields: &Fields) {
        let new_key = self.key_for(fields);
        let old_key = self.last_keys.get(id).cloned();
        match (old_key, new_key) {
            (Some(old), Some(new)) => {
                // an equivalent key keeps its stored form and position
                if (self.cmp)(&old, &new) == Ordering::Equal {
                    return;
                }
                self.remove_key(id, &old);
                self.insert_key(id, new);
            }
            (Some(old), None) => {
                self.remove_key(id, &old);
                self.last_keys.remove(id);
                self.push_unkeyed(id);
            }
            (None, Some(new)) => {
                self.pull_unkeyed(id);
                self.insert_key(id, new);
            }
            (None, None) => {
                self.push_unkeyed(id);
            }
        }
    }

    /// Drops a document from the index.
    pub(crate) fn delete(&mut self, id: &DocId) {
        match self.last_keys.remove(id) {
            Some(key) => self.remove_key(id, &key),
            None => self.pull_unkeyed(id),
        }
    }

    fn insert_key(&mut self, id: &DocId, key: Value) {
        self.last_keys.insert(id.clone(), key.clone());
        let probe = self.probe(key);
        self.tree.entry(probe).or_default().push(id.clone());
    }

    fn remove_key(&mut self, id: &DocId, key: &Value) {
        let probe = self.probe(key.clone());
        if let Some(ids) = self.tree.get_mut(&probe) {
            ids.retain(|held| held != id);
            if ids.is_empty() {
                self.tree.remove(&probe);
            }
        }
    }

    fn push_unkeyed(&mut self, id: &DocId) {
        if let Some(list) = &mut self.unkeyed {
            if !list.contains(id) {
                list.push(id.clone());
            }
        }
    }

    fn pull_unkeyed(&mut self, id: &DocId) {
        if let Some(list) = &mut self.unkeyed {
            list.retain(|held| held != id);
        }
    }

    /// Ids whose key is equivalent to `key`, in insertion order.
    pub(crate) fn search_by_key(&self, key: &Value) -> Vec<DocId> {
        self.tree
            .get(&self.probe(key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Like `search_by_key`, but the key is derived from an example
    /// document. An example without a key matches nothing.
    pub(crate) fn search(&self, example: &Fields) -> Vec<DocId> {
        match self.key_for(example) {
            Some(key) => self.search_by_key(&key),
            None => Vec::new(),
        }
    }

    /// Ids whose key falls inside `bounds`, in key order.
    pub(crate) fn between_key_bounds(&self, bounds: &KeyBounds) -> Vec<DocId> {
        let lower = Self::merge_lower(&self.cmp, bounds.gt.as_ref(), bounds.gte.as_ref());
        let upper = Self::merge_upper(&self.cmp, bounds.lt.as_ref(), bounds.lte.as_ref());

        // BTreeMap::range panics on an inverted or doubly-exclusive
        // degenerate range, so resolve those to an empty result first.
        if let (Some(low), Some(high)) = (edge(&lower), edge(&upper)) {
            match (self.cmp)(low, high) {
                Ordering::Greater => return Vec::new(),
                Ordering::Equal => {
                    let closed = matches!(lower, Bound::Included(_))
                        && matches!(upper, Bound::Included(_));
                    if !closed {
                        return Vec::new();
                    }
                }
                Ordering::Less => {}
            }
        }

        let lower = self.tree_bound(lower);
        let upper = self.tree_bound(upper);
        self.tree
            .range((lower, upper))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Like `between_key_bounds`, but each limit is an example
    /// document and the index keyer extracts the key. Limits whose
    /// example has no key are dropped.
    pub(crate) fn between_bounds(&self, bounds: Bounds<Fields>) -> Vec<DocId> {
        let keyed = bounds.filter_map(|example| self.key_for(&example));
        self.between_key_bounds(&keyed)
    }

    /// Ids retained without a key, in insertion order. Empty unless
    /// the index was configured to retain them.
    pub(crate) fn unkeyed_ids(&self) -> Vec<DocId> {
        self.unkeyed.clone().unwrap_or_default()
    }

    fn merge_lower<'a>(
        cmp: &Comparator,
        gt: Option<&'a Value>,
        gte: Option<&'a Value>,
    ) -> Bound<&'a Value> {
        match (gt, gte) {
            (Some(gt), Some(gte)) => {
                // the stricter limit wins; the exclusive one on a tie
                if cmp(gte, gt) == Ordering::Greater {
                    Bound::Included(gte)
                } else {
                    Bound::Excluded(gt)
                }
            }
            (Some(gt), None) => Bound::Excluded(gt),
            (None, Some(gte)) => Bound::Included(gte),
            (None, None) => Bound::Unbounded,
        }
    }

    fn merge_upper<'a>(
        cmp: &Comparator,
        lt: Option<&'a Value>,
        lte: Option<&'a Value>,
    ) -> Bound<&'a Value> {
        match (lt, lte) {
            (Some(lt), Some(lte)) => {
                if cmp(lte, lt) == Ordering::Less {
                    Bound::Included(lte)
                } else {
                    Bound::Excluded(lt)
                }
            }
            (Some(lt), None) => Bound::Excluded(lt),
            (None, Some(lte)) => Bound::Included(lte),
            (None, None) => Bound::Unbounded,
        }
    }

    fn tree_bound(&self, bound: Bound<&Value>) -> Bound<TreeKey> {
        match bound {
            Bound::Included(value) => Bound::Included(self.probe(value.clone())),
            Bound::Excluded(value) => Bound::Excluded(self.probe(value.clone())),
            Bound::Unbounded => Bound::Unbounded,
        }
    }

    #[cfg(test)]
    fn ordered_ids(&self) -> Vec<DocId> {
        self.tree
            .values()
            .flat_map(|ids| ids.iter().cloned())
            .collect()
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("keys", &self.tree.len())
            .field("docs", &self.last_keys.len())
            .finish_non_exhaustive()
    }
}

fn edge<'a>(bound: &Bound<&'a Value>) -> Option<&'a Value> {
    match bound {
        Bound::Included(value) | Bound::Excluded(value) => Some(value),
        Bound::Unbounded => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, age: f64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from(name));
        fields.insert("age".into(), Value::from(age));
        fields
    }

    fn age_index() -> Index {
        Index::from_spec(IndexSpec::field("age", "age"))
    }

    fn checked_add(index: &mut Index, id: &str, fields: &Fields) -> CoreResult<()> {
        index.check_add(fields)?;
        index.add(&DocId::from(id), fields);
        Ok(())
    }

    #[test]
    fn search_by_key_finds_documents() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("Compl", 37.0)).unwrap();
        checked_add(&mut index, "b", &person("Ting", 25.0)).unwrap();

        assert_eq!(index.search_by_key(&Value::from(37)), vec![DocId::from("a")]);
        assert!(index.search_by_key(&Value::from(99)).is_empty());
    }

    #[test]
    fn search_takes_an_example_document() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 20.0)).unwrap();
        checked_add(&mut index, "b", &person("y", 30.0)).unwrap();

        assert_eq!(index.search(&person("probe", 30.0)), vec![DocId::from("b")]);
        assert!(index.search(&Fields::new()).is_empty());
    }

    #[test]
    fn equivalent_keys_share_a_slot_in_insertion_order() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 30.0)).unwrap();
        let mut by_text = person("y", 0.0);
        by_text.insert("age".into(), Value::from("30"));
        checked_add(&mut index, "b", &by_text).unwrap();
        checked_add(&mut index, "c", &person("z", 30.0)).unwrap();

        assert_eq!(
            index.search_by_key(&Value::from(30)),
            vec![DocId::from("a"), DocId::from("b"), DocId::from("c")]
        );
    }

    #[test]
    fn unique_index_rejects_duplicate_key() {
        let mut index = Index::from_spec(IndexSpec::field("email", "email").unique());
        let mut fields = Fields::new();
        fields.insert("email".into(), Value::from("a@b.c"));
        checked_add(&mut index, "a", &fields).unwrap();

        let err = index.check_add(&fields).unwrap_err();
        assert!(err.is_unique_violation());

        // the same key is fine for the document that already holds it
        index.check_save(&DocId::from("a"), &fields).unwrap();
        let err = index.check_save(&DocId::from("b"), &fields).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn update_moves_document_between_keys() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 20.0)).unwrap();

        index.update(&DocId::from("a"), &person("x", 40.0));
        assert!(index.search_by_key(&Value::from(20)).is_empty());
        assert_eq!(index.search_by_key(&Value::from(40)), vec![DocId::from("a")]);
    }

    #[test]
    fn update_with_equivalent_key_keeps_position() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 30.0)).unwrap();
        checked_add(&mut index, "b", &person("y", 30.0)).unwrap();

        // "30" compares equal to 30, so a keeps its slot position
        let mut renumbered = person("x", 0.0);
        renumbered.insert("age".into(), Value::from("30"));
        index.update(&DocId::from("a"), &renumbered);

        assert_eq!(
            index.search_by_key(&Value::from(30)),
            vec![DocId::from("a"), DocId::from("b")]
        );
    }

    #[test]
    fn delete_removes_document() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 20.0)).unwrap();
        checked_add(&mut index, "b", &person("y", 20.0)).unwrap();

        index.delete(&DocId::from("a"));
        assert_eq!(index.search_by_key(&Value::from(20)), vec![DocId::from("b")]);

        index.delete(&DocId::from("b"));
        assert!(index.search_by_key(&Value::from(20)).is_empty());
        assert!(index.ordered_ids().is_empty());
    }

    #[test]
    fn unkeyed_documents_are_dropped_by_default() {
        let mut index = age_index();
        checked_add(&mut index, "a", &Fields::new()).unwrap();

        assert!(index.ordered_ids().is_empty());
        assert!(index.unkeyed_ids().is_empty());
    }

    #[test]
    fn unkeyed_documents_can_be_retained() {
        let mut index = Index::from_spec(IndexSpec::field("age", "age").retain_unkeyed());
        checked_add(&mut index, "a", &Fields::new()).unwrap();
        checked_add(&mut index, "b", &person("x", 9.0)).unwrap();

        assert_eq!(index.unkeyed_ids(), vec![DocId::from("a")]);

        // gaining a key moves the document out of the unkeyed list
        index.update(&DocId::from("a"), &person("a", 5.0));
        assert!(index.unkeyed_ids().is_empty());
        assert_eq!(index.search_by_key(&Value::from(5)), vec![DocId::from("a")]);

        // losing it moves the document back
        index.update(&DocId::from("a"), &Fields::new());
        assert_eq!(index.unkeyed_ids(), vec![DocId::from("a")]);
    }

    #[test]
    fn null_key_counts_as_unkeyed() {
        let mut index = Index::from_spec(IndexSpec::field("age", "age").retain_unkeyed());
        let mut fields = Fields::new();
        fields.insert("age".into(), Value::Null);
        checked_add(&mut index, "a", &fields).unwrap();

        assert!(index.ordered_ids().is_empty());
        assert_eq!(index.unkeyed_ids(), vec![DocId::from("a")]);
    }

    #[test]
    fn between_key_bounds_honors_inclusivity() {
        let mut index = age_index();
        for (id, age) in [("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 40.0)] {
            checked_add(&mut index, id, &person(id, age)).unwrap();
        }

        let hits = index.between_key_bounds(&Bounds::new().gt(10).lte(30));
        assert_eq!(hits, vec![DocId::from("b"), DocId::from("c")]);

        let hits = index.between_key_bounds(&Bounds::new().gte(10).lt(30));
        assert_eq!(hits, vec![DocId::from("a"), DocId::from("b")]);

        let hits = index.between_key_bounds(&Bounds::new().gte(20));
        assert_eq!(hits.len(), 3);

        let all = index.between_key_bounds(&Bounds::new());
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn stricter_limit_wins_on_each_side() {
        let mut index = age_index();
        for (id, age) in [("a", 10.0), ("b", 20.0), ("c", 30.0)] {
            checked_add(&mut index, id, &person(id, age)).unwrap();
        }

        // gt 10 beats gte 10: exclusive on a tie
        let hits = index.between_key_bounds(&Bounds::new().gt(10).gte(10));
        assert_eq!(hits, vec![DocId::from("b"), DocId::from("c")]);

        // gte 20 beats gt 10: higher floor
        let hits = index.between_key_bounds(&Bounds::new().gt(10).gte(20));
        assert_eq!(hits, vec![DocId::from("b"), DocId::from("c")]);

        // lt 30 beats lte 30
        let hits = index.between_key_bounds(&Bounds::new().lt(30).lte(30));
        assert_eq!(hits, vec![DocId::from("a"), DocId::from("b")]);
    }

    #[test]
    fn degenerate_ranges_yield_nothing() {
        let mut index = age_index();
        checked_add(&mut index, "a", &person("x", 20.0)).unwrap();

        assert!(index
            .between_key_bounds(&Bounds::new().gt(30).lt(10))
            .is_empty());
        assert!(index
            .between_key_bounds(&Bounds::new().gt(20).lt(20))
            .is_empty());
        assert!(index
            .between_key_bounds(&Bounds::new().gte(20).lt(20))
            .is_empty());

        // a fully closed point range is a key lookup
        let hits = index.between_key_bounds(&Bounds::new().gte(20).lte(20));
        assert_eq!(hits, vec![DocId::from("a")]);
    }

    #[test]
    fn between_bounds_takes_example_documents() {
        let mut index = age_index();
        for (id, age) in [("a", 10.0), ("b", 20.0), ("c", 30.0)] {
            checked_add(&mut index, id, &person(id, age)).unwrap();
        }

        let bounds = Bounds::new().gte(person("low", 15.0)).lt(person("high", 30.0));
        assert_eq!(index.between_bounds(bounds), vec![DocId::from("b")]);

        // an example without the keyed field drops that limit
        let bounds: Bounds<Fields> = Bounds::new().gte(Fields::new()).lt(person("high", 30.0));
        let hits = index.between_bounds(bounds);
        assert_eq!(hits, vec![DocId::from("a"), DocId::from("b")]);
    }

    #[test]
    fn mixed_type_keys_order_deterministically() {
        let mut index = age_index();
        let mut by_text = Fields::new();
        by_text.insert("age".into(), Value::from("15"));

        checked_add(&mut index, "num", &person("x", 20.0)).unwrap();
        checked_add(&mut index, "text", &by_text).unwrap();
        checked_add(&mut index, "date", &{
            let mut f = Fields::new();
            f.insert("age".into(), Value::Date(25));
            f
        })
        .unwrap();

        // "15" < 20 < date(25) under the numeric interpretation
        assert_eq!(
            index.ordered_ids(),
            vec![DocId::from("text"), DocId::from("num"), DocId::from("date")]
        );
    }

    #[test]
    fn custom_comparator_reverses_order() {
        let spec = IndexSpec::field("age", "age")
            .comparator(|a, b| default_compare(a, b).reverse());
        let mut index = Index::from_spec(spec);
        for (id, age) in [("a", 10.0), ("b", 20.0), ("c", 30.0)] {
            checked_add(&mut index, id, &person(id, age)).unwrap();
        }

        assert_eq!(
            index.ordered_ids(),
            vec![DocId::from("c"), DocId::from("b"), DocId::from("a")]
        );
    }
}
