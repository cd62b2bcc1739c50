//! Range limits for index queries.

use jotdb_codec::Value;

/// Range limits over index keys, every side optional.
///
/// `gt`/`gte` bound the range from below, `lt`/`lte` from above. When
/// both an exclusive and an inclusive limit are given for the same
/// side, the stricter one wins; ties go to the exclusive limit.
#[derive(Debug, Clone)]
pub struct Bounds<T> {
    /// Exclusive lower limit.
    pub gt: Option<T>,
    /// Inclusive lower limit.
    pub gte: Option<T>,
    /// Exclusive upper limit.
    pub lt: Option<T>,
    /// Inclusive upper limit.
    pub lte: Option<T>,
}

/// Bounds expressed directly as index keys.
pub type KeyBounds = Bounds<Value>;

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
        }
    }
}

impl<T> Bounds<T> {
    /// Creates bounds that match everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exclusive lower limit.
    #[must_use]
    pub fn gt(mut self, limit: impl Into<T>) -> Self {
        self.gt = Some(limit.into());
        self
    }

    /// Sets the inclusive lower limit.
    #[must_use]
    pub fn gte(mut self, limit: impl Into<T>) -> Self {
        self.gte = Some(limit.into());
        self
    }

    /// Sets the exclusive upper limit.
    #[must_use]
    pub fn lt(mut self, limit: impl Into<T>) -> Self {
        self.lt = Some(limit.into());
        self
    }

    /// Sets the inclusive upper limit.
    #[must_use]
    pub fn lte(mut self, limit: impl Into<T>) -> Self {
        self.lte = Some(limit.into());
        self
    }

    /// Returns `true` when no limit is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Maps each limit through `f`, dropping limits it rejects.
    pub(crate) fn filter_map<U>(self, mut f: impl FnMut(T) -> Option<U>) -> Bounds<U> {
        Bounds {
            gt: self.gt.and_then(&mut f),
            gte: self.gte.and_then(&mut f),
            lt: self.lt.and_then(&mut f),
            lte: self.lte.and_then(&mut f),
        }
    }
}
