//! In-memory reference store.
//!
//! [`InMemoryRefStore`] keeps all refs in a `HashMap` behind a `RwLock`. It
//! backs in-process origins for tests and simulations.

use std::collections::HashMap;
use std::sync::RwLock;

use tally_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::Ref;

/// An in-memory implementation of [`RefStore`].
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<HashMap<String, Ref>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RefError {
    RefError::Poisoned(e.to_string())
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<Ref>> {
        let refs = self.refs.read().map_err(poisoned)?;
        Ok(refs.get(name).cloned())
    }

    fn write_ref(&self, reference: &Ref) -> Result<()> {
        let name = reference.canonical_name();
        validate_ref_name(&name)?;

        let mut refs = self.refs.write().map_err(poisoned)?;
        if let Some(existing) = refs.get(&name) {
            if existing.is_tag() && existing.target() != reference.target() {
                return Err(RefError::TagImmutable { name });
            }
        }
        refs.insert(name, reference.clone());
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut refs = self.refs.write().map_err(poisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<Ref>> {
        let refs = self.refs.read().map_err(poisoned)?;
        let mut result: Vec<(&String, &Ref)> =
            refs.iter().filter(|(k, _)| k.starts_with(prefix)).collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result.into_iter().map(|(_, r)| r.clone()).collect())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool> {
        let template = Ref::parse(name, new)?;
        validate_ref_name(name)?;

        let mut refs = self.refs.write().map_err(poisoned)?;
        let current = refs.get(name);
        if current.map(Ref::target) != expected {
            return Ok(false);
        }
        if current.is_some_and(Ref::is_tag) && expected != Some(new) {
            return Err(RefError::TagImmutable {
                name: name.to_string(),
            });
        }
        refs.insert(name.to_string(), template);
        Ok(true)
    }
}
