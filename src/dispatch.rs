/// Field dispatch tables
///
/// A `DispatchTable<C>` maps each numeric field identifier to the updater
/// that writes it into a cache of type `C`. Tables are built from a kind's
/// static bindings and the field dictionary, published once per registry
/// through a `TableSlot`, and shared read-only by every listener of that
/// kind.

use crate::dictionary::{FieldDictionary, FieldNames};
use crate::error::FieldTypeError;
use crate::message::{Fid, FieldType, FieldValue};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Writes one field value into a cache slot, marks it MODIFIED and sets at
/// most one transient flag.
pub type FieldUpdater<C> = fn(&mut C, &FieldValue) -> Result<(), FieldTypeError>;

/// A canonical field name bound to its updater
pub struct FieldBinding<C> {
    pub name: &'static str,
    pub field_type: FieldType,
    pub apply: FieldUpdater<C>,
}

impl<C> FieldBinding<C> {
    pub fn new(name: &'static str, field_type: FieldType, apply: FieldUpdater<C>) -> Self {
        FieldBinding {
            name,
            field_type,
            apply,
        }
    }
}

impl<C> Clone for FieldBinding<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for FieldBinding<C> {}

impl<C> fmt::Debug for FieldBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish()
    }
}

pub struct DispatchTable<C> {
    slots: Vec<Option<FieldBinding<C>>>,
    bound: usize,
}

impl<C> DispatchTable<C> {
    /// Builds a table, or `None` while the dictionary is not ready.
    /// Bindings whose name the dictionary does not know are left out.
    pub fn build(dictionary: &dyn FieldDictionary, names: &FieldNames, bindings: &[FieldBinding<C>]) -> Option<Self> {
        if !dictionary.is_ready() {
            return None;
        }

        let max_fid = dictionary.max_fid() as usize;
        let mut slots = vec![None; max_fid + 1];
        let mut bound = 0;

        for binding in bindings {
            let wire = names.wire_name(binding.name);
            let Some(fid) = dictionary.resolve(wire) else {
                tracing::trace!(field = binding.name, wire, "field not in dictionary");
                continue;
            };
            if let Some(slot) = slots.get_mut(fid as usize) {
                if slot.is_none() {
                    bound += 1;
                }
                *slot = Some(*binding);
            }
        }

        Some(DispatchTable { slots, bound })
    }

    /// Bounds-checked lookup; unknown and out-of-range identifiers yield `None`
    pub fn lookup(&self, fid: Fid) -> Option<&FieldBinding<C>> {
        self.slots.get(fid as usize)?.as_ref()
    }

    pub fn max_fid(&self) -> Fid {
        self.slots.len().saturating_sub(1) as Fid
    }

    /// Number of identifiers with an updater
    pub fn bound_fields(&self) -> usize {
        self.bound
    }

    /// Identifier the table routes `name` from, if bound
    pub fn fid_of(&self, name: &str) -> Option<Fid> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|b| b.name == name))
            .map(|i| i as Fid)
    }
}

impl<C> fmt::Debug for DispatchTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("max_fid", &self.max_fid())
            .field("bound", &self.bound)
            .finish()
    }
}

/// One-shot publication point for a kind's table.
///
/// Racing builders each construct a candidate; exactly one is stored and
/// every caller gets that one. A partially built table is never visible.
pub struct TableSlot<C> {
    cell: OnceLock<Arc<DispatchTable<C>>>,
}

impl<C> TableSlot<C> {
    pub const fn new() -> Self {
        TableSlot { cell: OnceLock::new() }
    }

    pub fn get(&self) -> Option<Arc<DispatchTable<C>>> {
        self.cell.get().cloned()
    }

    pub fn get_or_build(
        &self,
        kind: impl fmt::Display,
        dictionary: &dyn FieldDictionary,
        names: &FieldNames,
        bindings: impl FnOnce() -> Vec<FieldBinding<C>>,
    ) -> Option<Arc<DispatchTable<C>>> {
        if let Some(table) = self.cell.get() {
            return Some(table.clone());
        }

        let candidate = Arc::new(DispatchTable::build(dictionary, names, &bindings())?);
        if self.cell.set(candidate).is_ok() {
            if let Some(table) = self.cell.get() {
                tracing::info!(
                    %kind,
                    bound = table.bound_fields(),
                    max_fid = table.max_fid(),
                    "dispatch table published"
                );
            }
        }
        self.cell.get().cloned()
    }
}

impl<C> Default for TableSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}
