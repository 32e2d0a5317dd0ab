/// Field registry
///
/// Owns the dictionary handle, the field-name overrides and one table slot
/// per entity kind. Listeners of a kind that share a registry share that
/// kind's dispatch table; a process normally creates one registry.

use crate::dictionary::{FieldDescriptor, FieldDictionary, FieldNames, SharedDictionary};
use crate::dispatch::{DispatchTable, TableSlot};
use crate::fundamental::FundamentalCache;
use crate::listener::FieldCache;
use crate::message::{Fid, FieldType};
use crate::order_imbalance::OrderImbalanceCache;
use crate::quote::QuoteCache;
use crate::security_status::SecurityStatusCache;
use crate::trade::TradeCache;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use strum::{Display, EnumIter, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum EntityKind {
    Quote,
    Trade,
    SecurityStatus,
    OrderImbalance,
    Fundamental,
}

pub struct FieldRegistry {
    dictionary: Arc<dyn FieldDictionary>,
    names: FieldNames,
    pub(crate) quotes: TableSlot<QuoteCache>,
    pub(crate) trades: TableSlot<TradeCache>,
    pub(crate) security_status: TableSlot<SecurityStatusCache>,
    pub(crate) order_imbalance: TableSlot<OrderImbalanceCache>,
    pub(crate) fundamentals: TableSlot<FundamentalCache>,
}

impl FieldRegistry {
    pub fn new(dictionary: Arc<dyn FieldDictionary>) -> Self {
        Self::with_names(dictionary, FieldNames::new())
    }

    pub fn with_names(dictionary: Arc<dyn FieldDictionary>, names: FieldNames) -> Self {
        FieldRegistry {
            dictionary,
            names,
            quotes: TableSlot::new(),
            trades: TableSlot::new(),
            security_status: TableSlot::new(),
            order_imbalance: TableSlot::new(),
            fundamentals: TableSlot::new(),
        }
    }

    /// Registry over `standard_dictionary()`
    pub fn standard() -> Arc<Self> {
        Arc::new(Self::new(Arc::new(standard_dictionary())))
    }

    pub fn dictionary(&self) -> &dyn FieldDictionary {
        &*self.dictionary
    }

    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    /// The published table for `C`'s kind, building it on first use.
    /// `None` while the dictionary is not ready.
    pub fn table<C: FieldCache>(&self) -> Option<Arc<DispatchTable<C>>> {
        C::slot(self).get_or_build(C::KIND, &*self.dictionary, &self.names, C::bindings)
    }

    /// Table for `C`'s kind if one has already been published
    pub fn published<C: FieldCache>(&self) -> Option<Arc<DispatchTable<C>>> {
        C::slot(self).get()
    }

    /// Resolves a canonical field name through the overrides and dictionary
    pub fn fid(&self, canonical: &str) -> Option<Fid> {
        self.dictionary.resolve(self.names.wire_name(canonical))
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("ready", &self.dictionary.is_ready())
            .field("names", &self.names)
            .finish()
    }
}

/// Descriptors for every canonical field the listeners bind, numbered from 1
/// in kind order. Names shared between kinds appear once.
pub fn standard_fields() -> Vec<FieldDescriptor> {
    let mut fields = Vec::new();
    let mut seen = HashSet::new();

    for kind in EntityKind::iter() {
        let bound = match kind {
            EntityKind::Quote => describe::<QuoteCache>(),
            EntityKind::Trade => describe::<TradeCache>(),
            EntityKind::SecurityStatus => describe::<SecurityStatusCache>(),
            EntityKind::OrderImbalance => describe::<OrderImbalanceCache>(),
            EntityKind::Fundamental => describe::<FundamentalCache>(),
        };
        for (name, field_type) in bound {
            if seen.insert(name) {
                let fid = (fields.len() + 1) as Fid;
                fields.push(FieldDescriptor::new(fid, name, field_type));
            }
        }
    }

    fields
}

fn describe<C: FieldCache>() -> Vec<(&'static str, FieldType)> {
    C::bindings().iter().map(|b| (b.name, b.field_type)).collect()
}

/// A ready dictionary holding `standard_fields()`
pub fn standard_dictionary() -> SharedDictionary {
    SharedDictionary::with_fields(standard_fields())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fields_are_unique() {
        let fields = standard_fields();
        let names: HashSet<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), fields.len());
        assert_eq!(fields[0].fid, 1);
        assert!(names.contains("wBidPrice"));
        assert!(names.contains("wTradeCount"));
        assert!(names.contains("wSecStatusQual"));
        assert!(names.contains("wDividendPrice"));
    }

    #[test]
    fn test_table_is_shared() {
        let registry = FieldRegistry::standard();
        let a = registry.table::<QuoteCache>().unwrap();
        let b = registry.table::<QuoteCache>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.published::<TradeCache>().is_none());
    }

    #[test]
    fn test_not_ready_registry() {
        let registry = FieldRegistry::new(Arc::new(SharedDictionary::new()));
        assert!(registry.table::<QuoteCache>().is_none());
        assert_eq!(registry.fid("wBidPrice"), None);
    }
}
