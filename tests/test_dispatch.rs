/// Dispatch table construction and publication

use market_listeners::quote::QuoteCache;
use market_listeners::registry::standard_fields;
use market_listeners::trade::TradeCache;
use market_listeners::{FieldRegistry, QuoteListener, SharedDictionary, TradeListener};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 16;

#[test]
fn test_single_publication_under_concurrent_construction() {
    let registry = FieldRegistry::standard();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let listener = QuoteListener::new(registry);
                listener.dispatch_table().unwrap()
            })
        })
        .collect();

    let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let published = registry.published::<QuoteCache>().unwrap();
    for table in &tables {
        assert!(Arc::ptr_eq(table, &published));
    }
}

#[test]
fn test_publication_after_dictionary_becomes_ready() {
    let dictionary = Arc::new(SharedDictionary::new());
    let registry = Arc::new(FieldRegistry::new(dictionary.clone()));

    let listeners: Vec<_> = (0..4).map(|_| TradeListener::new(registry.clone())).collect();
    assert!(registry.published::<TradeCache>().is_none());

    dictionary.load(standard_fields());
    let barrier = Arc::new(Barrier::new(listeners.len()));
    let tables: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = listeners
            .iter()
            .map(|listener| {
                let barrier = barrier.clone();
                scope.spawn(move || {
                    barrier.wait();
                    listener.dispatch_table().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(tables.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_kinds_have_separate_tables() {
    let registry = FieldRegistry::standard();
    let quotes = registry.table::<QuoteCache>().unwrap();
    let trades = registry.table::<TradeCache>().unwrap();

    let bid = registry.fid("wBidPrice").unwrap();
    let last = registry.fid("wTradePrice").unwrap();
    assert!(quotes.lookup(bid).is_some());
    assert!(quotes.lookup(last).is_none());
    assert!(trades.lookup(last).is_some());

    // shared common fields route in both
    let symbol = registry.fid("wSymbol").unwrap();
    assert_eq!(quotes.lookup(symbol).unwrap().name, "wSymbol");
    assert_eq!(trades.lookup(symbol).unwrap().name, "wSymbol");
}

#[test]
fn test_out_of_range_fid() {
    let registry = FieldRegistry::standard();
    let table = registry.table::<QuoteCache>().unwrap();
    assert_eq!(table.max_fid() as usize, standard_fields().len());
    assert!(table.lookup(table.max_fid() + 1).is_none());
    assert!(table.lookup(u16::MAX).is_none());
}

#[test]
fn test_separate_registries_do_not_share() {
    let a = FieldRegistry::standard();
    let b = FieldRegistry::standard();
    let ta = a.table::<QuoteCache>().unwrap();
    let tb = b.table::<QuoteCache>().unwrap();
    assert!(!Arc::ptr_eq(&ta, &tb));
    assert_eq!(ta.bound_fields(), tb.bound_fields());
}
