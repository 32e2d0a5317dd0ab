/// Market Listeners - Field-State Caches for Delta-Encoded Market Data
///
/// Rebuilds point-in-time instrument views from streams of partial,
/// delta-encoded messages. Features include:
/// - Field dispatch tables built once per entity kind and shared
/// - Three-state per-field dirty tracking
/// - Quote and trade count gap detection, conflation aware
/// - Duplicate notification suppression
/// - Derived fields (participant id, irregular trades, event times)
/// - Independent recap snapshots
/// - Binary message codec for feeding the listeners

pub mod field_state;
pub mod price;
pub mod message;
pub mod codec;
pub mod dictionary;
pub mod dispatch;
pub mod registry;
pub mod gap_detector;
pub mod derived;
pub mod common;
pub mod recap;
pub mod listener;
pub mod subscription;
pub mod stats;
pub mod error;
pub mod quote;
pub mod trade;
pub mod security_status;
pub mod order_imbalance;
pub mod fundamental;

pub use field_state::{FieldState, Tracked};
pub use price::Price;
pub use message::{Fid, FieldMessage, FieldType, FieldValue, Message, MsgClass, MsgType};
pub use codec::{DecodeError, Decoder, Encoder};
pub use dictionary::{FieldDescriptor, FieldDictionary, FieldNames, SharedDictionary};
pub use dispatch::{DispatchTable, FieldBinding};
pub use registry::{EntityKind, FieldRegistry};
pub use gap_detector::{GapWindow, SequenceTracker};
pub use common::CommonFields;
pub use recap::Recap;
pub use listener::{FieldCache, MsgOutcome};
pub use subscription::{MsgListener, Subscription};
pub use stats::ListenerStats;
pub use error::{FieldError, FieldTypeError, ListenerError};
pub use quote::{QuoteFields, QuoteHandler, QuoteListener, QuoteRecap};
pub use trade::{TradeFields, TradeHandler, TradeListener, TradeRecap};
pub use security_status::{SecurityStatusFields, SecurityStatusHandler, SecurityStatusListener, SecurityStatusRecap};
pub use order_imbalance::{
    OrderImbalanceFields, OrderImbalanceHandler, OrderImbalanceListener, OrderImbalanceRecap, OrderImbalanceType,
};
pub use fundamental::{FundamentalFields, FundamentalHandler, FundamentalListener, FundamentalRecap};
