/// Per-field modification tracking
///
/// Every cached field is a `Tracked<T>`: the last-known value paired with a
/// `FieldState` that records whether the most recent message touched it.
/// States move UNINITIALIZED -> MODIFIED on first observation, MODIFIED ->
/// UNMODIFIED once per message cycle, and UNMODIFIED -> MODIFIED when seen
/// again. Nothing goes back to UNINITIALIZED except a cache reset.

use serde::Serialize;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize)]
pub enum FieldState {
    #[default]
    #[strum(serialize = "UNINITIALIZED")]
    Uninitialized,
    #[strum(serialize = "UNMODIFIED")]
    Unmodified,
    #[strum(serialize = "MODIFIED")]
    Modified,
}

impl FieldState {
    /// State after the start-of-message decay step
    pub fn decayed(self) -> Self {
        match self {
            FieldState::Modified => FieldState::Unmodified,
            other => other,
        }
    }

    pub fn is_modified(self) -> bool {
        self == FieldState::Modified
    }

    pub fn is_initialized(self) -> bool {
        self != FieldState::Uninitialized
    }
}

/// A cached value and its modification state.
///
/// Readers only get shared access; writes happen through the dispatch table
/// and the derived-field resolver inside this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Tracked<T> {
    value: T,
    state: FieldState,
}

impl<T> Tracked<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    pub fn is_modified(&self) -> bool {
        self.state.is_modified()
    }

    pub(crate) fn set(&mut self, value: T) {
        self.value = value;
        self.state = FieldState::Modified;
    }

    pub(crate) fn decay(&mut self) {
        self.state = self.state.decayed();
    }
}

impl<T: PartialEq> Tracked<T> {
    /// Stores `value` only if it differs from the cached one.
    /// Returns whether the slot changed.
    pub(crate) fn set_if_changed(&mut self, value: T) -> bool {
        if self.state.is_initialized() && self.value == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: Copy> Tracked<T> {
    pub fn get(&self) -> T {
        self.value
    }
}

impl<T> Tracked<Option<T>> {
    pub fn as_ref(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl Tracked<Option<String>> {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Decays every listed slot. Keeps the per-kind decay lists short.
macro_rules! decay_all {
    ($owner:expr; $($field:ident),+ $(,)?) => {
        $( $owner.$field.decay(); )+
    };
}

pub(crate) use decay_all;
