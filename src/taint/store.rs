//! Case-insensitive, concurrently accessible variable store.
//!
//! Every slot holds a [`TaintedValue`]. One slot, [`MAIN_KEY`], is always
//! present: it carries the primary input and output of a pipeline step.
//!
//! The map is sharded ([`DashMap`]), so a callable that fans out internally
//! can read and write the store from several tasks at once. Each single-key
//! operation is atomic. Multi-key reads are not: snapshot with `clone()` when
//! a consistent view across keys is needed.

use std::fmt;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::value::TaintedValue;

/// Name of the main slot.
pub const MAIN_KEY: &str = "input";

/// One stored variable. `name` keeps the casing used on first insertion.
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    value: TaintedValue,
}

/// Keyed store of tainted variables, looked up case-insensitively.
#[derive(Debug, Clone)]
pub struct VariableStore {
    slots: DashMap<String, Slot>,
}

/// Case folding shared by every name-keyed lookup.
pub(crate) fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl VariableStore {
    /// Create a store whose main slot is empty and trusted.
    pub fn new() -> Self {
        Self::with_main(TaintedValue::empty())
    }

    /// Create a store seeded with a main value.
    pub fn with_main(main: TaintedValue) -> Self {
        let slots = DashMap::new();
        slots.insert(
            MAIN_KEY.to_owned(),
            Slot {
                name: MAIN_KEY.to_owned(),
                value: main,
            },
        );
        Self { slots }
    }

    /// Look up a variable.
    ///
    /// A missing name yields [`TaintedValue::empty`], which is trusted: no
    /// data cannot leak anything. Use [`try_get`](Self::try_get) or
    /// [`contains`](Self::contains) to tell "missing" from "empty".
    pub fn get(&self, name: &str) -> TaintedValue {
        self.try_get(name).unwrap_or_else(TaintedValue::empty)
    }

    /// Look up a variable, returning `None` when it was never set.
    pub fn try_get(&self, name: &str) -> Option<TaintedValue> {
        self.slots
            .get(&normalize(name))
            .map(|slot| slot.value.clone())
    }

    /// Whether a variable with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(&normalize(name))
    }

    /// Set a variable's content and trust bit together.
    ///
    /// `None` content deletes the slot. The main slot is never deleted: it is
    /// reset to empty content with the given trust bit instead.
    pub fn set(&self, name: &str, content: Option<String>, trusted: bool) {
        let key = normalize(name);
        match content {
            Some(content) => self.put(key, name, TaintedValue::new(content, trusted)),
            None if key == MAIN_KEY => {
                self.put(key, name, TaintedValue::new(String::new(), trusted));
            }
            None => {
                self.slots.remove(&key);
            }
        }
    }

    /// Store a whole [`TaintedValue`] under `name`.
    pub fn set_value(&self, name: &str, value: TaintedValue) {
        self.put(normalize(name), name, value);
    }

    /// Trusted-by-default shortcut: always stamps `trusted = true`.
    ///
    /// **Caution:** unlike [`set`](Self::set), this path cannot carry taint.
    /// Writing externally sourced text through it silently upgrades that text
    /// to trusted. Use `set` or [`set_value`](Self::set_value) whenever the
    /// content did not originate from a trusted party.
    pub fn insert(&self, name: &str, content: impl Into<String>) {
        self.put(normalize(name), name, TaintedValue::trusted(content));
    }

    /// Remove a variable. Removing the main slot resets it to empty and trusted.
    pub fn remove(&self, name: &str) -> Option<TaintedValue> {
        let key = normalize(name);
        if key == MAIN_KEY {
            let previous = self.try_get(MAIN_KEY);
            self.put(key, MAIN_KEY, TaintedValue::empty());
            return previous;
        }
        self.slots.remove(&key).map(|(_, slot)| slot.value)
    }

    fn put(&self, key: String, name: &str, value: TaintedValue) {
        match self.slots.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().value = value,
            Entry::Vacant(entry) => {
                entry.insert(Slot {
                    name: name.to_owned(),
                    value,
                });
            }
        }
    }

    /// Current main value.
    pub fn main(&self) -> TaintedValue {
        self.get(MAIN_KEY)
    }

    /// Replace the main slot's content and trust bit.
    pub fn update_main(&self, content: impl Into<String>, trusted: bool) {
        self.set_value(MAIN_KEY, TaintedValue::new(content, trusted));
    }

    /// Replace the main slot's content, keeping taint monotonic.
    ///
    /// The new trust bit is `current && trusted`: once the main slot is
    /// untrusted, only an explicit [`update_main`](Self::update_main) with
    /// `trusted = true` restores it. Read and write happen under one shard
    /// lock, so concurrent updates cannot lose taint.
    pub fn update_main_preserving_trust(&self, content: impl Into<String>, trusted: bool) {
        let content = content.into();
        let mut slot = self
            .slots
            .entry(MAIN_KEY.to_owned())
            .or_insert_with(|| Slot {
                name: MAIN_KEY.to_owned(),
                value: TaintedValue::empty(),
            });
        let keep = slot.value.is_trusted() && trusted;
        slot.value = TaintedValue::new(content, keep);
    }

    /// Mark only the main slot untrusted, keeping its content.
    pub fn untrust_main(&self) {
        if let Some(mut slot) = self.slots.get_mut(MAIN_KEY) {
            slot.value = std::mem::take(&mut slot.value).to_untrusted();
        }
    }

    /// Copy every slot of `other` into this store.
    ///
    /// With `discard_existing`, this store is cleared first. On a name
    /// collision the incoming slot wins outright, trust bit included: this is
    /// an overwrite, not a trust-aware join.
    pub fn merge(&self, other: &VariableStore, discard_existing: bool) {
        let incoming: Vec<(String, Slot)> = other
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if discard_existing {
            self.slots.clear();
        }
        for (key, slot) in incoming {
            self.put(key, &slot.name, slot.value);
        }
        if !self.slots.contains_key(MAIN_KEY) {
            self.put(MAIN_KEY.to_owned(), MAIN_KEY, TaintedValue::empty());
        }
    }

    /// Whether every slot is trusted.
    pub fn is_all_trusted(&self) -> bool {
        self.slots.iter().all(|slot| slot.value.is_trusted())
    }

    /// Mark every slot untrusted without altering content.
    pub fn force_all_untrusted(&self) {
        for mut slot in self.slots.iter_mut() {
            slot.value = std::mem::take(&mut slot.value).to_untrusted();
        }
    }

    /// Number of slots, main included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`: the main slot is present from construction.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Enumerate `(name, content)` pairs. Trust bits are not exposed here.
    ///
    /// Holds shard read locks while iterating; do not write to the same
    /// store from inside the loop.
    pub fn iter(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.slots.iter().map(|entry| {
            let slot = entry.value();
            (slot.name.clone(), slot.value.content().to_owned())
        })
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.main().content())
    }
}
