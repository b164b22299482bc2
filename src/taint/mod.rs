//! Taint primitives: trust-tagged values and the keyed store built from them.

pub mod store;
pub mod value;

pub use store::{VariableStore, MAIN_KEY};
pub use value::TaintedValue;
