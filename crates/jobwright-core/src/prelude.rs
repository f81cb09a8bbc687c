pub use jobwright_types::prelude::*;

// vim: ts=4
