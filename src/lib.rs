pub use sequent_core::*;
