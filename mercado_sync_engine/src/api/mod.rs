pub mod sync;
pub mod vault;
