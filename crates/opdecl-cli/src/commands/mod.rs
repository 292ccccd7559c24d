pub mod check;
pub mod snapshot;
