pub mod gallery;
pub mod intake;
pub mod sweep;
pub mod sync;
