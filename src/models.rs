pub mod project;
pub mod store;
pub mod submission;
