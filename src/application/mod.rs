pub mod documents;
pub mod error;
pub mod repos;
