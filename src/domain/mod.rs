pub mod alert;
pub mod dead_letter;
pub mod health;
pub mod ingest;
pub mod summary;
