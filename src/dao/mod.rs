/// Database model definitions.
pub mod models;
/// Profile persistence and retrieval operations.
pub mod profile_store;
/// Storage abstraction layer for database operations.
pub mod storage;
