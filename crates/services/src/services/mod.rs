pub mod audit_trail;
pub mod categories;
pub mod config;
pub mod documents;
pub mod list_state;
pub mod storage;
