/*!
Core modules of the last-updated log store
*/

pub mod cleanup_task;
pub mod config;
pub mod error;
pub mod event_system;
pub mod record_store;
pub mod store;
