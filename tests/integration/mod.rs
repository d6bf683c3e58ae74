//! Integration tests for the jsonfs virtual filesystem

mod concurrency;
mod config_loading;
mod disk_tickets;
mod hooks;
mod lifecycle;
mod tree_operations;
