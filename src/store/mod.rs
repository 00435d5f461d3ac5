// src/store/mod.rs — Durable transcript storage and session index

pub mod cache;
pub mod schema;
pub mod server;
pub mod sqlite;

pub use cache::CachedStore;
pub use server::{spawn, StoreHandle};
pub use sqlite::Store;
