// src/lib.rs — Library root for Charla

pub mod api;
pub mod chat;
pub mod cli;
pub mod infra;
pub mod provider;
pub mod store;
