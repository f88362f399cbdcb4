//! Core data model and persistence for the magpie web archiver.
//!
//! This crate holds everything the crawl engine and the HTTP service share:
//! the URL/Link/Snapshot/Source entities, the SQLite-backed repositories,
//! the content-addressed blob store, content fingerprinting, and settings.

pub mod config;
pub mod hash;
pub mod models;
pub mod repository;
pub mod schema;
pub mod storage;

pub use config::Settings;
