//! Crawl engine for the magpie web archiver.
//!
//! Three polite fetch queues (crawl, content, seed) feed a response
//! handler that updates URL records, appends snapshots, extracts links,
//! and stores bodies content-addressed. The [`Scheduler`] owns all of it.

pub mod client;
pub mod content;
pub mod error;
pub mod freshness;
pub mod handler;
pub mod normalize;
pub mod queue;
pub mod scheduler;
mod seeder;
pub mod sniff;

pub use client::{Fetched, HttpClient, Method};
pub use error::CrawlError;
pub use scheduler::Scheduler;
