//! Sentra Storage - Postgres persistence layer
//!
//! Repositories over sqlx, one per aggregate. The send queue and the
//! one-shot schedule registry are plain tables consumed with
//! `FOR UPDATE SKIP LOCKED`.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
