pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod retention;
pub mod storage;
