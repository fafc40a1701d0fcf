// Core types shared by the LLM and app crates: configuration, persisted
// records, the review turn tracker, and the wire protocol.

pub mod config;
pub mod db;
pub mod model;
pub mod protocol;
pub mod review;
