//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers mutate contracts through optimistic commits; query
//! handlers only read.

pub mod handlers;
