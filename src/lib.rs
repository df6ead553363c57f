//! Library crate for studio-sched-back, exposing modules for binaries and integration tests.

pub mod clock;
pub mod config;
pub mod dao;
pub mod domain;
mod dto;
mod error;
pub mod notify;
pub mod routes;
pub mod sched;
pub mod services;
pub mod state;
