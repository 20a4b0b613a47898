#![forbid(unsafe_code)]

pub mod config;
pub mod identity;
pub mod logging;
pub mod models;
pub mod paths;
pub mod reconcile;
pub mod remote;
pub mod routes;
pub mod seed;
pub mod storage;
pub mod store;
