//! Library crate for netscan-console: a terminal client for the NetScan
//! discovery service.
pub mod api;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod export;
pub mod logging;
pub mod netdetect;
pub mod notify;
pub mod poller;
pub mod render;
pub mod types;
