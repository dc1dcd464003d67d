//! GOLD print workflow core
//!
//! Generates JDF tickets for job items and hands them to Automation Engine,
//! drains the color-key and tiff-to-PDF queues, prints shipping labels and
//! runs the UDP daemon that locks and unlocks job folders on the file server.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
