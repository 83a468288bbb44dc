//! Clinical workflow service: appointment intake with best-effort
//! triage scoring, assignment-gated prescribing, and billing with a
//! payment state machine.

pub mod api;
pub mod appointment;
pub mod billing;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod prescription;
pub mod triage;

#[cfg(test)]
pub mod testutil;
