//! Ticket time ledger and KPI reporting for an IT support desk.
//!
//! [`ledger`] turns a ticket's stored time logs into live elapsed figures,
//! [`report`] filters and summarizes ticket collections and renders the KPI
//! export. [`db`] is the local SQLite store the CLI runs against.

pub mod commands;
pub mod csv;
pub mod db;
pub mod ledger;
pub mod models;
pub mod report;

#[cfg(test)]
mod test_support;
