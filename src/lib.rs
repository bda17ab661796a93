//! Dynamic table access with a database-backed status logger.
//!
//! [`access_table`] inserts, updates or selects rows from a JSON request,
//! opening and closing a connection per call and reporting failures as the
//! sentinel `-1`. [`TableAccessor::run`] is the typed variant.
//! [`logging::StatusLogger`] fans each log event out to a dated file, the
//! console and a status row.

pub mod accessor;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod request;
pub mod sql;

pub use accessor::{access_table, TableAccessor};
pub use config::{DbConfig, DEFAULT_CONFIG_PATH};
pub use datetime::normalize_datetime;
pub use error::{AccessError, Result};
pub use models::*;
pub use request::{
    Condition, InsertRequest, Mode, Operator, Projection, Request, SelectRequest,
    UpdateRequest, UpdateTarget,
};
