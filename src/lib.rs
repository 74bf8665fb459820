//! File Cabinet – an in-memory, indexed store of personal records with a small
//! query language for filtering, updating and projecting them.
//!
//! A [`construct::Record`] carries seven fields: `id`, `firstname`, `lastname`,
//! `dateofbirth`, `identificationnumber`, `points` and `letter`. Records are
//! owned by a [`construct::Cabinet`], which keeps three secondary indexes
//! (first name, last name, date of birth) consistent with the primary list
//! through every create, edit and delete.
//!
//! ## Modules
//! * [`field`] – The field registry: one descriptor per field with its text
//!   converter, getter, setter and equality-predicate builder.
//! * [`datatype`] – The closed [`datatype::Value`] sum type and date/decimal parsing.
//! * [`query`] – Compiles WHERE, SET, VALUES and select-list clauses into
//!   predicates, mutations, records and projectors. WHERE conditions fold
//!   strictly left to right; `and` does not bind tighter than `or`.
//! * [`construct`] – The [`construct::RecordStore`] contract and the indexed
//!   [`construct::Cabinet`] with snapshot/restore.
//! * [`projection`] – Lazily filtered, projected result rows.
//! * [`validation`] – Record validators and the named rule sets.
//! * [`persist`] – A fixed-width binary record file and a store that mirrors
//!   every mutation into it.
//! * [`instrument`] – Logging and timing decorators over any store.
//! * [`engine`] – Full statements (`insert`, `select`, `update`, `delete`).
//! * [`settings`] – Layered configuration from file and environment.
//! * [`server`] – An HTTP endpoint accepting statements as JSON.
//!
//! ## Quick Start
//! ```
//! use filecabinet::construct::{Cabinet, CabinetConfig, RecordStore};
//! use filecabinet::engine::Engine;
//! let mut cabinet = Cabinet::new(CabinetConfig::default());
//! let engine = Engine::new();
//! engine
//!     .execute(&mut cabinet, "insert (firstname, lastname, dateofbirth, identificationnumber, points, letter) values ('Ann', 'Lee', '1990-05-01', '12', '10', 'A')")
//!     .unwrap();
//! let result = engine.execute(&mut cabinet, "select id, lastname where firstname = 'Ann'").unwrap();
//! assert_eq!(result.rows, vec![vec!["1".to_string(), "Lee".to_string()]]);
//! assert_eq!(cabinet.count(), 1);
//! ```

pub mod construct;
pub mod datatype;
pub mod engine;
pub mod error;
pub mod field;
pub mod instrument;
pub mod persist;
pub mod projection;
pub mod query;
pub mod server;
pub mod settings;
pub mod validation;

pub use error::{CabinetError, Result};
