//! CCB Operations API Library
//!
//! Tracks CCB (Cédula de Crédito Bancário) credit operations for a network
//! of cooperative branches: entry form normalization, spreadsheet paste
//! import, role and branch scoped listing, and the create/update/delete
//! lifecycle over a Postgres record store.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db_storage`: Postgres record store and directory lookups.
//! - `errors`: HTTP error mapping.
//! - `handlers`: HTTP request handlers and router.
//! - `identity`: Auth service client and actor resolution.
//! - `lifecycle`: Create/update/delete orchestration.
//! - `memory`: In-process store and directory.
//! - `models`: Operation records, form input and validation.
//! - `normalize`: Currency and CPF/CNPJ display helpers.
//! - `paste_parser`: Spreadsheet clipboard import.
//! - `store`: Record store and directory traits.
//! - `visibility`: Role and branch scoping, dashboard tabs.

pub mod config;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod paste_parser;
pub mod store;
pub mod visibility;
