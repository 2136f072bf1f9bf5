//! Persistent entity model.
//!
//! # Invariants
//! - Every stored type implements [`entity::Entity`] and owns one table.
//! - Relations are plain fields that stay empty until eagerly loaded.

pub mod client;
pub mod entity;
pub mod user;

use client::Client;
use entity::{Entity, CHANGED_DATE_COLUMN, ID_COLUMN};
use user::User;

/// Table shapes a ready connection must provide: `(table, data columns)`.
pub fn entity_tables() -> [(&'static str, &'static [&'static str]); 2] {
    [(Client::TABLE, Client::COLUMNS), (User::TABLE, User::COLUMNS)]
}

/// Columns every entity table carries in addition to its data columns.
pub const IDENTITY_COLUMNS: [&str; 2] = [ID_COLUMN, CHANGED_DATE_COLUMN];
