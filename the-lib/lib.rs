//! Core of a line-oriented text editing engine.
//!
//! Documents are persistent line sequences ([`text::Text`]) kept in a bounded
//! undo [`history::History`]. A [`editor::DocumentEditor`] applies edits under
//! one lock, records each of them as a [`journal::LogEntry`] and publishes
//! render snapshots ([`view::View`]). Large files are indexed in the
//! background by the [`loader`] and materialized one line at a time.

pub mod config;
pub mod editor;
pub mod history;
pub mod journal;
pub mod line;
pub mod loader;
pub mod seq;
pub mod text;
pub mod view;
