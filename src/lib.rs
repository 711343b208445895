//! CutMaker: reference-driven image generation and editing.
//!
//! The editing engine ([`editor::EditorState`] and the `ops` modules) is
//! independent of the front end; the desktop app ([`app`]) and the headless
//! CLI ([`cli`]) both drive it.

pub mod app;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;
