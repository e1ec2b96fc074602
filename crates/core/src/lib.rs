#![allow(clippy::result_large_err)]
//! vippdfa-core: VIPP to Papyrus DocDEF translator.
//!
//! Translates a `.DBM` main document and the `.FRM` overlays it loads into
//! DocDEF (`.dfa`) text.
//!
//! # Public API
//!
//! - [`translate()`] / [`translate_with_provider()`] -- run every pass for
//!   one main document
//! - [`TranslateConfig`] -- translation settings
//! - [`Report`] -- warnings and resource references gathered on the way
//! - [`TranslateError`] -- fatal lex, parse, load or generation error
//!
//! The individual passes are public for tooling that needs only part of
//! the pipeline (token dumps, syntax checks).

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod source;
pub mod state;
pub mod symbols;
pub mod translate;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Command, CommandKind, Document, DocumentKind, Operand};
pub use config::{LayoutConfig, TranslateConfig};
pub use error::{GenerationInvariantError, LexError, ParseError, TranslateError};
pub use report::Report;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use codegen::{generate_main, generate_overlay};
pub use lexer::lex;
pub use parser::{parse_source, KnownAliases};
pub use resolve::resolve_conflicts;
pub use translate::{translate, translate_with_provider, OverlayOutput, Translation};
