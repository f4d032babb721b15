//! Compilation error taxonomy.
//!
//! Two classes: syntax errors raised by the frontend before semantic analysis
//! runs, and semantic errors raised by the visitor. The first semantic error
//! aborts the whole compilation; no partial product is ever returned.

use std::fmt;
use thiserror::Error;

/// What kind of named construct a reference error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Dimension,
    Range,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Dimension => write!(f, "dimension"),
            RefKind::Range => write!(f, "range"),
        }
    }
}

/// Errors raised while building and cross-validating the product model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    /// A dimension or range was referenced before being declared.
    #[error("{kind} '{name}' not found")]
    UndefinedReference { kind: RefKind, name: String },

    /// A dimension or range id was declared twice.
    #[error("{kind} '{name}' already exists")]
    DuplicateDeclaration { kind: RefKind, name: String },

    /// A construct did not have the shape its kind requires.
    #[error("malformed {construct}: {message}")]
    MalformedConstruct {
        construct: &'static str,
        message: String,
    },
}

impl SemanticError {
    pub fn undefined(kind: RefKind, name: impl Into<String>) -> Self {
        SemanticError::UndefinedReference {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: RefKind, name: impl Into<String>) -> Self {
        SemanticError::DuplicateDeclaration {
            kind,
            name: name.into(),
        }
    }

    pub fn malformed(construct: &'static str, message: impl Into<String>) -> Self {
        SemanticError::MalformedConstruct {
            construct,
            message: message.into(),
        }
    }
}

/// Top-level compiler error: either the frontend rejected the text or the
/// analyzer rejected the tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}
