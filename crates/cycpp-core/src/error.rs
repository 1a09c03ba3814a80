use thiserror::Error;

use crate::script::ScriptError;

/// Errors raised by the preprocessor passes. Every variant aborts the run.
#[derive(Error, Debug)]
pub enum CycppError {
    #[error("unable to run the preprocessor {program:?}: {message}")]
    Preprocessor { program: String, message: String },

    #[error("{location}This appears to be a cyclus pragma but has an incorrect form:\n  {statement}")]
    MalformedDirective { location: String, statement: String },

    #[error(
        "{location}The type of {class}::{member} ({spelled}) is not a recognized type: {catalogue}."
    )]
    Type {
        location: String,
        class: String,
        member: String,
        spelled: String,
        catalogue: String,
    },

    #[error("the {generator} generator does not support the type of {class}::{member} ({ty})")]
    UnsupportedType {
        generator: String,
        class: String,
        member: String,
        ty: String,
    },

    #[error(
        "{given:?} on {class}::{member} is not a valid XML schema data type, \
         see http://www.w3.org/TR/xmlschema-2/ for more information"
    )]
    InvalidSchemaType {
        class: String,
        member: String,
        given: String,
    },

    #[error("invalid annotation on {class}::{member}: {reason}")]
    InvalidAnnotation {
        class: String,
        member: String,
        reason: String,
    },

    #[error("{location}class {name:?} could not be determined")]
    UnresolvedClass { location: String, name: String },

    #[error("{location}a state variable annotation must appear inside a class body")]
    VarOutsideClass { location: String },

    #[error("{location}a class note must appear inside a class body")]
    NoteOutsideClass { location: String },

    #[error("unable to serialize the annotations of {class}: {source}")]
    Serialize {
        class: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CycppError {
    pub fn unsupported(generator: &str, class: &str, member: &str, ty: impl ToString) -> Self {
        Self::UnsupportedType {
            generator: generator.to_string(),
            class: class.to_string(),
            member: member.to_string(),
            ty: ty.to_string(),
        }
    }

    pub fn invalid_annotation(class: &str, member: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAnnotation {
            class: class.to_string(),
            member: member.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for preprocessor operations
pub type Result<T> = std::result::Result<T, CycppError>;
