//! Crate-wide error type.
//!
//! Configuration errors surface when a learner is built, phase errors when the
//! feed / end-of-data protocol is driven out of order, and query errors when a
//! model cannot assign an interval to a value.

use thiserror::Error;

use crate::data::TypeTag;
use crate::learner::Phase;

#[derive( Error, Debug )]
pub enum Error {
    // --- configuration ---
    #[error( "allowed error list has {got} entries but the schema has {expected} attributes" )]
    ErrorBoundCount { expected: usize, got: usize },

    #[error( "allowed error of attribute {attr} must be finite and non-negative, got {value}" )]
    InvalidErrorBound { attr: usize, value: f64 },

    #[error( "sort attribute {attr} is out of range for a schema with {len} attributes" )]
    SortAttrOutOfRange { attr: usize, len: usize },

    #[error( "schema must have at least one attribute" )]
    EmptySchema,

    #[error( "sample rate must lie in (0, 1], got {0}" )]
    InvalidSampleRate( f64 ),

    // --- value system ---
    #[error( "no attribute type registered under tag {0}" )]
    UnknownTypeTag( TypeTag ),

    #[error( "cannot parse {token:?} as {type_name}: {reason}" )]
    Parse { token: String, type_name: String, reason: String },

    // --- tuple shape ---
    #[error( "tuple has {got} values but the schema has {expected} attributes" )]
    TupleArity { expected: usize, got: usize },

    #[error( "attribute {0} has no value" )]
    MissingValue( usize ),

    #[error( "attribute index {attr} is out of range for {len} attributes" )]
    AttrOutOfRange { attr: usize, len: usize },

    // --- protocol ---
    #[error( "{operation} is not allowed in phase {actual:?}" )]
    Phase { operation: &'static str, actual: Phase },

    // --- queries ---
    #[error( "value {value} of attribute {attr} has zero probability in its context" )]
    Unencodable { attr: usize, value: String },

    #[error( "attribute {0} was learned from no data" )]
    EmptyModel( usize ),

    #[error( "decode point {0} lies outside [0, 1)" )]
    InvalidPoint( f64 ),

    #[error( "got {got} decode points for {expected} attributes" )]
    PointCount { expected: usize, got: usize },

    // --- external ---
    #[error( "I/O error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Serde JSON error: {0}" )]
    SerdeJson( #[from] serde_json::Error ),
}

pub type Result<T> = std::result::Result<T, Error>;
