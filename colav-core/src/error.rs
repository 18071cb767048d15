//! Error types for the COLAV core

use thiserror::Error;

/// Errors raised while interpreting geodetic input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Hemisphere letter was not one of N, S, E, W
    #[error("Unknown hemisphere indicator: {0:?}")]
    UnknownHemisphere(String),
}

/// Errors raised when validating a ship-domain table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Table does not cover every encounter class
    #[error("Domain table is missing class {0}")]
    MissingClass(crate::encounter::EncounterClass),

    /// The d/z1/z2 arrays of one class differ in length
    #[error("Domain for {class} has unequal array lengths: d={d}, z1={z1}, z2={z2}")]
    LengthMismatch {
        class: crate::encounter::EncounterClass,
        d: usize,
        z1: usize,
        z2: usize,
    },

    /// A class has an empty domain polygon
    #[error("Domain for {0} is empty")]
    Empty(crate::encounter::EncounterClass),

    /// A distance multiplier is zero or negative
    #[error("Domain for {class} has non-positive distance multiplier {value} at index {index}")]
    NonPositiveDistance {
        class: crate::encounter::EncounterClass,
        index: usize,
        value: f64,
    },
}

/// Errors raised when dispatching a typed input record
#[derive(Error, Debug)]
pub enum RecordError {
    /// `message_id` value matched no known record type
    #[error("Unknown message_id: {0:?}")]
    UnknownMessageId(String),

    /// Record is missing the `message_id` field entirely
    #[error("Record has no message_id field")]
    MissingMessageId,

    /// Record did not deserialize into its typed form
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
