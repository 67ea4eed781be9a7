// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for stream classification and muxer selection.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while selecting a muxer or driving the selection state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Selection was requested before any stream was probed.
    #[error("No streams to mux")]
    NoStreams,

    /// None of the candidates accepts every probed stream.
    #[error("No muxer accepts streams [{streams}]")]
    NoMuxer {
        /// Comma-separated list of the probed encodings.
        streams: String,
    },

    /// A stream with the same name is already tracked.
    #[error("Stream '{0}' already exists")]
    DuplicateStream(String),

    /// The named stream is not tracked.
    #[error("Unknown stream '{0}'")]
    UnknownStream(String),

    /// A stream was added after the muxer had been instantiated.
    #[error("Stream '{0}' added after muxer selection")]
    LateStream(String),

    /// The requested phase change is not allowed from the current phase.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Phase the selector was in.
        from: &'static str,
        /// Phase that was requested.
        to: &'static str,
    },
}
