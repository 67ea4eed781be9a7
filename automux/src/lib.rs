// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # automux
//!
//! Framework-independent core of the `automuxerbin` GStreamer element.
//!
//! The element probes every incoming stream, picks one container muxer that
//! can carry all of them and links the streams into it. This crate holds the
//! parts of that job that do not need GStreamer:
//!
//! - [`Encoding`]: classification of a stream from its caps media type
//! - [`SelectionPolicy`]: choice of one muxer among [`MuxerCandidate`]s
//! - [`Selector`]: per-bin bookkeeping of streams and selection progress
//!
//! ## Example
//!
//! ```
//! use automux::{Encoding, MuxerCandidate, SelectionPolicy, Selector};
//!
//! # fn main() -> automux::Result<()> {
//! let mut selector = Selector::new();
//! selector.add_stream("sink_0")?;
//!
//! let streams = selector
//!     .stream_typed("sink_0", Encoding::Vp8)?
//!     .expect("single stream completes the set");
//!
//! let candidates = vec![
//!     MuxerCandidate::new("webmmux", 256).accepting(Encoding::Vp8),
//!     MuxerCandidate::new("mp4mux", 256).accepting(Encoding::H264),
//! ];
//! let encodings: Vec<Encoding> = streams.into_iter().map(|(_, e)| e).collect();
//! let muxer = SelectionPolicy::default().select(&encodings, &candidates)?;
//! assert_eq!(muxer.name, "webmmux");
//!
//! selector.muxer_instantiated(&muxer.name)?;
//! selector.linked()?;
//! assert!(selector.is_linked());
//! # Ok(())
//! # }
//! ```

pub mod encoding;
pub mod error;
pub mod policy;
pub mod state;

pub use encoding::{Encoding, StreamKind};
pub use error::{Error, Result};
pub use policy::{DEFAULT_PREFERRED_MUXERS, MuxerCandidate, RANK_MARGINAL, SelectionPolicy};
pub use state::{Phase, SelectionReport, Selector, StreamReport};
