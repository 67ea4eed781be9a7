//! Automatic Muxer Bin Element
//!
//! This module implements `automuxerbin`, a GStreamer bin that turns one or
//! more elementary streams into a single container stream without the
//! application having to know which muxer fits.
//!
//! ## Responsibilities
//! - Hands out `sink_%u` request pads, one per upstream stream
//! - Probes each stream with an internal `typefind`
//! - Selects one muxer for the whole set of streams
//! - Inserts a converter for raw streams and, optionally, a parser for
//!   compressed ones
//! - Exposes the muxer output on a `src_%u` sometimes pad (`pad-added`)
//!
//! ## Properties (set before PAUSED state)
//! - `preferred-muxers`: comma-separated factory names tried first
//! - `denied-muxers`: comma-separated factory names never used
//! - `min-rank`: lowest factory rank considered for non-preferred muxers
//! - `insert-parsers`: put a parser in front of the muxer for compressed streams
//! - `muxer` (read-only): selected muxer factory
//! - `selection` (read-only): JSON description of the selection
//!
//! ## Example Pipeline
//! ```bash
//! gst-launch-1.0 videotestsrc num-buffers=100 ! vp8enc ! \
//!     automuxerbin ! filesink location=out.mkv
//! ```

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;

/// Dynamic pipeline construction (muxer, adapters, output pad)
mod build;

/// Installed muxer and parser lookup
mod catalog;

/// Core implementation (properties, pads, state changes)
mod imp;

/// Stream probing (typefind setup, caps classification)
mod probe;

/// Settings and runtime state
mod state;

/// GLib wrapper type for the AutoMuxerBin element.
///
/// ## Inheritance Chain (GStreamer class hierarchy)
/// - `gst::Object`
/// - `gst::Element`
/// - `gst::Bin` (owns the typefind, adapter and muxer children)
/// - `AutoMuxerBin`
glib::wrapper! {
    pub struct AutoMuxerBin(ObjectSubclass<imp::AutoMuxerBin>) @extends gst::Bin, gst::Element, gst::Object;
}

/// Registers the automuxerbin element with GStreamer.
///
/// The rank is NONE: the bin is only used when requested by name.
pub fn register(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    gst::Element::register(
        Some(plugin),
        "automuxerbin",
        gst::Rank::NONE,
        AutoMuxerBin::static_type(),
    )
}
