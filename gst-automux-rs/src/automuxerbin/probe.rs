//! Stream Probing for automuxerbin
//!
//! Every requested sink pad is backed by a `typefind` element. Its output is
//! held by a blocking probe until the whole stream set has been typed and a
//! muxer has been linked, so nothing leaves the bin before that.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use automux::Encoding;
use gst::glib;
use gst::prelude::*;
use gstreamer as gst;

/// Creates the typefind element probing the stream of `stream_name`.
pub(crate) fn make_typefind(stream_name: &str) -> Result<gst::Element, glib::BoolError> {
    gst::ElementFactory::make("typefind")
        .name(format!("typefind_{stream_name}"))
        .build()
}

/// Classifies the first structure of `caps`.
///
/// Returns `None` for empty or ANY caps.
pub(crate) fn classify(caps: &gst::CapsRef) -> Option<Encoding> {
    if caps.is_any() {
        return None;
    }

    let structure = caps.structure(0)?;
    Some(Encoding::classify(structure.name().as_str(), |field| {
        structure.get::<i32>(field).ok()
    }))
}

/// Holds all downstream data on `pad` until the probe is removed.
pub(crate) fn block(pad: &gst::Pad) -> Option<gst::PadProbeId> {
    pad.add_probe(gst::PadProbeType::BLOCK_DOWNSTREAM, |_pad, _info| {
        gst::PadProbeReturn::Ok
    })
}
