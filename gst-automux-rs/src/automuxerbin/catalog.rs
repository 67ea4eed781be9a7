//! Installed muxer and parser lookup for automuxerbin
//!
//! Translates the GStreamer registry into [`MuxerCandidate`]s for the
//! selection policy, and finds parsers and muxer pads for the builder.
//!
//! ## Selection caps
//! Muxer templates are matched against caps holding only the media type and
//! the identifying version field of a stream (see
//! [`automux::Encoding::version_field`]). Fields such as `stream-format` are
//! left out: the parser inserted in front of the muxer converts them.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use automux::{Encoding, MuxerCandidate};
use gst::glib::translate::IntoGlib;
use gst::prelude::*;
use gstreamer as gst;

pub(crate) fn selection_caps(encoding: &Encoding) -> gst::Caps {
    let mut builder = gst::Caps::builder(encoding.media_type());
    if let Some((field, value)) = encoding.version_field() {
        builder = builder.field(field, value);
    }
    builder.build()
}

fn rank_of(factory: &gst::ElementFactory) -> i32 {
    factory.rank().into_glib()
}

/// Sink template caps of `factory`, skipping ANY templates.
fn sink_caps(factory: &gst::ElementFactory) -> Vec<gst::Caps> {
    factory
        .static_pad_templates()
        .iter()
        .filter(|templ| templ.direction() == gst::PadDirection::Sink)
        .map(|templ| templ.caps())
        .filter(|caps| !caps.is_any())
        .collect()
}

fn has_always_src(factory: &gst::ElementFactory) -> bool {
    factory.static_pad_templates().iter().any(|templ| {
        templ.direction() == gst::PadDirection::Src
            && templ.presence() == gst::PadPresence::Always
    })
}

/// Every installed muxer usable inside the bin, with the subset of
/// `encodings` each one accepts.
///
/// Muxers without an always-present source pad (sink bins such as
/// `splitmuxsink`) and muxers taking ANY caps are left out.
pub(crate) fn muxer_candidates(encodings: &[Encoding]) -> Vec<MuxerCandidate> {
    let factories = gst::ElementFactory::factories_with_type(
        gst::ElementFactoryType::MUXER,
        gst::Rank::NONE,
    );

    let selection: Vec<(&Encoding, gst::Caps)> = encodings
        .iter()
        .map(|encoding| (encoding, selection_caps(encoding)))
        .collect();

    factories
        .iter()
        .filter(|factory| has_always_src(factory))
        .filter_map(|factory| {
            let templates = sink_caps(factory);
            if templates.is_empty() {
                return None;
            }

            let mut candidate = MuxerCandidate::new(factory.name().as_str(), rank_of(factory));
            for (encoding, caps) in &selection {
                if templates.iter().any(|templ| templ.can_intersect(caps)) {
                    candidate.accept((*encoding).clone());
                }
            }

            Some(candidate)
        })
        .collect()
}

/// Highest ranked parser taking `caps` and producing the same media type.
pub(crate) fn find_parser(caps: &gst::Caps, encoding: &Encoding) -> Option<gst::ElementFactory> {
    let output = selection_caps(encoding);

    gst::ElementFactory::factories_with_type(
        gst::ElementFactoryType::PARSER,
        gst::Rank::MARGINAL,
    )
    .iter()
    .filter(|factory| sink_caps(factory).iter().any(|templ| templ.can_intersect(caps)))
    .filter(|factory| {
        factory.static_pad_templates().iter().any(|templ| {
            let templ_caps = templ.caps();
            templ.direction() == gst::PadDirection::Src
                && !templ_caps.is_any()
                && templ_caps.can_intersect(&output)
        })
    })
    .max_by_key(|factory| rank_of(factory))
    .cloned()
}

/// Sink pad of `muxer` able to take `caps`: a new request pad, or a free
/// always pad.
pub(crate) fn muxer_sink_pad(muxer: &gst::Element, caps: &gst::Caps) -> Option<gst::Pad> {
    muxer
        .pad_template_list()
        .iter()
        .filter(|templ| templ.direction() == gst::PadDirection::Sink)
        .filter(|templ| templ.caps().can_intersect(caps))
        .find_map(|templ| match templ.presence() {
            gst::PadPresence::Request => muxer.request_pad(templ, None, None),
            _ => muxer
                .static_pad(templ.name_template())
                .filter(|pad| !pad.is_linked()),
        })
}

/// Gives a muxer pad back, if it was requested.
pub(crate) fn release_muxer_pad(muxer: &gst::Element, pad: &gst::Pad) {
    let requested = pad
        .pad_template()
        .is_some_and(|templ| templ.presence() == gst::PadPresence::Request);

    if requested {
        muxer.release_request_pad(pad);
    }
}
