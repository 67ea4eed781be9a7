//! GStreamer Plugin for automatic muxer selection
//!
//! This crate implements a GStreamer plugin providing one element:
//!
//! - **automuxerbin**: a bin that probes each incoming elementary stream,
//!   selects a container muxer able to carry all of them, links the streams
//!   into it and exposes the muxed output on a dynamic source pad
//!
//! ## Supported Streams
//! - **Video**: raw video (converted to a layout the muxer takes), VP8, VP9,
//!   H.264, H.265, Windows Media Video
//! - **Audio**: raw audio; compressed audio whenever an installed muxer
//!   accepts its caps
//!
//! The selection logic itself lives in the [`automux`] crate.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::non_send_fields_in_send_ty, unused_doc_comments)]

use gst::glib;
use gstreamer as gst;

/// Automatic muxer bin element
pub mod automuxerbin;

/// Initializes the plugin by registering all elements with GStreamer.
fn plugin_init(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    automuxerbin::register(plugin)?;

    Ok(())
}

gst::plugin_define!(
    automux,
    env!("CARGO_PKG_DESCRIPTION"),
    plugin_init,
    concat!(env!("CARGO_PKG_VERSION"), "-", env!("COMMIT_ID")),
    "Apache-2.0",
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_REPOSITORY"),
    env!("BUILD_REL_DATE")
);
