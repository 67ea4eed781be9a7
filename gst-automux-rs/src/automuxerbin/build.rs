//! Dynamic Pipeline Construction for automuxerbin
//!
//! Once a muxer has been selected, this module builds the inside of the bin:
//!
//! ```text
//! sink_0 ─► typefind ─► [videoconvert | parser] ─┐
//! sink_1 ─► typefind ─► [audioconvert | parser] ─┼─► muxer ─► src_0
//!   ...                                          ┘
//! ```
//!
//! The order is fixed: add the muxer, link every stream, sync the new
//! elements with the bin state, expose `src_0`, and only then remove the
//! blocking probes. Going back to READY undoes all of it, and so does a
//! failure on the way, except that the probed types are kept.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use automux::Encoding;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gstreamer as gst;
use tracing::trace;

use crate::automuxerbin::catalog;
use crate::automuxerbin::imp::{AutoMuxerBin, CAT};
use crate::automuxerbin::probe;

/// Name of the single output pad.
pub(crate) const SRC_PAD_NAME: &str = "src_0";

/// Creates the muxer and adds it to the bin.
pub(crate) fn instantiate_muxer(
    imp: &AutoMuxerBin,
    factory_name: &str,
) -> Result<gst::Element, gst::ErrorMessage> {
    let muxer = gst::ElementFactory::make(factory_name)
        .name("muxer")
        .build()
        .map_err(|e| {
            gst::error_msg!(
                gst::CoreError::MissingPlugin,
                ["Failed to create muxer '{}': {}", factory_name, e]
            )
        })?;

    imp.obj().add(&muxer).map_err(|e| {
        gst::error_msg!(
            gst::CoreError::Failed,
            ["Failed to add muxer '{}': {}", factory_name, e]
        )
    })?;

    let mut state = imp.state()?;
    state.muxer = Some(muxer.clone());
    state
        .selector
        .muxer_instantiated(factory_name)
        .map_err(|e| gst::error_msg!(gst::CoreError::Failed, ["{}", e]))?;

    gst::info!(CAT, imp = imp, "Instantiated muxer {}", factory_name);
    Ok(muxer)
}

/// Converter for raw streams, parser for compressed ones when enabled and
/// installed, nothing otherwise.
fn make_adapter(
    stream_name: &str,
    encoding: &Encoding,
    caps: Option<&gst::Caps>,
    insert_parsers: bool,
) -> Result<Option<gst::Element>, gst::ErrorMessage> {
    if let Some(converter) = encoding.raw_converter() {
        return gst::ElementFactory::make(converter)
            .name(format!("{converter}_{stream_name}"))
            .build()
            .map(Some)
            .map_err(|e| {
                gst::error_msg!(
                    gst::CoreError::MissingPlugin,
                    ["Failed to create '{}': {}", converter, e]
                )
            });
    }

    let Some(caps) = caps.filter(|_| insert_parsers) else {
        return Ok(None);
    };

    match catalog::find_parser(caps, encoding) {
        Some(factory) => factory
            .create()
            .name(format!("parser_{stream_name}"))
            .build()
            .map(Some)
            .map_err(|e| {
                gst::error_msg!(
                    gst::CoreError::MissingPlugin,
                    ["Failed to create parser '{}': {}", factory.name(), e]
                )
            }),
        None => Ok(None),
    }
}

fn static_pad(element: &gst::Element, name: &str) -> Result<gst::Pad, gst::ErrorMessage> {
    element.static_pad(name).ok_or_else(|| {
        gst::error_msg!(
            gst::CoreError::Pad,
            ["Element {} has no '{}' pad", element.name(), name]
        )
    })
}

fn link(src: &gst::Pad, sink: &gst::Pad) -> Result<(), gst::ErrorMessage> {
    src.link(sink).map(|_| ()).map_err(|e| {
        gst::error_msg!(
            gst::CoreError::Negotiation,
            ["Failed to link {} to {}: {:?}", src.name(), sink.name(), e]
        )
    })
}

/// Records the elements serving `stream_name` as soon as they are in the
/// bin, so that a failure further down can remove them.
fn remember(
    imp: &AutoMuxerBin,
    stream_name: &str,
    adapter: Option<&gst::Element>,
    muxer_pad: Option<&gst::Pad>,
) -> Result<(), gst::ErrorMessage> {
    let mut state = imp.state()?;
    if let Some(stream) = state.streams.get_mut(stream_name) {
        if let Some(adapter) = adapter {
            stream.adapter = Some(adapter.clone());
        }
        if let Some(muxer_pad) = muxer_pad {
            stream.muxer_pad = Some(muxer_pad.clone());
        }
    }
    Ok(())
}

/// Links one stream into the muxer, through an adapter if one applies.
fn link_stream(
    imp: &AutoMuxerBin,
    muxer: &gst::Element,
    stream_name: &str,
    encoding: &Encoding,
    insert_parsers: bool,
) -> Result<(), gst::ErrorMessage> {
    let (typefind, caps) = {
        let state = imp.state()?;
        let stream = state.streams.get(stream_name).ok_or_else(|| {
            gst::error_msg!(gst::CoreError::Failed, ["Unknown stream {}", stream_name])
        })?;
        (stream.typefind.clone(), stream.caps.clone())
    };

    let adapter = make_adapter(stream_name, encoding, caps.as_ref(), insert_parsers)?;

    let mut upstream = static_pad(&typefind, "src")?;
    if let Some(adapter) = &adapter {
        imp.obj().add(adapter).map_err(|e| {
            gst::error_msg!(
                gst::CoreError::Failed,
                ["Failed to add {}: {}", adapter.name(), e]
            )
        })?;
        remember(imp, stream_name, Some(adapter), None)?;
        link(&upstream, &static_pad(adapter, "sink")?)?;
        upstream = static_pad(adapter, "src")?;
    }

    let muxer_pad =
        catalog::muxer_sink_pad(muxer, &catalog::selection_caps(encoding)).ok_or_else(|| {
            gst::error_msg!(
                gst::StreamError::Format,
                ["Muxer {} has no free pad for {}", muxer.name(), encoding]
            )
        })?;
    remember(imp, stream_name, None, Some(&muxer_pad))?;
    link(&upstream, &muxer_pad)?;

    if let Some(adapter) = &adapter {
        adapter.sync_state_with_parent().map_err(|e| {
            gst::error_msg!(
                gst::CoreError::StateChange,
                ["Failed to start {}: {}", adapter.name(), e]
            )
        })?;
    }

    gst::debug!(
        CAT,
        imp = imp,
        "Linked {} ({}) to {}{}",
        stream_name,
        encoding,
        muxer_pad.name(),
        adapter
            .as_ref()
            .map(|a| format!(" through {}", a.name()))
            .unwrap_or_default()
    );

    Ok(())
}

/// Links every stream into `muxer` and starts the muxer.
pub(crate) fn link_streams(
    imp: &AutoMuxerBin,
    muxer: &gst::Element,
    streams: &[(String, Encoding)],
    insert_parsers: bool,
) -> Result<(), gst::ErrorMessage> {
    for (stream_name, encoding) in streams {
        link_stream(imp, muxer, stream_name, encoding, insert_parsers)?;
    }

    muxer.sync_state_with_parent().map_err(|e| {
        gst::error_msg!(
            gst::CoreError::StateChange,
            ["Failed to start muxer {}: {}", muxer.name(), e]
        )
    })
}

/// Exposes the muxer output as `src_0` and announces it.
///
/// Must be called without holding the state lock: `pad-added` handlers run
/// synchronously and may query the element.
pub(crate) fn expose_output(
    imp: &AutoMuxerBin,
    muxer: &gst::Element,
) -> Result<(), gst::ErrorMessage> {
    let obj = imp.obj();
    let target = static_pad(muxer, "src")?;
    let templ = obj.pad_template("src_%u").ok_or_else(|| {
        gst::error_msg!(gst::CoreError::Pad, ["No src_%u pad template"])
    })?;

    let srcpad = gst::GhostPad::builder_from_template_with_target(&templ, &target)
        .map_err(|e| gst::error_msg!(gst::CoreError::Pad, ["Failed to create src pad: {}", e]))?
        .name(SRC_PAD_NAME)
        .build();

    {
        let mut state = imp.state()?;
        state
            .selector
            .linked()
            .map_err(|e| gst::error_msg!(gst::CoreError::Pad, ["{}", e]))?;
        state.srcpad = Some(srcpad.clone());
    }

    srcpad
        .set_active(true)
        .map_err(|e| gst::error_msg!(gst::CoreError::Pad, ["Failed to activate src pad: {}", e]))?;
    obj.add_pad(&srcpad)
        .map_err(|e| gst::error_msg!(gst::CoreError::Pad, ["Failed to add src pad: {}", e]))?;
    obj.no_more_pads();

    gst::info!(CAT, imp = imp, "Exposed {}", SRC_PAD_NAME);
    Ok(())
}

/// Lets data flow out of every typefind.
pub(crate) fn unblock_streams(imp: &AutoMuxerBin) -> Result<(), gst::ErrorMessage> {
    let blocked: Vec<(gst::Element, gst::PadProbeId)> = {
        let mut state = imp.state()?;
        state
            .streams
            .values_mut()
            .filter_map(|stream| {
                stream
                    .block
                    .take()
                    .map(|block| (stream.typefind.clone(), block))
            })
            .collect()
    };

    for (typefind, block) in blocked {
        trace!(typefind = %typefind.name(), "unblocking");
        if let Some(pad) = typefind.static_pad("src") {
            pad.remove_probe(block);
        }
    }

    Ok(())
}

/// Stops `element` and takes it out of the bin.
pub(crate) fn remove_element(imp: &AutoMuxerBin, element: &gst::Element) {
    if let Err(err) = element.set_state(gst::State::Null) {
        gst::warning!(CAT, imp = imp, "Failed to stop {}: {}", element.name(), err);
    }
    if let Err(err) = imp.obj().remove(element) {
        gst::warning!(CAT, imp = imp, "Failed to remove {}: {}", element.name(), err);
    }
}

/// Deactivates a ghost pad and takes it off the bin.
pub(crate) fn remove_ghost_pad(imp: &AutoMuxerBin, pad: &gst::GhostPad) {
    if let Err(err) = pad.set_active(false) {
        gst::warning!(CAT, imp = imp, "Failed to deactivate {}: {}", pad.name(), err);
    }
    if let Err(err) = imp.obj().remove_pad(pad) {
        gst::warning!(CAT, imp = imp, "Failed to remove {}: {}", pad.name(), err);
    }
}

/// What happens to the probed types when the chain is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dismantle {
    /// Back to READY: every stream is probed again on restart
    Reset,
    /// Selection failed: types are kept, the set may be handed out again
    Retry,
}

/// Removes the muxer, the adapters and the output pad, and re-arms the
/// blocking probes so that the next run starts from scratch.
pub(crate) fn teardown(imp: &AutoMuxerBin) {
    dismantle(imp, Dismantle::Reset);
}

/// Undoes a partially built chain after a failed selection, leaving the
/// streams probed and blocked.
pub(crate) fn rollback(imp: &AutoMuxerBin) {
    dismantle(imp, Dismantle::Retry);
}

fn dismantle(imp: &AutoMuxerBin, mode: Dismantle) {
    let (muxer, srcpad, chains) = {
        let mut state = match imp.state() {
            Ok(state) => state,
            Err(err) => {
                gst::error!(CAT, imp = imp, "Teardown skipped: {:?}", err);
                return;
            }
        };

        match mode {
            Dismantle::Reset => state.selector.reset(),
            Dismantle::Retry => state.selector.selection_failed(),
        }

        let chains: Vec<_> = state
            .streams
            .iter_mut()
            .map(|(name, stream)| {
                if mode == Dismantle::Reset {
                    stream.caps = None;
                }
                (
                    name.clone(),
                    stream.typefind.clone(),
                    stream.adapter.take(),
                    stream.muxer_pad.take(),
                    stream.block.is_some(),
                )
            })
            .collect();

        (state.muxer.take(), state.srcpad.take(), chains)
    };

    if let Some(srcpad) = srcpad {
        remove_ghost_pad(imp, &srcpad);
    }

    let mut blocks = Vec::new();
    for (name, typefind, adapter, muxer_pad, blocked) in chains {
        if let Some(adapter) = adapter {
            remove_element(imp, &adapter);
        }

        if let (Some(muxer), Some(pad)) = (&muxer, &muxer_pad) {
            catalog::release_muxer_pad(muxer, pad);
        }

        if !blocked {
            if let Some(block) = typefind.static_pad("src").as_ref().and_then(probe::block) {
                blocks.push((name, block));
            }
        }
    }

    if let Some(muxer) = muxer {
        remove_element(imp, &muxer);
        gst::debug!(CAT, imp = imp, "Removed muxer {}", muxer.name());
    }

    if let Ok(mut state) = imp.state() {
        for (name, block) in blocks {
            if let Some(stream) = state.streams.get_mut(&name) {
                stream.block = Some(block);
            }
        }
    }
}
