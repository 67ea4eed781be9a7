//! Auto Muxer Bin Implementation
//!
//! This module contains the core implementation of the automuxerbin element.
//! It implements GStreamer's Bin trait, handling:
//! - Property management (muxer preferences, parser insertion, read-only results)
//! - Request sink pads, each backed by a typefind element
//! - The `have-type` callback driving muxer selection
//! - Teardown of the muxer chain when going back to READY
//!
//! ## GStreamer Bin Overview (for non-GStreamer developers)
//! A Bin is an element that contains other elements. Its pads are ghost pads
//! forwarding to pads of the children, and its state changes are propagated
//! to every child. Children added while the bin is already running have to
//! be brought to the bin state with `sync_state_with_parent`.
//!
//! ## Implementation Structure
//! - `AutoMuxerBin`: The struct holding element state (settings, state)
//! - `ObjectImpl`: GObject property system integration
//! - `ElementImpl`: Metadata, pad templates, request pads, state changes
//! - `BinImpl`: Default bin behaviour

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use automux::Encoding;
use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gstreamer as gst;
use tracing::trace;

use std::sync::LazyLock;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::automuxerbin;
use crate::automuxerbin::build;
use crate::automuxerbin::catalog;
use crate::automuxerbin::probe;
use crate::automuxerbin::state::DEFAULT_DENIED_MUXERS;
use crate::automuxerbin::state::DEFAULT_INSERT_PARSERS;
use crate::automuxerbin::state::DEFAULT_MIN_RANK;
use crate::automuxerbin::state::DEFAULT_PREFERRED_MUXERS;
use crate::automuxerbin::state::Settings;
use crate::automuxerbin::state::State;
use crate::automuxerbin::state::Stream;

/// GStreamer debug category for logging automuxerbin-specific messages
pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "automuxerbin",
        gst::DebugColorFlags::empty(),
        Some("Auto Muxer Bin"),
    )
});

/// Auto Muxer Bin element implementation.
#[derive(Default)]
pub struct AutoMuxerBin {
    /// User-configurable properties (preferences, min rank, parsers)
    settings: Mutex<Settings>,

    /// Streams, selection progress and the built chain
    state: Mutex<State>,
}

/// Registers this type as a GLib object subclass
#[glib::object_subclass]
impl ObjectSubclass for AutoMuxerBin {
    const NAME: &'static str = "GstRsAutoMuxerBin";

    type Type = automuxerbin::AutoMuxerBin;

    /// Parent class (Bin owns and drives the child elements)
    type ParentType = gst::Bin;
}

/// GObject property system implementation
impl ObjectImpl for AutoMuxerBin {
    fn properties() -> &'static [glib::ParamSpec] {
        static PROPERTIES: LazyLock<Vec<glib::ParamSpec>> = LazyLock::new(|| {
            vec![
                glib::ParamSpecString::builder("preferred-muxers")
                    .nick("Preferred muxers")
                    .blurb("Comma-separated muxer factories tried first (empty = built-in order)")
                    .default_value(DEFAULT_PREFERRED_MUXERS)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecString::builder("denied-muxers")
                    .nick("Denied muxers")
                    .blurb("Comma-separated muxer factories never selected")
                    .default_value(DEFAULT_DENIED_MUXERS)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecUInt::builder("min-rank")
                    .nick("Minimum rank")
                    .blurb("Lowest factory rank considered for muxers that are not preferred")
                    .default_value(DEFAULT_MIN_RANK)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecBoolean::builder("insert-parsers")
                    .nick("Insert parsers")
                    .blurb("Put a parser between compressed streams and the muxer")
                    .default_value(DEFAULT_INSERT_PARSERS)
                    .mutable_ready()
                    .build(),
                glib::ParamSpecString::builder("muxer")
                    .nick("Muxer")
                    .blurb("Factory name of the selected muxer")
                    .read_only()
                    .build(),
                glib::ParamSpecString::builder("selection")
                    .nick("Selection")
                    .blurb("JSON description of the streams and the selected muxer")
                    .read_only()
                    .build(),
            ]
        });

        PROPERTIES.as_ref()
    }

    fn constructed(&self) {
        self.parent_constructed();

        // Initialize tracing (debug/diagnostics feature)
        #[cfg(feature = "tracing")]
        {
            use tracing_subscriber::filter::LevelFilter;
            use tracing_subscriber::util::SubscriberInitExt;
            let _ = tracing_subscriber::fmt()
                .compact()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(false)
                .with_max_level(LevelFilter::TRACE)
                .with_ansi(true)
                .finish()
                .try_init();
        }
    }

    fn set_property(&self, _id: usize, value: &glib::Value, pspec: &glib::ParamSpec) {
        let Ok(mut settings) = self.settings.lock() else {
            gst::error!(CAT, imp = self, "Settings mutex poisoned, property change ignored");
            return;
        };

        match pspec.name() {
            "preferred-muxers" => {
                let muxers = value.get::<Option<String>>().ok().flatten().unwrap_or_default();
                gst::info!(
                    CAT,
                    imp = self,
                    "Changing preferred-muxers from '{}' to '{}'",
                    settings.preferred_muxers,
                    muxers
                );
                settings.preferred_muxers = muxers;
            }
            "denied-muxers" => {
                settings.denied_muxers =
                    value.get::<Option<String>>().ok().flatten().unwrap_or_default();
            }
            "min-rank" => {
                if let Ok(min_rank) = value.get::<u32>() {
                    settings.min_rank = min_rank;
                } else {
                    gst::error!(CAT, imp = self, "Invalid type for min-rank property");
                }
            }
            "insert-parsers" => {
                if let Ok(insert_parsers) = value.get::<bool>() {
                    settings.insert_parsers = insert_parsers;
                } else {
                    gst::error!(CAT, imp = self, "Invalid type for insert-parsers property");
                }
            }
            other => {
                gst::error!(CAT, imp = self, "Unknown property '{}'", other);
            }
        }
    }

    fn property(&self, _id: usize, pspec: &glib::ParamSpec) -> glib::Value {
        match pspec.name() {
            "muxer" | "selection" => {
                let Ok(state) = self.state() else {
                    gst::error!(CAT, imp = self, "State mutex poisoned");
                    return None::<String>.to_value();
                };

                if pspec.name() == "muxer" {
                    return state.selector.muxer().map(str::to_owned).to_value();
                }

                match serde_json::to_string(&state.selector.report()) {
                    Ok(json) => json.to_value(),
                    Err(err) => {
                        gst::error!(CAT, imp = self, "Failed to serialize selection: {}", err);
                        None::<String>.to_value()
                    }
                }
            }
            name => {
                let Ok(settings) = self.settings.lock() else {
                    gst::error!(CAT, imp = self, "Settings mutex poisoned");
                    return glib::Value::from(&"");
                };

                match name {
                    "preferred-muxers" => settings.preferred_muxers.to_value(),
                    "denied-muxers" => settings.denied_muxers.to_value(),
                    "min-rank" => settings.min_rank.to_value(),
                    "insert-parsers" => settings.insert_parsers.to_value(),
                    _ => {
                        gst::error!(CAT, imp = self, "Unknown property {}", name);
                        glib::Value::from(&"")
                    }
                }
            }
        }
    }
}

/// GStreamer object implementation (inherits from GstObject)
impl GstObjectImpl for AutoMuxerBin {}

/// GStreamer element implementation (metadata, pads, state changes)
impl ElementImpl for AutoMuxerBin {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: LazyLock<gst::subclass::ElementMetadata> = LazyLock::new(|| {
            gst::subclass::ElementMetadata::new(
                "Auto Muxer Bin",
                "Codec/Muxer/Bin",
                "Muxes elementary streams with an automatically selected muxer",
                "Contributors to the Media eXchange Layer project",
            )
        });

        Some(&*ELEMENT_METADATA)
    }

    fn pad_templates() -> &'static [gst::PadTemplate] {
        static PAD_TEMPLATES: LazyLock<Result<Vec<gst::PadTemplate>, glib::BoolError>> =
            LazyLock::new(|| {
                let caps = gst::Caps::new_any();
                let sink_pad_template = gst::PadTemplate::new(
                    "sink_%u",
                    gst::PadDirection::Sink,
                    gst::PadPresence::Request,
                    &caps,
                )?;
                let src_pad_template = gst::PadTemplate::new(
                    "src_%u",
                    gst::PadDirection::Src,
                    gst::PadPresence::Sometimes,
                    &caps,
                )?;

                Ok(vec![sink_pad_template, src_pad_template])
            });

        match PAD_TEMPLATES.as_ref() {
            Ok(templates) => templates,
            Err(err) => {
                gst::error!(CAT, "Failed to create pad templates: {:?}", err);
                &[]
            }
        }
    }

    /// Hands out a new `sink_%u` pad backed by a typefind.
    ///
    /// Streams can only be added until the muxer has been selected.
    fn request_new_pad(
        &self,
        templ: &gst::PadTemplate,
        name: Option<&str>,
        _caps: Option<&gst::Caps>,
    ) -> Option<gst::Pad> {
        match self.add_stream(templ, name) {
            Ok(pad) => Some(pad),
            Err(err) => {
                self.post_error_message(err);
                None
            }
        }
    }

    fn release_pad(&self, pad: &gst::Pad) {
        let name = pad.name().to_string();

        let (stream, muxer, ready) = {
            let Ok(mut state) = self.state() else {
                gst::error!(CAT, imp = self, "State mutex poisoned, {} not released", name);
                return;
            };
            state.selector.remove_stream(&name);
            let stream = state.streams.remove(&name);
            let ready = state.selector.take_ready();
            (stream, state.muxer.clone(), ready)
        };

        let Some(stream) = stream else {
            gst::warning!(CAT, imp = self, "Releasing unknown pad {}", name);
            return;
        };

        build::remove_ghost_pad(self, &stream.sinkpad);
        if let Some(adapter) = &stream.adapter {
            build::remove_element(self, adapter);
        }
        build::remove_element(self, &stream.typefind);

        if let (Some(muxer), Some(muxer_pad)) = (&muxer, &stream.muxer_pad) {
            catalog::release_muxer_pad(muxer, muxer_pad);
        }

        gst::debug!(CAT, imp = self, "Released {}", name);

        // The released stream may have been the last one still probing
        if let Some(streams) = ready {
            self.select_and_link(&streams);
        }
    }

    fn change_state(
        &self,
        transition: gst::StateChange,
    ) -> Result<gst::StateChangeSuccess, gst::StateChangeError> {
        let success = self.parent_change_state(transition)?;

        if transition == gst::StateChange::PausedToReady {
            build::teardown(self);
            gst::info!(CAT, imp = self, "Muxer chain torn down");
        }

        Ok(success)
    }
}

/// Bin implementation (children are managed by the parent class)
impl BinImpl for AutoMuxerBin {}

impl AutoMuxerBin {
    pub(crate) fn state(&self) -> Result<MutexGuard<'_, State>, gst::ErrorMessage> {
        self.state.lock().map_err(|e| {
            gst::error_msg!(
                gst::CoreError::Failed,
                ["Failed to get state mutex: {}", e]
            )
        })
    }

    /// Creates the typefind and the ghost sink pad for a new stream.
    fn add_stream(
        &self,
        templ: &gst::PadTemplate,
        requested: Option<&str>,
    ) -> Result<gst::Pad, gst::ErrorMessage> {
        let stream_name = {
            let mut state = self.state()?;
            let stream_name = state.sink_pad_name(requested);
            state
                .selector
                .add_stream(&stream_name)
                .map_err(|e| gst::error_msg!(gst::StreamError::Failed, ["{}", e]))?;
            stream_name
        };

        let stream = match self.make_stream(templ, &stream_name) {
            Ok(stream) => stream,
            Err(err) => {
                if let Ok(mut state) = self.state() {
                    state.selector.remove_stream(&stream_name);
                }
                return Err(err);
            }
        };

        let sinkpad = stream.sinkpad.clone();
        let typefind = stream.typefind.clone();
        self.state()?.streams.insert(stream_name.clone(), stream);

        if let Err(err) = self.obj().add_pad(&sinkpad) {
            if let Ok(mut state) = self.state() {
                state.streams.remove(&stream_name);
                state.selector.remove_stream(&stream_name);
            }
            if let Err(err) = sinkpad.set_active(false) {
                gst::warning!(CAT, imp = self, "Failed to deactivate {}: {}", stream_name, err);
            }
            build::remove_element(self, &typefind);

            return Err(gst::error_msg!(
                gst::CoreError::Pad,
                ["Failed to add {}: {}", stream_name, err]
            ));
        }

        gst::debug!(CAT, imp = self, "Added stream {}", stream_name);
        Ok(sinkpad.upcast())
    }

    fn make_stream(
        &self,
        templ: &gst::PadTemplate,
        stream_name: &str,
    ) -> Result<Stream, gst::ErrorMessage> {
        let typefind = probe::make_typefind(stream_name).map_err(|e| {
            gst::error_msg!(
                gst::CoreError::MissingPlugin,
                ["Failed to create typefind: {}", e]
            )
        })?;
        self.obj().add(&typefind).map_err(|e| {
            gst::error_msg!(
                gst::CoreError::Failed,
                ["Failed to add {}: {}", typefind.name(), e]
            )
        })?;

        self.wire_stream(templ, stream_name, typefind.clone())
            .inspect_err(|_| build::remove_element(self, &typefind))
    }

    /// Blocks the typefind output, watches its type and puts a ghost pad in
    /// front of it.
    fn wire_stream(
        &self,
        templ: &gst::PadTemplate,
        stream_name: &str,
        typefind: gst::Element,
    ) -> Result<Stream, gst::ErrorMessage> {
        let obj = self.obj();

        let missing_pad = |name: &str| {
            gst::error_msg!(
                gst::CoreError::Pad,
                ["typefind has no '{}' pad", name]
            )
        };
        let typefind_sink = typefind.static_pad("sink").ok_or_else(|| missing_pad("sink"))?;
        let typefind_src = typefind.static_pad("src").ok_or_else(|| missing_pad("src"))?;

        let block = probe::block(&typefind_src);

        let weak = obj.downgrade();
        let name = stream_name.to_owned();
        typefind.connect("have-type", false, move |args| {
            let obj = weak.upgrade()?;
            let caps = args.get(2)?.get::<gst::Caps>().ok()?;
            obj.imp().handle_have_type(&name, &caps);
            None
        });

        let sinkpad = gst::GhostPad::builder_from_template_with_target(templ, &typefind_sink)
            .map_err(|e| {
                gst::error_msg!(
                    gst::CoreError::Pad,
                    ["Failed to create {}: {}", stream_name, e]
                )
            })?
            .name(stream_name)
            .build();

        typefind.sync_state_with_parent().map_err(|e| {
            gst::error_msg!(
                gst::CoreError::StateChange,
                ["Failed to start {}: {}", typefind.name(), e]
            )
        })?;
        sinkpad.set_active(true).map_err(|e| {
            gst::error_msg!(
                gst::CoreError::Pad,
                ["Failed to activate {}: {}", stream_name, e]
            )
        })?;

        Ok(Stream {
            sinkpad,
            typefind,
            block,
            caps: None,
            adapter: None,
            muxer_pad: None,
        })
    }

    /// Records the type found for `stream_name`; selects and links the
    /// muxer once every stream is typed.
    ///
    /// Runs on the streaming thread of the stream's typefind.
    fn handle_have_type(&self, stream_name: &str, caps: &gst::Caps) {
        let Some(encoding) = probe::classify(caps) else {
            gst::element_imp_error!(
                self,
                gst::StreamError::TypeNotFound,
                ["Could not classify caps {} on {}", caps, stream_name]
            );
            return;
        };

        gst::debug!(
            CAT,
            imp = self,
            "Stream {} is {} ({})",
            stream_name,
            encoding,
            caps
        );

        let ready = match self.state() {
            Ok(mut state) => {
                if let Some(stream) = state.streams.get_mut(stream_name) {
                    stream.caps = Some(caps.clone());
                }
                state.selector.stream_typed(stream_name, encoding)
            }
            Err(err) => {
                self.post_error_message(err);
                return;
            }
        };

        match ready {
            Ok(Some(streams)) => self.select_and_link(&streams),
            Ok(None) => trace!(stream = stream_name, "waiting for other streams"),
            Err(err) => {
                gst::element_imp_error!(self, gst::StreamError::Format, ["{}", err]);
            }
        }
    }

    fn select_and_link(&self, streams: &[(String, Encoding)]) {
        if let Err(err) = self.try_select_and_link(streams) {
            gst::error!(CAT, imp = self, "Muxer selection failed: {:?}", err);
            build::rollback(self);
            self.post_error_message(err);
        }
    }

    fn try_select_and_link(&self, streams: &[(String, Encoding)]) -> Result<(), gst::ErrorMessage> {
        let settings = self
            .settings
            .lock()
            .map_err(|e| {
                gst::error_msg!(
                    gst::CoreError::Failed,
                    ["Failed to get settings mutex: {}", e]
                )
            })?
            .clone();

        let policy = settings.policy();
        let encodings: Vec<Encoding> = streams.iter().map(|(_, encoding)| encoding.clone()).collect();
        let candidates = catalog::muxer_candidates(&encodings);

        let missing = policy.missing_preferred(&candidates);
        if !missing.is_empty() {
            gst::element_imp_warning!(
                self,
                gst::CoreError::MissingPlugin,
                ["Preferred muxers not installed: {}", missing.join(", ")]
            );
        }

        let muxer_name = policy
            .select(&encodings, &candidates)
            .map(|candidate| candidate.name.clone())
            .map_err(|e| gst::error_msg!(gst::StreamError::Format, ["{}", e]))?;

        let muxer = build::instantiate_muxer(self, &muxer_name)?;
        build::link_streams(self, &muxer, streams, settings.insert_parsers)?;
        build::expose_output(self, &muxer)?;
        build::unblock_streams(self)?;

        self.obj().notify("muxer");
        Ok(())
    }
}
