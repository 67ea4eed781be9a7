//! Settings and Runtime State for automuxerbin
//!
//! ## Key Types
//! - `Settings`: User-configurable properties (muxer preferences, parsers)
//! - `Stream`: One requested sink pad and the elements serving it
//! - `State`: Selection progress, the streams, the muxer and the output pad
//!
//! Unlike a source or sink element, the bin keeps its state across READY
//! transitions: request pads belong to the application. Only the muxer
//! chain is dropped when going back to READY.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use automux::{RANK_MARGINAL, SelectionPolicy, Selector};
use gstreamer as gst;

/// Default value for the preferred-muxers property (empty = built-in order only)
pub(crate) const DEFAULT_PREFERRED_MUXERS: &str = "";

/// Default value for the denied-muxers property
pub(crate) const DEFAULT_DENIED_MUXERS: &str = "";

/// Default value for the min-rank property (GST_RANK_MARGINAL)
pub(crate) const DEFAULT_MIN_RANK: u32 = RANK_MARGINAL as u32;

/// Default value for the insert-parsers property
pub(crate) const DEFAULT_INSERT_PARSERS: bool = true;

/// User-configurable settings for the automuxerbin element.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// Comma-separated muxer factories tried first
    pub preferred_muxers: String,

    /// Comma-separated muxer factories never selected
    pub denied_muxers: String,

    /// Lowest rank considered for muxers that are not preferred
    pub min_rank: u32,

    /// Put a parser between compressed streams and the muxer
    pub insert_parsers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            preferred_muxers: DEFAULT_PREFERRED_MUXERS.to_owned(),
            denied_muxers: DEFAULT_DENIED_MUXERS.to_owned(),
            min_rank: DEFAULT_MIN_RANK,
            insert_parsers: DEFAULT_INSERT_PARSERS,
        }
    }
}

impl Settings {
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::from_lists(
            &self.preferred_muxers,
            &self.denied_muxers,
            i32::try_from(self.min_rank).unwrap_or(i32::MAX),
        )
    }
}

/// One upstream stream entering the bin.
pub(crate) struct Stream {
    /// Ghost pad handed out to the application
    pub sinkpad: gst::GhostPad,

    /// Typefind probing the stream
    pub typefind: gst::Element,

    /// Blocking probe on the typefind output (None once data may flow)
    pub block: Option<gst::PadProbeId>,

    /// Caps reported by typefind
    pub caps: Option<gst::Caps>,

    /// Converter or parser between typefind and the muxer, if any
    pub adapter: Option<gst::Element>,

    /// Muxer sink pad the stream is linked to
    pub muxer_pad: Option<gst::Pad>,
}

/// Runtime state of the bin.
#[derive(Default)]
pub(crate) struct State {
    /// Selection progress (shared logic with the automux crate)
    pub selector: Selector,

    /// Streams keyed by sink pad name
    pub streams: BTreeMap<String, Stream>,

    /// Selected muxer, once instantiated
    pub muxer: Option<gst::Element>,

    /// Exposed output pad, once linked
    pub srcpad: Option<gst::GhostPad>,

    /// Next index for `sink_%u` pad names
    pub next_sink_id: u32,
}

impl State {
    /// Name for a new sink pad, honouring a name requested by the caller.
    pub fn sink_pad_name(&mut self, requested: Option<&str>) -> String {
        match requested {
            Some(name) if !name.contains('%') => name.to_owned(),
            _ => loop {
                let candidate = format!("sink_{}", self.next_sink_id);
                self.next_sink_id += 1;
                if !self.streams.contains_key(&candidate) {
                    break candidate;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_keep_builtin_order() {
        let policy = Settings::default().policy();
        assert!(policy.preferred.is_empty());
        assert_eq!(policy.fallback_order.first().map(String::as_str), Some("matroskamux"));
        assert_eq!(policy.min_rank, RANK_MARGINAL);
    }

    #[test]
    fn custom_lists_reach_the_policy() {
        let settings = Settings {
            preferred_muxers: "mp4mux".into(),
            denied_muxers: "avimux, flvmux".into(),
            min_rank: u32::MAX,
            insert_parsers: false,
        };

        let policy = settings.policy();
        assert_eq!(policy.preferred, vec!["mp4mux"]);
        assert_eq!(policy.denied, vec!["avimux", "flvmux"]);
        assert_eq!(policy.min_rank, i32::MAX);
    }

    #[test]
    fn sink_pad_names_are_unique() {
        let mut state = State::default();
        assert_eq!(state.sink_pad_name(None), "sink_0");
        assert_eq!(state.sink_pad_name(Some("sink_%u")), "sink_1");
        assert_eq!(state.sink_pad_name(Some("sink_7")), "sink_7");
    }
}
