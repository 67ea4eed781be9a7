// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Per-bin selection state.
//!
//! A [`Selector`] tracks the streams entering one bin instance and the
//! progress of muxer selection:
//!
//! ```text
//! Unselected ──► Probing ──► MuxerInstantiated ──► Linked
//!      ▲                                             │
//!      └──────────────────── reset ──────────────────┘
//! ```
//!
//! Selection is triggered once, when the last known stream gets its type.
//! The output is linked once; a second link attempt is an error.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::encoding::Encoding;
use crate::error::{Error, Result};

/// Progress of muxer selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Unselected,
    Probing,
    MuxerInstantiated(String),
    Linked(String),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Unselected => "unselected",
            Phase::Probing => "probing",
            Phase::MuxerInstantiated(_) => "muxer-instantiated",
            Phase::Linked(_) => "linked",
        }
    }

    fn has_muxer(&self) -> bool {
        matches!(self, Phase::MuxerInstantiated(_) | Phase::Linked(_))
    }
}

/// Streams of one bin instance and their selection progress.
#[derive(Debug, Default)]
pub struct Selector {
    streams: BTreeMap<String, Option<Encoding>>,
    phase: Phase,
    /// Set once the full stream set has been handed out for selection.
    announced: bool,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn muxer(&self) -> Option<&str> {
        match &self.phase {
            Phase::MuxerInstantiated(muxer) | Phase::Linked(muxer) => Some(muxer),
            _ => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.phase, Phase::Linked(_))
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn encoding(&self, name: &str) -> Option<&Encoding> {
        self.streams.get(name).and_then(Option::as_ref)
    }

    /// Starts tracking an untyped stream.
    pub fn add_stream(&mut self, name: &str) -> Result<()> {
        if self.phase.has_muxer() || self.announced {
            return Err(Error::LateStream(name.to_owned()));
        }

        if self.streams.contains_key(name) {
            return Err(Error::DuplicateStream(name.to_owned()));
        }

        trace!(stream = name, "added stream");
        self.streams.insert(name.to_owned(), None);
        Ok(())
    }

    /// Stops tracking a stream. Returns whether it was known.
    pub fn remove_stream(&mut self, name: &str) -> bool {
        let removed = self.streams.remove(name).is_some();
        if removed {
            trace!(stream = name, "removed stream");
        }
        removed
    }

    /// Records the probed encoding of a stream.
    ///
    /// Returns every stream with its encoding when this completes the set and
    /// selection has not been started yet; `None` otherwise.
    pub fn stream_typed(
        &mut self,
        name: &str,
        encoding: Encoding,
    ) -> Result<Option<Vec<(String, Encoding)>>> {
        let slot = self
            .streams
            .get_mut(name)
            .ok_or_else(|| Error::UnknownStream(name.to_owned()))?;

        if self.phase.has_muxer() {
            if slot.as_ref() == Some(&encoding) {
                return Ok(None);
            }
            return Err(Error::InvalidTransition {
                from: self.phase.name(),
                to: Phase::Probing.name(),
            });
        }

        debug!(stream = name, %encoding, "stream typed");
        *slot = Some(encoding);

        if self.phase == Phase::Unselected {
            self.phase = Phase::Probing;
        }

        Ok(self.take_ready())
    }

    /// Hands out the stream set if every stream is typed and selection has
    /// not started yet.
    pub fn take_ready(&mut self) -> Option<Vec<(String, Encoding)>> {
        if self.announced || self.phase != Phase::Probing || self.streams.is_empty() {
            return None;
        }

        let streams = self
            .streams
            .iter()
            .map(|(name, encoding)| encoding.clone().map(|encoding| (name.clone(), encoding)))
            .collect::<Option<Vec<_>>>()?;

        self.announced = true;
        Some(streams)
    }

    /// Records that the selected muxer now exists inside the bin.
    pub fn muxer_instantiated(&mut self, muxer: &str) -> Result<()> {
        if self.phase != Phase::Probing || !self.announced {
            return Err(Error::InvalidTransition {
                from: self.phase.name(),
                to: "muxer-instantiated",
            });
        }

        debug!(muxer, "muxer instantiated");
        self.phase = Phase::MuxerInstantiated(muxer.to_owned());
        Ok(())
    }

    /// Records that every stream is linked and the output pad is exposed.
    pub fn linked(&mut self) -> Result<()> {
        match std::mem::take(&mut self.phase) {
            Phase::MuxerInstantiated(muxer) => {
                debug!(muxer = %muxer, "linked");
                self.phase = Phase::Linked(muxer);
                Ok(())
            }
            other => {
                let from = other.name();
                self.phase = other;
                Err(Error::InvalidTransition { from, to: "linked" })
            }
        }
    }

    /// Drops a failed selection attempt. The muxer is forgotten, the probed
    /// encodings are kept and new streams are accepted again; the next
    /// completed set is handed out by [`Selector::take_ready`].
    pub fn selection_failed(&mut self) {
        debug!(phase = self.phase.name(), "selection failed");
        self.phase = if self.streams.values().any(Option::is_some) {
            Phase::Probing
        } else {
            Phase::Unselected
        };
        self.announced = false;
    }

    /// Forgets the selection but keeps the streams, untyped.
    pub fn reset(&mut self) {
        for encoding in self.streams.values_mut() {
            *encoding = None;
        }
        self.phase = Phase::Unselected;
        self.announced = false;
    }

    pub fn report(&self) -> SelectionReport {
        SelectionReport {
            phase: self.phase.name(),
            muxer: self.muxer().map(str::to_owned),
            streams: self
                .streams
                .iter()
                .map(|(name, encoding)| StreamReport {
                    name: name.clone(),
                    encoding: encoding.as_ref().map(ToString::to_string),
                    media_type: encoding.as_ref().map(|e| e.media_type().to_owned()),
                })
                .collect(),
        }
    }
}

/// Serializable snapshot of a [`Selector`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectionReport {
    pub phase: &'static str,
    pub muxer: Option<String>,
    pub streams: Vec<StreamReport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StreamReport {
    pub name: String,
    pub encoding: Option<String>,
    pub media_type: Option<String>,
}
