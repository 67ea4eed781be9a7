// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Muxer selection policy.
//!
//! A [`MuxerCandidate`] describes an installed muxer in terms of the probed
//! streams it can take. [`SelectionPolicy::select`] filters the candidates
//! and orders the survivors:
//!
//! 1. position in the preferred list (listed muxers first, in list order)
//! 2. position in the fallback order ([`DEFAULT_PREFERRED_MUXERS`] by default)
//! 3. factory rank, highest first
//! 4. factory name, alphabetically
//!
//! Denied muxers are never chosen. Muxers ranked below `min_rank` are only
//! chosen when listed in `preferred`; the fallback order never lifts the
//! rank limit.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::encoding::Encoding;
use crate::error::{Error, Result};

/// Rank of `GST_RANK_MARGINAL`.
pub const RANK_MARGINAL: i32 = 64;

/// Built-in fallback order, applied after the preferred list and before rank.
pub const DEFAULT_PREFERRED_MUXERS: &[&str] = &[
    "matroskamux",
    "webmmux",
    "mp4mux",
    "qtmux",
    "avimux",
    "asfmux",
    "flvmux",
    "mpegtsmux",
];

/// An installed muxer and the probed encodings it accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxerCandidate {
    /// Element factory name.
    pub name: String,
    /// Element factory rank.
    pub rank: i32,
    /// Encodings, among the probed ones, that one of its sink templates takes.
    pub accepts: Vec<Encoding>,
}

impl MuxerCandidate {
    pub fn new(name: impl Into<String>, rank: i32) -> Self {
        MuxerCandidate {
            name: name.into(),
            rank,
            accepts: Vec::new(),
        }
    }

    /// Builder-style helper adding an accepted encoding.
    pub fn accepting(mut self, encoding: Encoding) -> Self {
        self.accept(encoding);
        self
    }

    pub fn accept(&mut self, encoding: Encoding) {
        if !self.accepts.contains(&encoding) {
            self.accepts.push(encoding);
        }
    }

    pub fn accepts(&self, encoding: &Encoding) -> bool {
        self.accepts.contains(encoding)
    }

    fn accepts_all(&self, streams: &[Encoding]) -> bool {
        streams.iter().all(|encoding| self.accepts(encoding))
    }
}

/// Configuration of the muxer selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectionPolicy {
    /// Factory names tried first, in order. These also bypass `min_rank`.
    pub preferred: Vec<String>,
    /// Ordering among muxers that are not preferred.
    pub fallback_order: Vec<String>,
    /// Factory names never selected.
    pub denied: Vec<String>,
    /// Lowest rank considered for muxers that are not preferred.
    pub min_rank: i32,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy {
            preferred: Vec::new(),
            fallback_order: DEFAULT_PREFERRED_MUXERS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            denied: Vec::new(),
            min_rank: RANK_MARGINAL,
        }
    }
}

impl SelectionPolicy {
    /// Builds a policy from comma-separated factory lists, keeping the
    /// built-in fallback order.
    pub fn from_lists(preferred: &str, denied: &str, min_rank: i32) -> Self {
        SelectionPolicy {
            preferred: parse_list(preferred),
            denied: parse_list(denied),
            min_rank,
            ..SelectionPolicy::default()
        }
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.denied.iter().any(|denied| denied == name)
    }

    fn preference(&self, name: &str) -> Option<usize> {
        self.preferred.iter().position(|preferred| preferred == name)
    }

    fn fallback_position(&self, name: &str) -> Option<usize> {
        self.fallback_order.iter().position(|fallback| fallback == name)
    }

    fn is_eligible(&self, candidate: &MuxerCandidate) -> bool {
        if self.is_denied(&candidate.name) {
            trace!(muxer = %candidate.name, "denied");
            return false;
        }

        if candidate.rank < self.min_rank && self.preference(&candidate.name).is_none() {
            trace!(muxer = %candidate.name, rank = candidate.rank, "rank too low");
            return false;
        }

        true
    }

    /// Picks the muxer for `streams` among `candidates`.
    pub fn select<'a>(
        &self,
        streams: &[Encoding],
        candidates: &'a [MuxerCandidate],
    ) -> Result<&'a MuxerCandidate> {
        if streams.is_empty() {
            return Err(Error::NoStreams);
        }

        let selected = candidates
            .iter()
            .filter(|candidate| self.is_eligible(candidate))
            .filter(|candidate| candidate.accepts_all(streams))
            .min_by_key(|candidate| {
                (
                    self.preference(&candidate.name).unwrap_or(usize::MAX),
                    self.fallback_position(&candidate.name).unwrap_or(usize::MAX),
                    Reverse(candidate.rank),
                    candidate.name.as_str(),
                )
            });

        match selected {
            Some(candidate) => {
                debug!(muxer = %candidate.name, rank = candidate.rank, "selected muxer");
                Ok(candidate)
            }
            None => Err(Error::NoMuxer {
                streams: describe(streams),
            }),
        }
    }

    /// Preferred factory names that are absent from `installed`.
    pub fn missing_preferred<'a>(&'a self, installed: &[MuxerCandidate]) -> Vec<&'a str> {
        self.preferred
            .iter()
            .filter(|name| !installed.iter().any(|candidate| &candidate.name == *name))
            .map(String::as_str)
            .collect()
    }
}

/// Splits a comma-separated list, dropping blanks.
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn describe(streams: &[Encoding]) -> String {
    streams
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        assert_eq!(parse_list(" matroskamux, ,mp4mux,"), vec!["matroskamux", "mp4mux"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn empty_preferred_list_keeps_fallback_order() {
        let policy = SelectionPolicy::from_lists("", "avimux", 0);
        assert!(policy.preferred.is_empty());
        assert_eq!(policy.fallback_order.len(), DEFAULT_PREFERRED_MUXERS.len());
        assert!(policy.is_denied("avimux"));
        assert_eq!(policy.min_rank, 0);
    }

    #[test]
    fn fallback_order_does_not_lift_the_rank_limit() {
        let policy = SelectionPolicy::from_lists("", "", i32::MAX);
        let candidates = [MuxerCandidate::new("matroskamux", 256).accepting(Encoding::RawVideo)];

        assert!(matches!(
            policy.select(&[Encoding::RawVideo], &candidates),
            Err(Error::NoMuxer { .. })
        ));
    }
}
