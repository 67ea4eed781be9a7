// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Classification of elementary streams by their caps media type.
//!
//! The plugin hands over the caps structure name and a lookup for integer
//! fields; the result is an [`Encoding`] that the selection policy and the
//! pipeline builder work with. Only the fields needed to tell formats apart
//! are consulted (`wmvversion` for Windows Media Video).

use std::fmt;

/// Broad category of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

impl StreamKind {
    fn from_media_type(media_type: &str) -> Self {
        if media_type.starts_with("video/") || media_type.starts_with("image/") {
            StreamKind::Video
        } else if media_type.starts_with("audio/") {
            StreamKind::Audio
        } else {
            StreamKind::Other
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Other => "other",
        })
    }
}

/// Encoding of an elementary stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Uncompressed video (`video/x-raw`).
    RawVideo,
    /// Uncompressed audio (`audio/x-raw`).
    RawAudio,
    /// VP8 (`video/x-vp8`).
    Vp8,
    /// VP9 (`video/x-vp9`).
    Vp9,
    /// H.264 / AVC (`video/x-h264`).
    H264,
    /// H.265 / HEVC (`video/x-h265`).
    H265,
    /// Windows Media Video (`video/x-wmv`), with its `wmvversion` if known.
    Wmv(Option<i32>),
    /// Anything else, keyed by media type.
    Other(String),
}

impl Encoding {
    /// Classifies a caps structure.
    ///
    /// `field` returns the integer value of a structure field, if present.
    pub fn classify<F>(media_type: &str, field: F) -> Self
    where
        F: Fn(&str) -> Option<i32>,
    {
        match media_type {
            "video/x-raw" => Encoding::RawVideo,
            "audio/x-raw" => Encoding::RawAudio,
            "video/x-vp8" => Encoding::Vp8,
            "video/x-vp9" => Encoding::Vp9,
            "video/x-h264" => Encoding::H264,
            "video/x-h265" => Encoding::H265,
            "video/x-wmv" => Encoding::Wmv(field("wmvversion")),
            other => Encoding::Other(other.to_owned()),
        }
    }

    /// Caps media type this encoding is carried as.
    pub fn media_type(&self) -> &str {
        match self {
            Encoding::RawVideo => "video/x-raw",
            Encoding::RawAudio => "audio/x-raw",
            Encoding::Vp8 => "video/x-vp8",
            Encoding::Vp9 => "video/x-vp9",
            Encoding::H264 => "video/x-h264",
            Encoding::H265 => "video/x-h265",
            Encoding::Wmv(_) => "video/x-wmv",
            Encoding::Other(media_type) => media_type,
        }
    }

    pub fn kind(&self) -> StreamKind {
        StreamKind::from_media_type(self.media_type())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Encoding::RawVideo | Encoding::RawAudio)
    }

    /// Element to put in front of the muxer for uncompressed streams, so
    /// that the muxer can negotiate a layout it supports.
    pub fn raw_converter(&self) -> Option<&'static str> {
        match self {
            Encoding::RawVideo => Some("videoconvert"),
            Encoding::RawAudio => Some("audioconvert"),
            _ => None,
        }
    }

    /// Identifying integer field, beyond the media type, that a muxer
    /// template has to match.
    pub fn version_field(&self) -> Option<(&'static str, i32)> {
        match self {
            Encoding::Wmv(Some(version)) => Some(("wmvversion", *version)),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::RawVideo => f.write_str("raw-video"),
            Encoding::RawAudio => f.write_str("raw-audio"),
            Encoding::Vp8 => f.write_str("vp8"),
            Encoding::Vp9 => f.write_str("vp9"),
            Encoding::H264 => f.write_str("h264"),
            Encoding::H265 => f.write_str("h265"),
            Encoding::Wmv(Some(version)) => write!(f, "wmv{version}"),
            Encoding::Wmv(None) => f.write_str("wmv"),
            Encoding::Other(media_type) => f.write_str(media_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_fields(_: &str) -> Option<i32> {
        None
    }

    #[test]
    fn classifies_known_video_formats() {
        assert_eq!(Encoding::classify("video/x-raw", no_fields), Encoding::RawVideo);
        assert_eq!(Encoding::classify("video/x-vp8", no_fields), Encoding::Vp8);
        assert_eq!(Encoding::classify("video/x-h264", no_fields), Encoding::H264);
        assert_eq!(
            Encoding::classify("video/x-wmv", |name| (name == "wmvversion").then_some(2)),
            Encoding::Wmv(Some(2))
        );
    }

    #[test]
    fn unknown_media_type_is_kept() {
        let encoding = Encoding::classify("video/x-dirac", no_fields);
        assert_eq!(encoding, Encoding::Other("video/x-dirac".into()));
        assert_eq!(encoding.media_type(), "video/x-dirac");
        assert_eq!(encoding.kind(), StreamKind::Video);
        assert_eq!(Encoding::Other("application/x-foo".into()).kind(), StreamKind::Other);
    }

    #[test]
    fn raw_streams_get_a_converter() {
        assert_eq!(Encoding::RawVideo.raw_converter(), Some("videoconvert"));
        assert_eq!(Encoding::RawAudio.raw_converter(), Some("audioconvert"));
        assert_eq!(Encoding::H264.raw_converter(), None);
        assert!(!Encoding::Vp8.is_raw());
    }

    #[test]
    fn wmv_carries_its_version() {
        assert_eq!(Encoding::Wmv(Some(2)).version_field(), Some(("wmvversion", 2)));
        assert_eq!(Encoding::Wmv(None).version_field(), None);
        assert_eq!(Encoding::Wmv(Some(2)).to_string(), "wmv2");
    }
}
