// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for muxer selection and the selection state machine.
//!
//! The candidate lists mirror what a stock GStreamer installation offers for
//! the streams exercised by the element tests: raw video, VP8, H.264 and
//! WMV2.

use automux::{
    Encoding, Error, MuxerCandidate, Phase, RANK_MARGINAL, SelectionPolicy, Selector,
};
use tracing::info;
use tracing_test::traced_test;

/// Installs a thread-local subscriber for the calling test. A global one would
/// conflict with `#[traced_test]`, which installs its own global subscriber.
fn setup_logging() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish();
    tracing::subscriber::set_default(subscriber)
}

const PRIMARY: i32 = 256;

/// A typical set of installed muxers.
fn installed_muxers() -> Vec<MuxerCandidate> {
    vec![
        MuxerCandidate::new("avimux", PRIMARY)
            .accepting(Encoding::RawVideo)
            .accepting(Encoding::Vp8)
            .accepting(Encoding::H264)
            .accepting(Encoding::Wmv(Some(2))),
        MuxerCandidate::new("flvmux", PRIMARY).accepting(Encoding::H264),
        MuxerCandidate::new("matroskamux", PRIMARY)
            .accepting(Encoding::RawVideo)
            .accepting(Encoding::Vp8)
            .accepting(Encoding::H264)
            .accepting(Encoding::Wmv(Some(2))),
        MuxerCandidate::new("mp4mux", PRIMARY).accepting(Encoding::H264),
        MuxerCandidate::new("webmmux", PRIMARY).accepting(Encoding::Vp8),
        MuxerCandidate::new("y4mmux", 0).accepting(Encoding::RawVideo),
    ]
}

fn typed(selector: &mut Selector, name: &str, encoding: Encoding) -> Option<Vec<Encoding>> {
    selector
        .stream_typed(name, encoding)
        .unwrap()
        .map(|streams| streams.into_iter().map(|(_, encoding)| encoding).collect())
}

#[test]
fn default_policy_picks_matroska_for_every_tested_format() {
    let _log_guard = setup_logging();
    let candidates = installed_muxers();
    let policy = SelectionPolicy::default();

    for encoding in [
        Encoding::RawVideo,
        Encoding::Vp8,
        Encoding::H264,
        Encoding::Wmv(Some(2)),
    ] {
        let muxer = policy.select(&[encoding.clone()], &candidates).unwrap();
        info!(%encoding, muxer = %muxer.name, "selected");
        assert_eq!(muxer.name, "matroskamux");
    }
}

#[test]
fn preferred_list_order_wins_over_rank() {
    let candidates = vec![
        MuxerCandidate::new("mp4mux", PRIMARY).accepting(Encoding::H264),
        MuxerCandidate::new("flvmux", RANK_MARGINAL).accepting(Encoding::H264),
    ];
    let policy = SelectionPolicy::from_lists("flvmux,mp4mux", "", RANK_MARGINAL);

    let muxer = policy.select(&[Encoding::H264], &candidates).unwrap();
    assert_eq!(muxer.name, "flvmux");
}

#[test]
fn rank_then_name_break_ties_outside_preferences() {
    let candidates = vec![
        MuxerCandidate::new("zmux", 128).accepting(Encoding::H265),
        MuxerCandidate::new("bmux", PRIMARY).accepting(Encoding::H265),
        MuxerCandidate::new("amux", PRIMARY).accepting(Encoding::H265),
    ];
    let policy = SelectionPolicy::from_lists("nosuchmux", "", RANK_MARGINAL);

    let muxer = policy.select(&[Encoding::H265], &candidates).unwrap();
    assert_eq!(muxer.name, "amux");
}

#[test]
fn denied_muxers_are_skipped() {
    let candidates = installed_muxers();
    let policy = SelectionPolicy::from_lists("", "matroskamux,webmmux", RANK_MARGINAL);

    let muxer = policy.select(&[Encoding::Vp8], &candidates).unwrap();
    assert_eq!(muxer.name, "avimux");
}

#[test]
fn low_rank_muxers_need_an_explicit_preference() {
    let candidates = vec![MuxerCandidate::new("y4mmux", 0).accepting(Encoding::RawVideo)];

    let default = SelectionPolicy::default();
    assert!(matches!(
        default.select(&[Encoding::RawVideo], &candidates),
        Err(Error::NoMuxer { .. })
    ));

    let preferred = SelectionPolicy::from_lists("y4mmux", "", RANK_MARGINAL);
    let muxer = preferred.select(&[Encoding::RawVideo], &candidates).unwrap();
    assert_eq!(muxer.name, "y4mmux");
}

#[test]
fn min_rank_applies_to_the_builtin_order() {
    let candidates = installed_muxers();

    let strict = SelectionPolicy::from_lists("", "", i32::MAX);
    let err = strict.select(&[Encoding::Vp8], &candidates).unwrap_err();
    assert!(matches!(err, Error::NoMuxer { .. }));

    let strict_but_preferred = SelectionPolicy::from_lists("webmmux", "", i32::MAX);
    let muxer = strict_but_preferred
        .select(&[Encoding::Vp8], &candidates)
        .unwrap();
    assert_eq!(muxer.name, "webmmux");
}

#[test]
fn every_stream_must_be_accepted() {
    let candidates = installed_muxers();
    let policy = SelectionPolicy::default();

    let muxer = policy
        .select(&[Encoding::Vp8, Encoding::H264], &candidates)
        .unwrap();
    assert_eq!(muxer.name, "matroskamux");

    let err = policy
        .select(&[Encoding::H264, Encoding::Other("video/x-dirac".into())], &candidates)
        .unwrap_err();
    assert_eq!(err.to_string(), "No muxer accepts streams [h264, video/x-dirac]");
}

#[test]
fn selecting_without_streams_fails() {
    let err = SelectionPolicy::default()
        .select(&[], &installed_muxers())
        .unwrap_err();
    assert!(matches!(err, Error::NoStreams));
}

#[test]
fn policy_loads_from_json() {
    let policy: SelectionPolicy =
        serde_json::from_str(r#"{"preferred": ["webmmux"], "min-rank": 0}"#).unwrap();
    assert_eq!(policy.preferred, vec!["webmmux"]);
    assert_eq!(policy.fallback_order.first().map(String::as_str), Some("matroskamux"));
    assert!(policy.denied.is_empty());
    assert_eq!(policy.min_rank, 0);
}

#[test]
fn missing_preferred_muxers_are_reported() {
    let policy = SelectionPolicy::from_lists("webmmux,asfmux", "", RANK_MARGINAL);
    assert_eq!(policy.missing_preferred(&installed_muxers()), vec!["asfmux"]);
}

#[traced_test]
#[test]
fn single_stream_walks_through_every_phase() {
    let mut selector = Selector::new();
    assert_eq!(selector.phase(), &Phase::Unselected);

    selector.add_stream("sink_0").unwrap();
    let streams = typed(&mut selector, "sink_0", Encoding::H264).unwrap();
    assert_eq!(streams, vec![Encoding::H264]);
    assert_eq!(selector.phase(), &Phase::Probing);
    assert!(!selector.is_linked());

    selector.muxer_instantiated("matroskamux").unwrap();
    assert_eq!(selector.muxer(), Some("matroskamux"));

    selector.linked().unwrap();
    assert!(selector.is_linked());

    info!(phase = selector.phase().name(), "walked through every phase");
    assert!(logs_contain("walked through every phase"));
}

#[test]
fn selection_waits_for_every_stream() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    selector.add_stream("sink_1").unwrap();

    assert!(typed(&mut selector, "sink_1", Encoding::Vp8).is_none());
    assert_eq!(selector.phase(), &Phase::Probing);

    let streams = selector.stream_typed("sink_0", Encoding::RawVideo).unwrap().unwrap();
    assert_eq!(
        streams,
        vec![
            ("sink_0".to_owned(), Encoding::RawVideo),
            ("sink_1".to_owned(), Encoding::Vp8),
        ]
    );

    // The set is handed out once.
    assert!(selector.take_ready().is_none());
}

#[test]
fn removing_the_last_untyped_stream_completes_the_set() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    selector.add_stream("sink_1").unwrap();
    assert!(typed(&mut selector, "sink_0", Encoding::Vp8).is_none());

    assert!(selector.remove_stream("sink_1"));
    assert!(!selector.remove_stream("sink_1"));
    let streams = selector.take_ready().unwrap();
    assert_eq!(streams.len(), 1);
}

#[test]
fn output_is_linked_at_most_once() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    typed(&mut selector, "sink_0", Encoding::Vp8).unwrap();
    selector.muxer_instantiated("webmmux").unwrap();
    selector.linked().unwrap();

    let err = selector.linked().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: "linked",
            to: "linked"
        }
    ));
    assert!(selector.is_linked());
}

#[test]
fn muxer_cannot_be_instantiated_before_probing_completes() {
    let mut selector = Selector::new();
    assert!(selector.muxer_instantiated("matroskamux").is_err());
    assert!(selector.linked().is_err());

    selector.add_stream("sink_0").unwrap();
    selector.add_stream("sink_1").unwrap();
    typed(&mut selector, "sink_0", Encoding::Vp8);
    assert!(selector.muxer_instantiated("matroskamux").is_err());
}

#[test]
fn streams_after_selection_are_rejected() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    typed(&mut selector, "sink_0", Encoding::Vp8).unwrap();
    selector.muxer_instantiated("webmmux").unwrap();

    assert!(matches!(selector.add_stream("sink_1"), Err(Error::LateStream(_))));
    assert!(matches!(
        selector.add_stream("sink_0"),
        Err(Error::LateStream(_))
    ));

    // Same caps again is fine, a format change is not.
    assert!(typed(&mut selector, "sink_0", Encoding::Vp8).is_none());
    assert!(selector.stream_typed("sink_0", Encoding::H264).is_err());
}

#[test]
fn unknown_and_duplicate_streams_fail() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    assert!(matches!(
        selector.add_stream("sink_0"),
        Err(Error::DuplicateStream(_))
    ));
    assert!(matches!(
        selector.stream_typed("sink_9", Encoding::Vp8),
        Err(Error::UnknownStream(_))
    ));
}

#[test]
fn reset_allows_a_new_selection() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    typed(&mut selector, "sink_0", Encoding::Vp8).unwrap();
    selector.muxer_instantiated("webmmux").unwrap();
    selector.linked().unwrap();

    selector.reset();
    assert_eq!(selector.phase(), &Phase::Unselected);
    assert_eq!(selector.stream_count(), 1);
    assert!(selector.encoding("sink_0").is_none());

    let streams = typed(&mut selector, "sink_0", Encoding::H264).unwrap();
    assert_eq!(streams, vec![Encoding::H264]);
}

#[test]
fn failed_selection_keeps_encodings_and_accepts_streams() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    typed(&mut selector, "sink_0", Encoding::Vp8).unwrap();
    selector.muxer_instantiated("webmmux").unwrap();

    selector.selection_failed();
    assert_eq!(selector.phase(), &Phase::Probing);
    assert_eq!(selector.muxer(), None);
    assert_eq!(selector.encoding("sink_0"), Some(&Encoding::Vp8));

    selector.add_stream("sink_1").unwrap();
    assert!(selector.take_ready().is_none());

    let streams = typed(&mut selector, "sink_1", Encoding::RawVideo).unwrap();
    assert_eq!(streams, vec![Encoding::Vp8, Encoding::RawVideo]);
}

#[test]
fn report_serializes_to_json() {
    let mut selector = Selector::new();
    selector.add_stream("sink_0").unwrap();
    typed(&mut selector, "sink_0", Encoding::Wmv(Some(2))).unwrap();
    selector.muxer_instantiated("matroskamux").unwrap();

    let json = serde_json::to_value(selector.report()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "phase": "muxer-instantiated",
            "muxer": "matroskamux",
            "streams": [
                {"name": "sink_0", "encoding": "wmv2", "media-type": "video/x-wmv"}
            ]
        })
    );
}
