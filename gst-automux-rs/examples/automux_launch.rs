// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Runs `videotestsrc ! [encoder] ! automuxerbin ! <sink>` and prints the
//! muxer selection.
//!
//! ```bash
//! cargo run --example automux-launch -- --encoder vp8enc --output out.mkv
//! RUST_LOG=debug cargo run --example automux-launch -- --preferred-muxers mp4mux --encoder x264enc
//! ```

use std::time::Duration;

use clap::Parser;
use gst::glib;
use gst::prelude::*;
use gstreamer as gst;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "automux-launch")]
#[command(version, about = "Mux a test stream with an automatically selected muxer", long_about = None)]
struct Cli {
    /// Encoder placed between the test source and the bin (raw video if unset)
    #[arg(long, short)]
    encoder: Option<String>,

    /// Number of frames produced by the test source
    #[arg(long, default_value_t = 100)]
    num_buffers: i32,

    /// Comma-separated muxer factories tried first
    #[arg(long, default_value = "")]
    preferred_muxers: String,

    /// Comma-separated muxer factories never selected
    #[arg(long, default_value = "")]
    denied_muxers: String,

    /// Lowest factory rank considered for muxers that are not preferred
    #[arg(long)]
    min_rank: Option<u32>,

    /// Write the container to this file instead of discarding it
    #[arg(long, short)]
    output: Option<String>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

/// Initializes the tracing subscriber, honouring `RUST_LOG`.
fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

fn make(factory: &str) -> Result<gst::Element, glib::BoolError> {
    gst::ElementFactory::make(factory).build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();
    let cli = Cli::parse();

    gst::init()?;
    gstautomux::plugin_register_static()?;

    let pipeline = gst::Pipeline::new();
    let src = gst::ElementFactory::make("videotestsrc")
        .property("num-buffers", cli.num_buffers)
        .build()?;
    let bin = gst::ElementFactory::make("automuxerbin")
        .property("preferred-muxers", &cli.preferred_muxers)
        .property("denied-muxers", &cli.denied_muxers)
        .build()?;
    if let Some(min_rank) = cli.min_rank {
        bin.set_property("min-rank", min_rank);
    }
    let sink = match &cli.output {
        Some(location) => gst::ElementFactory::make("filesink")
            .property("location", location)
            .build()?,
        None => gst::ElementFactory::make("fakesink")
            .property("sync", false)
            .build()?,
    };

    pipeline.add_many([&src, &bin, &sink])?;
    match &cli.encoder {
        Some(encoder) => {
            let encoder = make(encoder)?;
            pipeline.add(&encoder)?;
            gst::Element::link_many([&src, &encoder, &bin])?;
        }
        None => src.link(&bin)?,
    }

    let sink_weak = sink.downgrade();
    bin.connect_pad_added(move |bin, pad| {
        let Some(sink) = sink_weak.upgrade() else {
            return;
        };
        info!(
            muxer = ?bin.property::<Option<String>>("muxer"),
            pad = %pad.name(),
            "output exposed"
        );
        let Some(sinkpad) = sink.static_pad("sink") else {
            error!("sink has no sink pad");
            return;
        };
        if let Err(err) = pad.link(&sinkpad) {
            error!(?err, "failed to link output");
        }
    });

    let main_loop = glib::MainLoop::new(None, false);
    let bus = pipeline.bus().ok_or("pipeline without bus")?;
    let _bus_watch = bus.add_watch({
        let main_loop = main_loop.clone();
        move |_, msg| {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    info!("end of stream");
                    main_loop.quit();
                }
                gst::MessageView::Warning(w) => {
                    warn!(warning = %w.error(), debug = ?w.debug(), "pipeline warning");
                }
                gst::MessageView::Error(err) => {
                    error!(error = %err.error(), debug = ?err.debug(), "pipeline error");
                    main_loop.quit();
                }
                _ => (),
            }
            glib::ControlFlow::Continue
        }
    })?;

    glib::timeout_add_once(Duration::from_secs(cli.timeout), {
        let main_loop = main_loop.clone();
        move || {
            warn!("timed out");
            main_loop.quit();
        }
    });

    pipeline.set_state(gst::State::Playing)?;
    main_loop.run();

    if let Some(selection) = bin.property::<Option<String>>("selection") {
        println!("{selection}");
    }
    pipeline.set_state(gst::State::Null)?;

    Ok(())
}
