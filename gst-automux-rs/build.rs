//! Build Script for gst-automux-rs
//!
//! Generates the `COMMIT_ID` and `BUILD_REL_DATE` environment variables used
//! by `gst::plugin_define!` in lib.rs.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

fn main() {
    gst_plugin_version_helper::info()
}
