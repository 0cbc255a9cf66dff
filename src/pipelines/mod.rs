// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! Finished captures are handed to these pipelines so the producer never waits
//! on decoding, encoding or disk I/O.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ JPEG capture │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG + EXIF │
//! │              │     │  - Stabilize      │     │              │
//! │              │     │  - Stamp          │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Sensor frame │ ──▶ │  Raw Encoder      │ ──▶ │   DNG file   │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`photo`]: scheduling, finishing and persistence of captures

pub mod photo;
