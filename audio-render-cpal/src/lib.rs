//! # audio-render-cpal
//!
//! cpal output backend for audio-render-core.
//!
//! Provides:
//! - `CpalDriver`: pull-model output stream on a dedicated thread
//! - `CpalDeviceResolver`: maps locators to output device names and reports
//!   their rate and channel limits
//!
//! ## Platform Requirements
//! - macOS (Core Audio) or Windows (WASAPI) through cpal's default host
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_render_core::{StreamFormat, StreamLifecycle};
//! use audio_render_cpal::{CpalDeviceResolver, CpalDriver};
//!
//! let lifecycle = StreamLifecycle::new(Arc::new(CpalDriver::new()), Arc::new(CpalDeviceResolver::new()));
//! lifecycle.open("default", Some(StreamFormat::pcm16_le(48000, 2)))?;
//! lifecycle.start()?;
//! ```

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod cpal_driver;
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub mod device_resolver;

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub use cpal_driver::CpalDriver;
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub use device_resolver::CpalDeviceResolver;
