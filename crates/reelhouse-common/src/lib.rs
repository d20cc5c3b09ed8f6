//! Reelhouse-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across reelhouse:
//!
//! - **Error Handling**: The error taxonomy shared by the streaming engine and
//!   the transcode orchestrator, with HTTP status mapping
//! - **Quality Catalog**: The fixed set of named encoding presets
//! - **Typed IDs**: UUID wrappers for transcode jobs
//! - **Path Utilities**: Variant naming, content types, and video sniffing
//!
//! # Examples
//!
//! ```
//! use reelhouse_common::{quality, Error, Result};
//! use reelhouse_common::paths::variant_file_name;
//!
//! let hd = quality::lookup("720p").unwrap();
//! assert_eq!(hd.height, 720);
//!
//! assert_eq!(variant_file_name("clip.mov", "720p"), "clip_720p.mp4");
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("clip.mov"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod quality;

pub use error::{Error, Result};
pub use ids::*;
pub use quality::Quality;
