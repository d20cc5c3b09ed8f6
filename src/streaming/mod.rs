//! Media streaming module.
//!
//! # Routes
//!
//! - `GET /stream/{filename}` - Original upload with range support
//! - `GET /stream/{filename}/{quality}` - Quality variant, falling back to
//!   the original when the variant does not exist yet
//!
//! Both routes sit behind the shared stream rate limiter.

mod direct;
pub mod cache;
pub mod range;
pub mod writer;

pub use cache::{CacheValidator, Freshness};
pub use direct::{resolve_target, stream_original, stream_variant};
pub use range::{resolve_range, ByteRange};
pub use writer::{StreamWriter, DEFAULT_CHUNK_SIZE};

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create the streaming router.
pub fn stream_router() -> Router<AppContext> {
    Router::new()
        .route("/{filename}", get(stream_original))
        .route("/{filename}/{quality}", get(stream_variant))
}
