//! Pipeline stages that turn one stored payload into one PDF page.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable without the others and without a transport.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ encode ──▶ layout ──▶ compose
//! (decode/EXIF)  (JPEG q95)  (fit+center) (lopdf page)
//! ```
//!
//! 1. [`normalize`] — decode, apply EXIF orientation, reduce to L8/RGB8,
//!    cap the longest side
//! 2. [`encode`]    — JPEG-encode for a `/DCTDecode` image stream
//! 3. [`layout`]    — compute the aspect-preserving, centered page box
//! 4. [`compose`]   — append the page to the in-memory document
//!
//! All stages are synchronous and CPU-bound; callers run them on
//! `tokio::task::spawn_blocking`.

pub mod compose;
pub mod encode;
pub mod layout;
pub mod normalize;
