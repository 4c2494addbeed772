//! Pixel placement and synchronization for a shared canvas.
//!
//! [`CanvasState`] is the entry point for a session: it paints the grid from
//! the store, gates placements behind a cooldown and merges changes other
//! sessions make to the same store.

mod canvas_state;
mod rate_limiter;
mod update_queue;

pub use crate::canvas_state::{CanvasNotice, CanvasState, PlaceOutcome};
pub use crate::rate_limiter::{CooldownState, RateLimiter};
pub use crate::update_queue::UpdateQueue;
