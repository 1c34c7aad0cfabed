//! Input-gesture building blocks for grid-like widgets.
//!
//! Two independent pieces live here:
//!
//! - [`DragSensor`]: turns raw pointer samples into a drag life cycle
//!   (`init` / `start` / `drag` / `end`) with a configurable distance
//!   threshold and per-target cancellation.
//! - [`DropRegistry`] + [`DropTracker`]: match an in-flight drag against
//!   registered drop zones using one of four tolerance strategies, with
//!   coalesced polling that idles while the pointer is still.
//!
//! Both are headless and deterministic: the embedding feeds pointer samples
//! and a monotonic millisecond clock, and dispatches the resulting phases.

pub mod drag;
pub mod drop;
pub mod geom;

pub use drag::DragOptions;
pub use drag::DragPass;
pub use drag::DragPhase;
pub use drag::DragSensor;
pub use drag::PointerButton;
pub use drop::DropOptions;
pub use drop::DropRegistry;
pub use drop::DropSink;
pub use drop::DropTolerance;
pub use drop::DropTracker;
pub use drop::DropTransition;
pub use geom::Point;
pub use geom::Region;
