//! Inter-line adornments for a live text view.
//!
//! Tag sources attach variable-height widgets above or below lines of a document that is
//! being edited. The [`AdornmentManager`] turns the changing set of tags into per-line
//! spacing reservations and realized widgets, while:
//!
//! - keeping the caret line where it is on screen when spacing appears or changes,
//! - deferring widget creation and removal while text is being typed,
//! - reusing widgets for tags that survive a re-query instead of recreating them.
//!
//! # Protocol
//!
//! ```text
//! View layout pass
//!   | query_line_space (per formatted line)
//!   | on_layout_complete  -> AfterLayout::ScheduleFollowUp?
//! Host idle turn
//!   | run_follow_up       -> Redisplay?
//! TagSource change
//!   | on_batched_change   -> Redisplay?
//! Tag height/offset change
//!   | flush_tag_events    -> Redisplay?
//! ```
//!
//! Every [`Redisplay`] is executed by the host as a new layout pass, which again queries
//! the manager. The manager itself never calls into the view's layout.

mod active;
pub mod config;
pub mod error;
pub mod graph;
mod manager;
pub mod observable;
mod registry;
pub mod source;
pub mod span;
pub mod surface;
pub mod tag;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tracking;
pub mod view;

pub use active::ActiveTag;
pub use config::ManagerConfig;
pub use error::{GraphError, SpanContractError, TagError};
pub use graph::{BufferGraph, BufferId, SourceSegment};
pub use manager::{AdornmentManager, AfterLayout};
pub use observable::{Observable, SubscriptionId};
pub use registry::{ManagerRegistry, ViewId};
pub use source::{validate_tag_span, ProjectedTagSource, TagSet, TagSource, TagSpan};
pub use span::{NormalizedSpans, Position, Span, VersionedSpan};
pub use surface::RenderSurface;
pub use tag::{HorizontalPositioning, RemovalCallback, Tag, TagBuilder, VisualFactory};
pub use tracking::{Bias, Edit, EditHistory, PositionTracker, Version};
pub use view::{AnchorMode, LineChange, LineInfo, LineTransform, Redisplay, TextView};
