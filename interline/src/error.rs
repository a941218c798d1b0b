use crate::{
    graph::BufferId,
    span::{Position, Span},
};
use snafu::Snafu;

/// Rejected [`Tag`](crate::Tag) construction or mutation.
#[derive(Debug, Snafu, Clone, PartialEq)]
pub enum TagError {
    #[snafu(display("tag height must be a non-negative number, got {height}"))]
    NegativeHeight { height: f64 },

    #[snafu(display("a removal callback requires a visual factory"))]
    RemovalWithoutFactory,
}

/// A [`TagSource`](crate::TagSource) result that does not collapse to one point in the
/// queried extent.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum SpanContractError {
    #[snafu(display("tag mapped to {count} spans, expected exactly one"))]
    MultipleSpans { count: usize },

    #[snafu(display("tag span {span:?} is not zero-length"))]
    NonEmptySpan { span: Span },

    #[snafu(display("tag position {position} lies outside the queried extent {extent:?}"))]
    OutsideExtent { position: Position, extent: Span },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[snafu(display("unknown buffer {buffer:?}"))]
    UnknownBuffer { buffer: BufferId },

    #[snafu(display("buffer nesting deeper than {limit}"))]
    DepthExceeded { limit: usize },

    #[snafu(display("position {position} is past the end of buffer {buffer:?} ({len})"))]
    OutOfBounds {
        buffer: BufferId,
        position: Position,
        len: usize,
    },
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
