//! Composite buffers and position mapping between them.
//!
//! A view may display a composite buffer whose text is stitched together from segments of
//! other buffers, which may themselves be composite. [`BufferGraph`] records that
//! structure and maps points and spans down to the leaf buffers that own the text, or up
//! from a leaf into a composite.
//!
//! All traversals use an explicit worklist bounded by [`BufferGraph::max_depth`], so a
//! deeply nested or accidentally cyclic graph fails with [`GraphError::DepthExceeded`]
//! instead of exhausting the stack.

use crate::{
    error::{GraphError, Result},
    span::{Position, Span},
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::ops::ControlFlow;

pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u32);

/// One piece of a composite buffer: `span` of `buffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSegment {
    pub buffer: BufferId,
    pub span: Span,
}

impl SourceSegment {
    pub fn new(buffer: BufferId, span: impl Into<Span>) -> Self {
        Self {
            buffer,
            span: span.into(),
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf { len: usize },
    Composite { segments: Vec<SourceSegment>, len: usize },
}

impl Node {
    fn len(&self) -> usize {
        match self {
            Node::Leaf { len } | Node::Composite { len, .. } => *len,
        }
    }
}

/// Frame of the traversal worklist: a window of `buffer` whose start sits at `base` in the
/// root buffer's coordinates.
struct Frame {
    buffer: BufferId,
    window: Span,
    base: Position,
    depth: usize,
}

#[derive(Debug)]
pub struct BufferGraph {
    nodes: FxHashMap<BufferId, Node>,
    max_depth: usize,
}

impl Default for BufferGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferGraph {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Graph that refuses to traverse more than `max_depth` composite levels.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            nodes: FxHashMap::default(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn add_leaf(&mut self, buffer: BufferId, len: usize) {
        self.nodes.insert(buffer, Node::Leaf { len });
    }

    /// Register a composite built from `segments`, which must reference known buffers.
    pub fn add_composite(
        &mut self,
        buffer: BufferId,
        segments: impl IntoIterator<Item = SourceSegment>,
    ) -> Result<()> {
        let segments: Vec<SourceSegment> = segments.into_iter().collect();
        for segment in &segments {
            let len = self.len(segment.buffer)?;
            if segment.span.end > len {
                return Err(GraphError::OutOfBounds {
                    buffer: segment.buffer,
                    position: segment.span.end,
                    len,
                });
            }
        }

        let len = segments.iter().map(|segment| segment.span.len()).sum();
        self.nodes.insert(buffer, Node::Composite { segments, len });
        Ok(())
    }

    pub fn len(&self, buffer: BufferId) -> Result<usize> {
        self.node(buffer).map(Node::len)
    }

    pub fn is_leaf(&self, buffer: BufferId) -> Result<bool> {
        self.node(buffer).map(|node| matches!(node, Node::Leaf { .. }))
    }

    /// Every leaf point that `position` in `buffer` corresponds to, in document order.
    ///
    /// A point on a boundary between two segments maps into both.
    pub fn map_down(
        &self,
        buffer: BufferId,
        position: Position,
    ) -> Result<SmallVec<[(BufferId, Position); 2]>> {
        let mut points = SmallVec::new();
        self.walk(buffer, Span::point(position), |frame, is_leaf| {
            if is_leaf {
                points.push((frame.buffer, frame.window.start));
            }
            ControlFlow::<()>::Continue(())
        })?;
        Ok(points)
    }

    /// The leaf spans covering `span` of `buffer`, in document order.
    pub fn map_span_down(
        &self,
        buffer: BufferId,
        span: Span,
    ) -> Result<SmallVec<[(BufferId, Span); 2]>> {
        let mut spans = SmallVec::new();
        self.walk(buffer, span, |frame, is_leaf| {
            if is_leaf {
                spans.push((frame.buffer, frame.window));
            }
            ControlFlow::<()>::Continue(())
        })?;
        Ok(spans)
    }

    /// Map `position` of `source` up into `target`, returning the first occurrence in
    /// document order, or `None` if `target` does not display that point.
    pub fn map_up(
        &self,
        source: BufferId,
        position: Position,
        target: BufferId,
    ) -> Result<Option<Position>> {
        let len = self.len(source)?;
        if position > len {
            return Err(GraphError::OutOfBounds {
                buffer: source,
                position,
                len,
            });
        }

        let whole = Span::new(0, self.len(target)?);
        self.walk(target, whole, |frame, _| {
            let window = frame.window;
            if frame.buffer == source && window.start <= position && position <= window.end {
                ControlFlow::Break(frame.base + (position - window.start))
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    fn node(&self, buffer: BufferId) -> Result<&Node> {
        self.nodes
            .get(&buffer)
            .ok_or(GraphError::UnknownBuffer { buffer })
    }

    /// Depth-first traversal of every buffer window reachable from `window` of `root`.
    ///
    /// `visit` sees each frame before its children are expanded and may stop the walk early.
    fn walk<R>(
        &self,
        root: BufferId,
        window: Span,
        mut visit: impl FnMut(&Frame, bool) -> ControlFlow<R>,
    ) -> Result<Option<R>> {
        let len = self.len(root)?;
        if window.end > len {
            return Err(GraphError::OutOfBounds {
                buffer: root,
                position: window.end,
                len,
            });
        }

        let mut worklist = vec![Frame {
            buffer: root,
            window,
            base: 0,
            depth: 0,
        }];

        while let Some(frame) = worklist.pop() {
            let node = self.node(frame.buffer)?;
            let is_leaf = matches!(node, Node::Leaf { .. });
            if let ControlFlow::Break(found) = visit(&frame, is_leaf) {
                return Ok(Some(found));
            }

            let Node::Composite { segments, .. } = node else {
                continue;
            };
            if frame.depth >= self.max_depth {
                return Err(GraphError::DepthExceeded {
                    limit: self.max_depth,
                });
            }

            let mut children: SmallVec<[Frame; 4]> = SmallVec::new();
            let mut offset = 0;
            for segment in segments {
                let end = offset + segment.span.len();
                let lo = offset.max(frame.window.start);
                let hi = end.min(frame.window.end);
                let overlaps = if frame.window.is_empty() { lo == hi } else { lo < hi };

                if overlaps {
                    children.push(Frame {
                        buffer: segment.buffer,
                        window: Span::new(
                            segment.span.start + (lo - offset),
                            segment.span.start + (hi - offset),
                        ),
                        base: frame.base + (lo - frame.window.start),
                        depth: frame.depth + 1,
                    });
                }
                offset = end;
            }

            // Reversed so frames pop in document order.
            worklist.extend(children.into_iter().rev());
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: BufferId = BufferId(1);
    const HEADER: BufferId = BufferId(2);
    const INNER: BufferId = BufferId(3);
    const VIEW: BufferId = BufferId(4);

    /// VIEW = HEADER[0..5] + INNER, INNER = DATA[10..30] + DATA[50..60].
    fn nested_graph() -> BufferGraph {
        let mut graph = BufferGraph::new();
        graph.add_leaf(DATA, 100);
        graph.add_leaf(HEADER, 5);
        graph
            .add_composite(
                INNER,
                [
                    SourceSegment::new(DATA, 10..30),
                    SourceSegment::new(DATA, 50..60),
                ],
            )
            .unwrap();
        graph
            .add_composite(
                VIEW,
                [
                    SourceSegment::new(HEADER, 0..5),
                    SourceSegment::new(INNER, 0..30),
                ],
            )
            .unwrap();
        graph
    }

    #[test]
    fn composite_length_sums_segments() {
        let graph = nested_graph();

        assert_eq!(graph.len(INNER).unwrap(), 30);
        assert_eq!(graph.len(VIEW).unwrap(), 35);
        assert!(graph.is_leaf(DATA).unwrap());
        assert!(!graph.is_leaf(VIEW).unwrap());
    }

    #[test]
    fn map_down_through_two_levels() {
        let graph = nested_graph();

        let points = graph.map_down(VIEW, 8).unwrap();

        assert_eq!(points.as_slice(), &[(DATA, 13)]);
    }

    #[test]
    fn boundary_point_maps_to_both_sides() {
        let graph = nested_graph();

        // VIEW offset 25 is INNER offset 20: end of DATA[10..30], start of DATA[50..60].
        let points = graph.map_down(VIEW, 25).unwrap();

        assert_eq!(points.as_slice(), &[(DATA, 30), (DATA, 50)]);
    }

    #[test]
    fn span_maps_to_leaf_pieces() {
        let graph = nested_graph();

        let spans = graph.map_span_down(VIEW, Span::new(3, 28)).unwrap();

        assert_eq!(
            spans.as_slice(),
            &[
                (HEADER, Span::new(3, 5)),
                (DATA, Span::new(10, 30)),
                (DATA, Span::new(50, 53)),
            ]
        );
    }

    #[test]
    fn map_up_finds_displayed_point() {
        let graph = nested_graph();

        assert_eq!(graph.map_up(DATA, 55, VIEW).unwrap(), Some(30));
        assert_eq!(graph.map_up(DATA, 10, VIEW).unwrap(), Some(5));
        assert_eq!(graph.map_up(DATA, 40, VIEW).unwrap(), None);
        assert_eq!(graph.map_up(VIEW, 7, VIEW).unwrap(), Some(7));
    }

    #[test]
    fn unknown_buffer_is_an_error() {
        let graph = nested_graph();

        assert_eq!(
            graph.map_down(BufferId(99), 0).unwrap_err(),
            GraphError::UnknownBuffer {
                buffer: BufferId(99)
            }
        );
    }

    #[test]
    fn out_of_bounds_segment_is_rejected() {
        let mut graph = BufferGraph::new();
        graph.add_leaf(DATA, 10);

        let err = graph
            .add_composite(VIEW, [SourceSegment::new(DATA, 5..20)])
            .unwrap_err();

        assert_eq!(
            err,
            GraphError::OutOfBounds {
                buffer: DATA,
                position: 20,
                len: 10
            }
        );
    }

    #[test]
    fn depth_limit_stops_deep_nesting() {
        let mut graph = BufferGraph::with_max_depth(3);
        graph.add_leaf(BufferId(0), 4);
        for id in 1..=5 {
            graph
                .add_composite(BufferId(id), [SourceSegment::new(BufferId(id - 1), 0..4)])
                .unwrap();
        }

        assert_eq!(graph.map_down(BufferId(3), 2).unwrap().as_slice(), &[(BufferId(0), 2)]);
        assert_eq!(
            graph.map_down(BufferId(5), 2).unwrap_err(),
            GraphError::DepthExceeded { limit: 3 }
        );
    }

    #[test]
    fn cycle_is_caught_by_depth_limit() {
        let mut graph = BufferGraph::with_max_depth(8);
        graph.add_leaf(BufferId(0), 4);
        graph
            .add_composite(BufferId(1), [SourceSegment::new(BufferId(0), 0..4)])
            .unwrap();
        // Re-registering the leaf as a composite of its own parent closes a loop.
        graph
            .add_composite(BufferId(0), [SourceSegment::new(BufferId(1), 0..4)])
            .unwrap();

        assert_eq!(
            graph.map_down(BufferId(1), 1).unwrap_err(),
            GraphError::DepthExceeded { limit: 8 }
        );
    }
}
