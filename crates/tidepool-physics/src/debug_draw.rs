//! Debug introspection of the physics engine.
//!
//! When enabled, the engine emits its primitive draw commands (lines and
//! triangles) into a caller-provided sink after every stepped frame. The
//! verbosity level gates how much geometry is produced; level zero disables
//! the whole path at the source, so a release simulation pays nothing.
//! Periodic camera-position updates let the engine cull geometry nobody is
//! looking at.

use tidepool_entity::math::Vec2;

// ---------------------------------------------------------------------------
// DebugDrawLevel
// ---------------------------------------------------------------------------

/// Debug draw verbosity. Ordered: higher levels include everything below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DebugDrawLevel(pub u8);

impl DebugDrawLevel {
    /// No debug output at all.
    pub const OFF: DebugDrawLevel = DebugDrawLevel(0);
    /// Body wireframes as lines.
    pub const WIREFRAME: DebugDrawLevel = DebugDrawLevel(1);
    /// Wireframes plus filled triangles.
    pub const SOLID: DebugDrawLevel = DebugDrawLevel(2);
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// One line segment in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    /// Segment start.
    pub from: Vec2,
    /// Segment end.
    pub to: Vec2,
}

/// One filled triangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugTriangle {
    /// First vertex.
    pub a: Vec2,
    /// Second vertex.
    pub b: Vec2,
    /// Third vertex.
    pub c: Vec2,
}

// ---------------------------------------------------------------------------
// DebugDrawSink
// ---------------------------------------------------------------------------

/// Receiver of primitive draw commands. Called from inside the physics step,
/// so implementations should buffer and return quickly.
pub trait DebugDrawSink: Send {
    /// A line to draw this frame.
    fn draw_line(&mut self, line: DebugLine);

    /// A triangle to draw this frame.
    fn draw_triangle(&mut self, triangle: DebugTriangle);
}

/// Sink that buffers primitives in memory. Handy for tests and for renderers
/// that drain the buffer once per frame.
#[derive(Debug, Default)]
pub struct BufferedDebugDraw {
    /// Lines received since the last clear.
    pub lines: Vec<DebugLine>,
    /// Triangles received since the last clear.
    pub triangles: Vec<DebugTriangle>,
}

impl BufferedDebugDraw {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything received so far.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.triangles.clear();
    }
}

impl DebugDrawSink for BufferedDebugDraw {
    fn draw_line(&mut self, line: DebugLine) {
        self.lines.push(line);
    }

    fn draw_triangle(&mut self, triangle: DebugTriangle) {
        self.triangles.push(triangle);
    }
}

// Shared form for callers that need to keep reading the buffer while the
// physics world owns the sink.
impl DebugDrawSink for std::sync::Arc<std::sync::Mutex<BufferedDebugDraw>> {
    fn draw_line(&mut self, line: DebugLine) {
        if let Ok(mut buffer) = self.lock() {
            buffer.draw_line(line);
        }
    }

    fn draw_triangle(&mut self, triangle: DebugTriangle) {
        if let Ok(mut buffer) = self.lock() {
            buffer.draw_triangle(triangle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(DebugDrawLevel::OFF < DebugDrawLevel::WIREFRAME);
        assert!(DebugDrawLevel::WIREFRAME < DebugDrawLevel::SOLID);
    }

    #[test]
    fn buffered_sink_accumulates_and_clears() {
        let mut sink = BufferedDebugDraw::new();
        sink.draw_line(DebugLine {
            from: Vec2::ZERO,
            to: Vec2::new(1.0, 0.0),
        });
        sink.draw_triangle(DebugTriangle {
            a: Vec2::ZERO,
            b: Vec2::new(1.0, 0.0),
            c: Vec2::new(0.0, 1.0),
        });
        assert_eq!(sink.lines.len(), 1);
        assert_eq!(sink.triangles.len(), 1);
        sink.clear();
        assert!(sink.lines.is_empty());
        assert!(sink.triangles.is_empty());
    }
}
