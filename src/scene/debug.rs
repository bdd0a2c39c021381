use glam::{Mat4, Vec3};

/// RGBA debug color.
pub type DebugColor = [f32; 4];

pub const RED: DebugColor = [1.0, 0.0, 0.0, 1.0];
pub const GREEN: DebugColor = [0.0, 1.0, 0.0, 1.0];
pub const BLUE: DebugColor = [0.0, 0.0, 1.0, 1.0];
pub const YELLOW: DebugColor = [1.0, 1.0, 0.0, 1.0];

/// Consumer for debug overlay geometry.
///
/// Implemented by the external render layer; the core only emits
/// primitives through it during the debug-render phase. Positions are in
/// the space of the supplied matrix.
pub trait DebugGeometrySink {
    /// Box marker centered on the matrix origin.
    fn box_marker(&mut self, matrix: &Mat4, size: f32, color: DebugColor);

    /// Line segment between two points under the supplied matrix.
    fn line(&mut self, matrix: &Mat4, from: Vec3, to: Vec3, color: DebugColor);
}
