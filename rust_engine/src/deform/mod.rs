//! 每帧变形：蒙皮 -> 投影 -> 平滑

mod animated_mesh;
pub mod config;
pub mod projection;
pub mod smoothing;

pub use animated_mesh::{AnimatedMesh, DeformStats};
pub use config::DeformConfig;
pub use projection::{project_vertices, Projection, VertexStatus};
pub use smoothing::smooth_vertices;
