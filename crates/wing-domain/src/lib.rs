// wing-domain library entry point
pub mod error;
pub mod layout;
pub mod mesh;
pub mod resolver;
pub mod resources;
pub mod selection;
pub mod sweep;

pub use error::ConfigurationError;
pub use layout::WorkspaceLayout;
pub use mesh::MeshSettings;
pub use resolver::{check_prerequisites, validate};
pub use resources::ResourceRequest;
pub use selection::{BoundaryLayerMode, SolverKind, Stage, StageSelection};
pub use sweep::{SweepGrid, SweepPoint};
