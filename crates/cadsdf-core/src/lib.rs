//! CAD assembly to SDF export core
//!
//! This crate turns an annotated CAD assembly snapshot into a robot
//! description bundle:
//! - Annotation: naming-convention parser (`EXPORT_`, `COM_`, `VP_`, ...)
//! - Body: rigid-group aggregation into links (mass, COM, inertia)
//! - Graph: joint resolution between links
//! - Attachment: via-points, end-effectors, markers, lighthouse sensors
//! - Export: SDF model and sidecar documents (CASPR, OpenSim, CARDSflow, YAML)

pub mod annotation;
pub mod attachment;
pub mod body;
pub mod cache;
pub mod constants;
pub mod convert;
pub mod export;
pub mod graph;
pub mod host;
pub mod inertia;
pub mod pipeline;
pub mod read;
pub mod scene;

pub use annotation::*;
pub use attachment::*;
pub use body::*;
pub use cache::*;
pub use constants::*;
pub use convert::*;
pub use export::*;
pub use graph::*;
pub use host::*;
pub use inertia::*;
pub use pipeline::*;
pub use read::*;
pub use scene::*;
