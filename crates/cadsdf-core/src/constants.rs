//! Global constants for cadsdf-core

/// Host length unit (cm) to SI (m)
pub const LENGTH_TO_SI: f64 = 0.01;

/// Host moment of inertia unit (kg*cm^2) to SI (kg*m^2)
pub const INERTIA_TO_SI: f64 = LENGTH_TO_SI * LENGTH_TO_SI;

/// Diagonal of the placeholder inertia tensor, in host units
pub const DUMMY_INERTIA_DIAGONAL: f64 = 1000.0;

/// Occurrence subtrees lighter than this (kg) are dropped by small-part removal
pub const SMALL_PART_MASS: f64 = 0.001;

/// Below this |cos(pitch)| the rotation is treated as gimbal locked
pub const GIMBAL_LOCK_EPSILON: f64 = 1e-9;

/// Mesh scale written into the SDF (meshes are exported in mm)
pub const MESH_SCALE: f64 = 0.001;

/// SDF format version written into the model and config documents
pub const SDF_VERSION: &str = "1.6";

/// Mesh directory, relative to the model directory
pub const MESH_DIR: &str = "meshes/CAD";

/// Actuation plugin library loaded by the SDF model
pub const PLUGIN_FILENAME: &str = "libcardsflow_gazebo_plugin.so";

/// Actuation plugin name
pub const PLUGIN_NAME: &str = "cardsflow_gazebo_plugin";

/// Muscle interface plugin used when exporting OpenSim muscles
pub const OSIM_PLUGIN_FILENAME: &str = "libgazebo_ros_muscle_interface.so";

/// Muscle interface plugin name
pub const OSIM_PLUGIN_NAME: &str = "muscle_interface_plugin";

/// Placeholder cable force bounds (N) for CASPR cables
pub const CABLE_FORCE_MIN: f64 = 10.0;
pub const CABLE_FORCE_MAX: f64 = 80.0;
