// Motion capture recorder core
// Orientation math plus archive export for recorded sessions

pub mod angles;
pub mod error;
pub mod recording;
pub mod types;

pub use angles::{
    euler_track, local_rotation_delta, quaternion_conjugate, quaternion_multiply,
    quaternion_to_euler, rotation_deltas,
};
pub use error::{RecorderError, Result};
pub use recording::{
    format_timestamp, generate_csv, generate_timestamp, save_recording, save_recording_blocking,
    ExportOptions, RecordingArchive,
};
pub use types::{Euler, OrientationData, Quaternion};
