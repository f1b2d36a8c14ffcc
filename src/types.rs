use serde::{Deserialize, Serialize};

/// Rotation quaternion in Hamilton convention, `w` is the scalar part.
///
/// Nothing here normalizes: callers hand in (near) unit quaternions and get
/// physically meaningful angles back, anything else passes straight through.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Quaternion> for nalgebra::Quaternion<f64> {
    fn from(q: Quaternion) -> Self {
        nalgebra::Quaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<nalgebra::Quaternion<f64>> for Quaternion {
    fn from(q: nalgebra::Quaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

impl From<nalgebra::UnitQuaternion<f64>> for Quaternion {
    fn from(q: nalgebra::UnitQuaternion<f64>) -> Self {
        q.into_inner().into()
    }
}

/// Euler angles in degrees, in the recording sensor's axis convention
/// (see [`crate::angles::quaternion_to_euler`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// One orientation reading from the sensor stream
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationData {
    pub quaternion: Quaternion,
    /// Capture time in milliseconds
    pub timestamp: f64,
}

impl OrientationData {
    pub fn new(quaternion: Quaternion, timestamp: f64) -> Self {
        Self {
            quaternion,
            timestamp,
        }
    }
}
