// slamcam-engine/src/lib.rs
// ============================================================
// Tracking-engine boundary for slamcam
// The orchestrator drives any engine through one trait: one
// track() per frame, then shutdown() and save_trajectory().
// ------------------------------------------------------------
// Public API
//   * TrackingEngine            – per-frame entry point + teardown
//   * Pose                      – 4×4 camera-from-world transform
//   * Settings::load(path)      – OpenCV-style YAML settings
//   * KeyframeRecorder          – engine without estimation
// ============================================================

//! slamcam – tracking engine layer
//!
//! Engines may run their own threads internally. The caller guarantees
//! that `track` is never called concurrently and that `shutdown` happens
//! before `save_trajectory`; engines are free to rely on that order.

use ndarray::ArrayView3;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod recorder;
mod settings;

pub use recorder::KeyframeRecorder;
pub use settings::{Settings, SettingsError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Vocabulary {path:?} not readable: {source}")]
    Vocabulary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Sensor mode {0:?} is not supported by this engine")]
    UnsupportedMode(SensorMode),
    #[error("Failed to spawn engine worker: {0}")]
    Worker(#[source] std::io::Error),
    #[error("Engine still running; shut it down before saving")]
    StillRunning,
    #[error("Trajectory write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorMode {
    Monocular,
    Stereo,
    Rgbd,
}

/// Everything an engine needs to come up.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub vocabulary: PathBuf,
    pub settings: PathBuf,
    pub mode: SensorMode,
    pub visualize: bool,
}

/// Camera-from-world rigid transform (`Tcw`), row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub tcw: [[f64; 4]; 4],
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        tcw: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// World-from-camera rotation, i.e. the transpose of `Rcw`.
    pub fn rotation_wc(&self) -> [[f64; 3]; 3] {
        let mut r = [[0.0; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.tcw[j][i];
            }
        }
        r
    }

    /// Camera centre in world coordinates: `-Rwc * tcw`.
    pub fn camera_center(&self) -> [f64; 3] {
        let rwc = self.rotation_wc();
        let t = [self.tcw[0][3], self.tcw[1][3], self.tcw[2][3]];
        let mut c = [0.0; 3];
        for i in 0..3 {
            // 0.0 - x keeps a zero translation from printing as -0
            c[i] = 0.0 - (rwc[i][0] * t[0] + rwc[i][1] * t[1] + rwc[i][2] * t[2]);
        }
        c
    }

    /// Orientation of `Rwc` as `[x, y, z, w]`.
    pub fn quaternion(&self) -> [f64; 4] {
        let m = self.rotation_wc();
        let trace = m[0][0] + m[1][1] + m[2][2];
        if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            [
                (m[2][1] - m[1][2]) * s,
                (m[0][2] - m[2][0]) * s,
                (m[1][0] - m[0][1]) * s,
                0.25 / s,
            ]
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = 2.0 * (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt();
            [
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[2][1] - m[1][2]) / s,
            ]
        } else if m[1][1] > m[2][2] {
            let s = 2.0 * (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt();
            [
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
                (m[0][2] - m[2][0]) / s,
            ]
        } else {
            let s = 2.0 * (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt();
            [
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
                (m[1][0] - m[0][1]) / s,
            ]
        }
    }
}

/// The per-frame contract between the orchestrator and an engine.
pub trait TrackingEngine {
    /// Track one frame. `None` means tracking is lost for this frame; it is
    /// not an error.
    fn track(&mut self, image: ArrayView3<'_, u8>, timestamp: f64) -> Option<Pose>;

    /// Stop internal threads. Must be idempotent.
    fn shutdown(&mut self);

    /// Persist the trajectory. Only valid after [`TrackingEngine::shutdown`].
    fn save_trajectory(&mut self, path: &Path) -> Result<()>;
}
