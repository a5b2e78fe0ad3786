use crate::{EngineConfig, EngineError, Pose, Result, SensorMode, Settings, TrackingEngine};
use crossbeam_channel::{bounded, Sender};
use log::{debug, error, info, warn};
use ndarray::ArrayView3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};

// worker lag before track() blocks
const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Keyframe {
    timestamp: f64,
    pose: Pose,
}

/// Engine that performs no estimation.
///
/// Every frame matching the configured geometry becomes a keyframe at the
/// identity pose. Keyframes are handed to a background worker, the way a
/// real SLAM backend hands them to its mapping thread, so the shutdown and
/// persistence ordering behaves like the real thing. Useful for exercising
/// capture timing on a machine without a SLAM backend.
pub struct KeyframeRecorder {
    settings: Settings,
    tx: Option<Sender<Keyframe>>,
    worker: Option<JoinHandle<Vec<Keyframe>>>,
    trajectory: Option<Vec<Keyframe>>,
}

impl KeyframeRecorder {
    pub fn initialize(config: &EngineConfig) -> Result<Self> {
        if config.mode != SensorMode::Monocular {
            return Err(EngineError::UnsupportedMode(config.mode));
        }
        std::fs::File::open(&config.vocabulary).map_err(|source| EngineError::Vocabulary {
            path: config.vocabulary.clone(),
            source,
        })?;
        let settings = Settings::load(&config.settings)?;

        if config.visualize {
            warn!("no viewer available, running headless");
        }

        let (tx, rx) = bounded::<Keyframe>(QUEUE_DEPTH);
        let worker = thread::Builder::new()
            .name("keyframe-recorder".into())
            .spawn(move || {
                let mut keyframes = Vec::new();
                while let Ok(kf) = rx.recv() {
                    keyframes.push(kf);
                }
                keyframes
            })
            .map_err(EngineError::Worker)?;

        info!(
            "recorder ready (vocabulary {:?}, fx {:.1} fy {:.1})",
            config.vocabulary, settings.fx, settings.fy
        );
        Ok(Self {
            settings,
            tx: Some(tx),
            worker: Some(worker),
            trajectory: None,
        })
    }
}

impl TrackingEngine for KeyframeRecorder {
    fn track(&mut self, image: ArrayView3<'_, u8>, timestamp: f64) -> Option<Pose> {
        let tx = self.tx.as_ref()?;
        if let (Some(w), Some(h)) = (self.settings.width, self.settings.height) {
            let (rows, cols, _) = image.dim();
            if rows != h as usize || cols != w as usize {
                debug!("frame {}x{} does not match settings {}x{}", cols, rows, w, h);
                return None;
            }
        }

        let kf = Keyframe { timestamp, pose: Pose::IDENTITY };
        tx.send(kf).ok()?;
        Some(kf.pose)
    }

    fn shutdown(&mut self) {
        // closing the channel ends the worker loop
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            let keyframes = match worker.join() {
                Ok(kfs) => kfs,
                Err(_) => {
                    error!("keyframe worker panicked; trajectory is empty");
                    Vec::new()
                }
            };
            self.trajectory = Some(keyframes);
        }
    }

    fn save_trajectory(&mut self, path: &Path) -> Result<()> {
        let keyframes = self.trajectory.as_ref().ok_or(EngineError::StillRunning)?;

        let mut out = BufWriter::new(File::create(path)?);
        for kf in keyframes {
            let c = kf.pose.camera_center();
            let q = kf.pose.quaternion();
            // TUM: timestamp tx ty tz qx qy qz qw
            writeln!(
                out,
                "{:.6} {:.7} {:.7} {:.7} {:.7} {:.7} {:.7} {:.7}",
                kf.timestamp, c[0], c[1], c[2], q[0], q[1], q[2], q[3]
            )?;
        }
        out.flush()?;

        info!("saved {} keyframes to {:?}", keyframes.len(), path);
        Ok(())
    }
}

impl Drop for KeyframeRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
