use log::info;
use slamcam_engine::Pose;

/// Receives every pose the engine produced. Called on the control thread,
/// right after the track call returns.
pub trait PoseSink {
    fn on_pose_computed(&mut self, pose: &Pose, timestamp: f64);
}

/// Default sink: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl PoseSink for NoopSink {
    fn on_pose_computed(&mut self, _pose: &Pose, _timestamp: f64) {}
}

/// Logs camera position and orientation in the world frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PoseSink for LogSink {
    fn on_pose_computed(&mut self, pose: &Pose, timestamp: f64) {
        let c = pose.camera_center();
        let q = pose.quaternion();
        info!(
            "t={:.3} position: x: {:.4}, y: {:.4}, z: {:.4} quaternion: {:.4} {:.4} {:.4} {:.4}",
            timestamp, c[0], c[1], c[2], q[0], q[1], q[2], q[3]
        );
    }
}

impl<F: FnMut(&Pose, f64)> PoseSink for F {
    fn on_pose_computed(&mut self, pose: &Pose, timestamp: f64) {
        self(pose, timestamp)
    }
}
