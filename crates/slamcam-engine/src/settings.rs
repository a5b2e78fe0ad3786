use serde::Deserialize;
use slamcam_camera::{Intrinsics, PixelFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Camera section of an OpenCV `FileStorage` style settings file.
///
/// Both the `Camera.*` and the newer `Camera1.*` key spellings are accepted.
/// Everything else in the file (extractor, viewer, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(rename = "Camera.fx", alias = "Camera1.fx")]
    pub fx: f64,
    #[serde(rename = "Camera.fy", alias = "Camera1.fy")]
    pub fy: f64,
    #[serde(rename = "Camera.cx", alias = "Camera1.cx")]
    pub cx: f64,
    #[serde(rename = "Camera.cy", alias = "Camera1.cy")]
    pub cy: f64,

    #[serde(rename = "Camera.k1", alias = "Camera1.k1", default)]
    pub k1: f64,
    #[serde(rename = "Camera.k2", alias = "Camera1.k2", default)]
    pub k2: f64,
    #[serde(rename = "Camera.p1", alias = "Camera1.p1", default)]
    pub p1: f64,
    #[serde(rename = "Camera.p2", alias = "Camera1.p2", default)]
    pub p2: f64,
    #[serde(rename = "Camera.k3", alias = "Camera1.k3", default)]
    pub k3: f64,

    #[serde(rename = "Camera.width", default)]
    pub width: Option<u32>,
    #[serde(rename = "Camera.height", default)]
    pub height: Option<u32>,
    #[serde(rename = "Camera.fps", default)]
    pub fps: Option<f64>,
    /// 1 when frames arrive as RGB, 0 for BGR.
    #[serde(rename = "Camera.RGB", default)]
    pub rgb: Option<u8>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse settings text. OpenCV writes a `%YAML:1.0` directive that is
    /// not valid YAML 1.2, so directive lines are dropped first.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SettingsError> {
        let body: String = contents
            .lines()
            .filter(|line| !line.starts_with('%'))
            .map(|line| format!("{line}\n"))
            .collect();
        Ok(serde_yaml::from_str(&body)?)
    }

    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            fx: self.fx,
            fy: self.fy,
            ppx: self.cx,
            ppy: self.cy,
            coeffs: [self.k1, self.k2, self.p1, self.p2, self.k3],
        }
    }

    /// Channel order the camera should deliver. `Camera.RGB: 0` means the
    /// calibration was made on BGR frames; anything else is RGB.
    pub fn pixel_format(&self) -> PixelFormat {
        match self.rgb {
            Some(0) => PixelFormat::Bgr8,
            _ => PixelFormat::Rgb8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUM1: &str = "%YAML:1.0

#--------------------------------------------------------------------------------------------
# Camera Parameters. Adjust them!
#--------------------------------------------------------------------------------------------

# Camera calibration and distortion parameters (OpenCV)
Camera.fx: 517.306408
Camera.fy: 516.469215
Camera.cx: 318.643040
Camera.cy: 255.313989

Camera.k1: 0.262383
Camera.k2: -0.953104
Camera.p1: -0.005358
Camera.p2: 0.002628
Camera.k3: 1.163314

Camera.fps: 30.0
Camera.RGB: 1

ORBextractor.nFeatures: 1000
ORBextractor.scaleFactor: 1.2
Viewer.KeyFrameSize: 0.05
";

    #[test]
    fn parses_opencv_settings_with_directive() {
        let s = Settings::from_yaml_str(TUM1).unwrap();
        assert_eq!(s.fx, 517.306408);
        assert_eq!(s.cy, 255.313989);
        assert_eq!(s.k3, 1.163314);
        assert_eq!(s.fps, Some(30.0));
        assert_eq!(s.rgb, Some(1));
        assert_eq!(s.width, None);
    }

    #[test]
    fn intrinsics_carry_distortion_in_order() {
        let i = Settings::from_yaml_str(TUM1).unwrap().intrinsics();
        assert_eq!(i.ppx, 318.643040);
        assert_eq!(i.coeffs, [0.262383, -0.953104, -0.005358, 0.002628, 1.163314]);
    }

    #[test]
    fn camera1_keys_and_integer_values() {
        let s = Settings::from_yaml_str(
            "Camera1.fx: 500\nCamera1.fy: 500\nCamera1.cx: 320\nCamera1.cy: 240\nCamera.width: 640\nCamera.height: 480\n",
        )
        .unwrap();
        assert_eq!(s.fx, 500.0);
        assert_eq!((s.width, s.height), (Some(640), Some(480)));
        assert_eq!(s.k1, 0.0);
    }

    #[test]
    fn rgb_flag_selects_channel_order() {
        assert_eq!(Settings::from_yaml_str(TUM1).unwrap().pixel_format(), PixelFormat::Rgb8);

        let bgr = TUM1.replace("Camera.RGB: 1", "Camera.RGB: 0");
        assert_eq!(Settings::from_yaml_str(&bgr).unwrap().pixel_format(), PixelFormat::Bgr8);

        let unset = TUM1.replace("Camera.RGB: 1\n", "");
        let s = Settings::from_yaml_str(&unset).unwrap();
        assert_eq!(s.rgb, None);
        assert_eq!(s.pixel_format(), PixelFormat::Rgb8);
    }

    #[test]
    fn missing_focal_length_is_an_error() {
        assert!(matches!(
            Settings::from_yaml_str("Camera.cx: 1\nCamera.cy: 1\n"),
            Err(SettingsError::Parse(_))
        ));
    }
}
