//! Privileged full-surface pixel grabs.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use image::RgbaImage;
use rand::Rng;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::dom::Document;
use crate::error::SurfaceError;
use crate::viewport::Viewport;

/// Raw grab of the visible surface in device pixels.
#[derive(Debug, Clone)]
pub struct DeviceBitmap {
    pub pixels: RgbaImage,
    pub device_pixel_ratio: f64,
    pub logical_width: f64,
    pub logical_height: f64,
}

impl DeviceBitmap {
    pub fn new(pixels: RgbaImage, viewport: &Viewport) -> Self {
        let dpr = viewport.dpr();
        if viewport.width > 0.0 {
            let measured = f64::from(pixels.width()) / viewport.width;
            if (measured - dpr).abs() > 0.01 {
                debug!(measured, dpr, "grab scale differs from reported device pixel ratio");
            }
        }
        Self {
            pixels,
            device_pixel_ratio: dpr,
            logical_width: viewport.width,
            logical_height: viewport.height,
        }
    }
}

/// One request/response exchange with whatever can see the rendered screen.
/// `page` is the document exactly as the grab will see it.
pub trait CaptureSurface {
    fn grab(&mut self, page: &Document, viewport: &Viewport) -> Result<DeviceBitmap, SurfaceError>;
}

impl<S: CaptureSurface + ?Sized> CaptureSurface for Box<S> {
    fn grab(&mut self, page: &Document, viewport: &Viewport) -> Result<DeviceBitmap, SurfaceError> {
        (**self).grab(page, viewport)
    }
}

/// Serves a previously saved full-surface grab from disk.
#[derive(Debug, Clone)]
pub struct ImageFileSurface {
    path: PathBuf,
    invalidated: bool,
}

impl ImageFileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            invalidated: false,
        }
    }

    /// Simulates the hosting runtime going away.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

impl CaptureSurface for ImageFileSurface {
    fn grab(&mut self, _page: &Document, viewport: &Viewport) -> Result<DeviceBitmap, SurfaceError> {
        if self.invalidated {
            return Err(SurfaceError::Invalidated);
        }
        let pixels = image::open(&self.path)?.to_rgba8();
        Ok(DeviceBitmap::new(pixels, viewport))
    }
}

/// Grabs the screen with macOS `screencapture`.
#[derive(Debug, Clone)]
pub struct ScreencaptureSurface {
    timeout: Duration,
}

impl ScreencaptureSurface {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ScreencaptureSurface {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl CaptureSurface for ScreencaptureSurface {
    fn grab(&mut self, _page: &Document, viewport: &Viewport) -> Result<DeviceBitmap, SurfaceError> {
        if !cfg!(target_os = "macos") || !command_exists("screencapture") {
            return Err(SurfaceError::Transport(
                "screencapture is only available on macOS hosts".to_string(),
            ));
        }

        let scratch = scratch_path();
        let args = screencapture_args(viewport, &scratch)?;
        let result = run_screencapture(&args, self.timeout).and_then(|_| {
            let pixels = image::open(&scratch)?.to_rgba8();
            Ok(DeviceBitmap::new(pixels, viewport))
        });
        if let Err(err) = fs::remove_file(&scratch) {
            debug!(path = %scratch.display(), %err, "scratch grab not removed");
        }
        result
    }
}

/// `screencapture` arguments that grab only the viewport's client area, so
/// the bitmap lines up with viewport coordinates.
fn screencapture_args(viewport: &Viewport, out: &Path) -> Result<Vec<OsString>, SurfaceError> {
    let Some(origin) = viewport.screen_origin else {
        return Err(SurfaceError::Transport(
            "viewport screen origin unknown; pass a saved grab instead".to_string(),
        ));
    };
    let (w, h) = (viewport.width.round(), viewport.height.round());
    if w < 1.0 || h < 1.0 {
        return Err(SurfaceError::Transport(format!(
            "viewport {w}x{h} is too small to grab"
        )));
    }
    let region = format!("{},{},{w},{h}", origin.x.round(), origin.y.round());
    Ok(vec![
        "-x".into(),
        "-R".into(),
        region.into(),
        out.as_os_str().to_owned(),
    ])
}

fn run_screencapture(args: &[OsString], timeout: Duration) -> Result<(), SurfaceError> {
    let mut child = Command::new("screencapture")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(SurfaceError::Transport(format!(
            "screencapture exited with {status}"
        ))),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            warn!(timeout_secs = timeout.as_secs(), "screencapture timed out");
            Err(SurfaceError::Transport(format!(
                "screencapture timed out after {}s",
                timeout.as_secs()
            )))
        }
    }
}

fn scratch_path() -> PathBuf {
    let rand = rand::thread_rng().gen_range(1000..9999);
    env::temp_dir().join(format!("parity-grab-{}-{rand}.png", std::process::id()))
}

fn command_exists(name: &str) -> bool {
    Command::new("bash")
        .arg("-lc")
        .arg(format!("command -v {name} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ScreenPoint;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn file_surface_reads_grab_with_viewport_ratio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grab.png");
        RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let viewport = Viewport {
            width: 32.0,
            height: 16.0,
            device_pixel_ratio: 2.0,
            ..Viewport::default()
        };
        let mut surface = ImageFileSurface::new(&path);
        let bitmap = surface.grab(&Document::new(32.0, 16.0), &viewport).unwrap();
        assert_eq!(bitmap.pixels.dimensions(), (64, 32));
        assert_eq!(bitmap.device_pixel_ratio, 2.0);
        assert_eq!(bitmap.logical_width, 32.0);
    }

    #[test]
    fn invalidated_surface_reports_invalidation() {
        let mut surface = ImageFileSurface::new("unused.png");
        surface.invalidate();
        let err = surface
            .grab(&Document::new(1.0, 1.0), &Viewport::default())
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Invalidated));
    }

    #[test]
    fn live_grab_targets_the_client_area() {
        let viewport = Viewport {
            width: 1280.4,
            height: 719.6,
            device_pixel_ratio: 2.0,
            screen_origin: Some(ScreenPoint { x: 64.0, y: 111.5 }),
            ..Viewport::default()
        };
        let args = screencapture_args(&viewport, Path::new("/tmp/grab.png")).unwrap();
        assert_eq!(
            args,
            vec![
                OsString::from("-x"),
                OsString::from("-R"),
                OsString::from("64,112,1280,720"),
                OsString::from("/tmp/grab.png"),
            ]
        );
    }

    #[test]
    fn live_grab_without_origin_is_refused() {
        let err = screencapture_args(&Viewport::default(), Path::new("grab.png")).unwrap_err();
        assert!(matches!(err, SurfaceError::Transport(ref msg) if msg.contains("origin")));
    }

    #[test]
    fn missing_file_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let mut surface = ImageFileSurface::new(dir.path().join("absent.png"));
        assert!(surface
            .grab(&Document::new(1.0, 1.0), &Viewport::default())
            .is_err());
    }
}
