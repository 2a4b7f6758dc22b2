use std::path::PathBuf;
use std::time::Duration;

/// Topic names shared by the pipeline and the simulated camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Topics {
    /// Color images.
    pub color: String,
    /// Depth images registered to the color camera.
    pub depth: String,
    /// Calibration of the color camera.
    pub camera_info: String,
    /// The published cloud.
    pub output: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            color: "/head_camera/rgb/image_raw".to_string(),
            depth: "/head_camera/depth_registered/image_raw".to_string(),
            camera_info: "/head_camera/rgb/camera_info".to_string(),
            output: "generated_cloud".to_string(),
        }
    }
}

/// Settings of a pipeline run.
///
/// The defaults reproduce the behavior of a run without command line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Topic names.
    pub topics: Topics,
    /// Frame the published cloud is expressed in.
    pub target_frame: String,
    /// Per-stream buffering window of the image synchronizer.
    pub sync_queue_size: usize,
    /// Bound on the wait for a correlated image pair. `None` waits until shutdown.
    pub image_timeout: Option<Duration>,
    /// Bound on the wait for calibration.
    pub calibration_timeout: Duration,
    /// Bound on the wait for the sensor to target transform.
    pub transform_timeout: Duration,
    /// Also write the published cloud to a binary PCD file.
    pub output_pcd: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            target_frame: "base_link".to_string(),
            sync_queue_size: 10,
            image_timeout: None,
            calibration_timeout: Duration::from_secs(10),
            transform_timeout: Duration::from_secs(5),
            output_pcd: None,
        }
    }
}
