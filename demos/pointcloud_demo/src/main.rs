use argh::FromArgs;
use std::path::PathBuf;
use std::time::Duration;

use depthcloud::bus::Context;
use depthcloud::image::ImageEncoding;
use depthcloud::tf::TfError;
use pointcloud_demo::{DemoError, PipelineConfig, PointCloudNode, SimCamera, SimConfig, Topics};

#[derive(FromArgs)]
/// Publish one colored point cloud from a registered RGB-D pair, expressed in the base frame
struct Args {
    /// the color image topic
    #[argh(option, default = "String::from(\"/head_camera/rgb/image_raw\")")]
    color_topic: String,

    /// the depth image topic, registered to the color camera
    #[argh(
        option,
        default = "String::from(\"/head_camera/depth_registered/image_raw\")"
    )]
    depth_topic: String,

    /// the color camera calibration topic
    #[argh(option, default = "String::from(\"/head_camera/rgb/camera_info\")")]
    camera_info_topic: String,

    /// the latched output topic
    #[argh(option, default = "String::from(\"generated_cloud\")")]
    output_topic: String,

    /// the frame the cloud is published in
    #[argh(option, short = 't', default = "String::from(\"base_link\")")]
    target_frame: String,

    /// the per-stream buffering window of the image synchronizer
    #[argh(option, default = "10")]
    sync_queue_size: usize,

    /// seconds to wait for a synchronized image pair, forever if omitted
    #[argh(option, from_str_fn(to_duration))]
    image_timeout: Option<Duration>,

    /// seconds to wait for the camera calibration
    #[argh(
        option,
        default = "Duration::from_secs(10)",
        from_str_fn(to_duration)
    )]
    calibration_timeout: Duration,

    /// seconds to wait for the sensor to target transform
    #[argh(option, default = "Duration::from_secs(5)", from_str_fn(to_duration))]
    transform_timeout: Duration,

    /// also write the published cloud to this binary PCD file
    #[argh(option, short = 'o')]
    output_pcd: Option<PathBuf>,

    /// do not start the simulated head camera
    #[argh(switch)]
    no_sim: bool,

    /// publish simulated depth as 16UC1 millimeters instead of 32FC1 meters
    #[argh(switch)]
    sim_depth_mm: bool,

    /// fraction of simulated depth pixels without a measurement
    #[argh(option, default = "0.1")]
    sim_hole_ratio: f64,
}

fn to_duration(value: &str) -> Result<Duration, String> {
    let secs = value
        .parse::<f64>()
        .map_err(|e| format!("invalid number of seconds '{value}': {e}"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("expected a non-negative number of seconds, got '{value}'"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{value}' seconds: {e}"))
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            topics: Topics {
                color: self.color_topic.clone(),
                depth: self.depth_topic.clone(),
                camera_info: self.camera_info_topic.clone(),
                output: self.output_topic.clone(),
            },
            target_frame: self.target_frame.clone(),
            sync_queue_size: self.sync_queue_size,
            image_timeout: self.image_timeout,
            calibration_timeout: self.calibration_timeout,
            transform_timeout: self.transform_timeout,
            output_pcd: self.output_pcd.clone(),
        }
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            depth_encoding: if self.sim_depth_mm {
                ImageEncoding::Depth16U
            } else {
                ImageEncoding::Depth32F
            },
            hole_ratio: self.sim_hole_ratio,
            base_frame: self.target_frame.clone(),
            ..Default::default()
        }
    }
}

fn run(args: &Args, ctx: &Context) -> Result<(), DemoError> {
    let config = args.pipeline_config();
    let node = PointCloudNode::new(ctx, config.clone())?;

    let _camera = if args.no_sim {
        None
    } else {
        Some(SimCamera::start(ctx, &config.topics, args.sim_config())?)
    };

    node.run_once()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let ctx = Context::new();

    ctrlc::set_handler({
        let ctx = ctx.clone();
        move || {
            log::info!("Received Ctrl+C, shutting down...");
            ctx.shutdown();
        }
    })?;

    if let Err(e) = run(&args, &ctx) {
        match &e {
            DemoError::Transform(TfError::Extrapolation { .. }) => {
                log::error!("transform extrapolation: {e}")
            }
            DemoError::Transform(TfError::Lookup(_)) => log::error!("transform lookup: {e}"),
            _ => log::error!("{e}"),
        }
        return Err(e.into());
    }

    Ok(())
}
