use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use depthcloud::bus::{Context, Publisher};
use depthcloud::image::ImageEncoding;
use depthcloud::msgs::{
    CameraInfo, Header, ImageMsg, Quaternion, Time, Transform, TransformStamped, Vector3,
};
use depthcloud::tf::StaticTransformBroadcaster;

use crate::config::Topics;
use crate::error::DemoError;

/// Settings of the simulated head camera.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Publishing rate.
    pub rate_hz: f64,
    /// Encoding of the depth stream, `32FC1` or `16UC1`.
    pub depth_encoding: ImageEncoding,
    /// Fraction of depth pixels without a measurement.
    pub hole_ratio: f64,
    /// Optical frame of the camera.
    pub frame_id: String,
    /// Parent frame of the static camera mount.
    pub base_frame: String,
    /// Publish the static mount transform.
    pub publish_mount: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            rate_hz: 15.0,
            depth_encoding: ImageEncoding::Depth32F,
            hole_ratio: 0.1,
            frame_id: "head_camera_rgb_optical_frame".to_string(),
            base_frame: "base_link".to_string(),
            publish_mount: true,
        }
    }
}

/// The camera mount: 1.1m above the base, optical axis looking forward.
fn mount_transform(config: &SimConfig) -> TransformStamped {
    TransformStamped {
        header: Header::new(Time::ZERO, config.base_frame.as_str()),
        child_frame_id: config.frame_id.clone(),
        transform: Transform {
            translation: Vector3::new(0.05, 0.02, 1.1),
            // z forward, x right, y down
            rotation: Quaternion::new(-0.5, 0.5, -0.5, 0.5),
        },
    }
}

/// Whether pixel (x, y) has no depth, spread evenly over the image.
fn is_hole(x: u32, y: u32, hole_ratio: f64) -> bool {
    let cell = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 1000;
    (cell as f64) < hole_ratio * 1000.0
}

/// A tilted plane 1.5m to 2m in front of the camera.
fn depth_at(y: u32, height: u32) -> f32 {
    1.5 + 0.5 * y as f32 / height.max(1) as f32
}

/// Build one synchronized frame: bgr8 color, depth and calibration.
fn render(config: &SimConfig, stamp: Time, seq: u32) -> Result<(ImageMsg, ImageMsg, CameraInfo), DemoError> {
    let (w, h) = (config.width, config.height);
    let mut header = Header::new(stamp, config.frame_id.as_str());
    header.seq = seq;

    let mut color = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            color.extend_from_slice(&[
                (x * 255 / w.max(1)) as u8,
                (y * 255 / h.max(1)) as u8,
                128,
            ]);
        }
    }

    let bpp = config.depth_encoding.bytes_per_pixel() as u32;
    let mut depth = Vec::with_capacity((w * h * bpp) as usize);
    for y in 0..h {
        for x in 0..w {
            let hole = is_hole(x, y, config.hole_ratio);
            let z = depth_at(y, h);
            match config.depth_encoding {
                ImageEncoding::Depth16U => {
                    let mm = if hole { 0 } else { (z * 1000.0) as u16 };
                    depth.extend_from_slice(&mm.to_le_bytes());
                }
                ImageEncoding::Depth32F => {
                    let z = match (hole, x % 2) {
                        (true, 0) => f32::NAN,
                        (true, _) => 0.0,
                        _ => z,
                    };
                    depth.extend_from_slice(&z.to_le_bytes());
                }
                other => {
                    return Err(DemoError::Decode(
                        depthcloud::image::ImageError::UnsupportedEncoding(format!(
                            "{other} is not a depth encoding"
                        )),
                    ))
                }
            }
        }
    }

    let color = ImageMsg {
        header: header.clone(),
        height: h,
        width: w,
        encoding: ImageEncoding::Bgr8.to_string(),
        is_bigendian: false,
        step: w * 3,
        data: color,
    };
    let depth = ImageMsg {
        header: header.clone(),
        height: h,
        width: w,
        encoding: config.depth_encoding.to_string(),
        is_bigendian: false,
        step: w * bpp,
        data: depth,
    };

    let f = 525.0 * w as f64 / 640.0;
    let info = CameraInfo::from_intrinsics(
        header,
        w,
        h,
        (f, f),
        ((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0),
    );

    Ok((color, depth, info))
}

/// A simulated RGB-D head camera publishing on a background thread.
///
/// Publishing stops when the camera is dropped or the context shuts down.
pub struct SimCamera {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    _mount: Option<StaticTransformBroadcaster>,
}

impl SimCamera {
    /// Start publishing frames on `topics`.
    pub fn start(ctx: &Context, topics: &Topics, config: SimConfig) -> Result<Self, DemoError> {
        // fail early on an unusable configuration
        render(&config, Time::ZERO, 0)?;

        let mount = if config.publish_mount {
            let mut broadcaster = StaticTransformBroadcaster::new(ctx)?;
            broadcaster.send_transform(mount_transform(&config));
            Some(broadcaster)
        } else {
            None
        };

        let color = ctx.advertise::<ImageMsg>(&topics.color, 1, false)?;
        let depth = ctx.advertise::<ImageMsg>(&topics.depth, 1, false)?;
        let info = ctx.advertise::<CameraInfo>(&topics.camera_info, 1, false)?;

        let period = Duration::from_secs_f64(1.0 / config.rate_hz.max(0.1));
        let stop = Arc::new(AtomicBool::new(false));

        log::info!(
            "simulated camera {}x{} {} at {} Hz",
            config.width,
            config.height,
            config.depth_encoding,
            config.rate_hz
        );

        let handle = std::thread::Builder::new()
            .name("sim_camera".to_string())
            .spawn({
                let ctx = ctx.clone();
                let stop = stop.clone();
                move || Self::run(&ctx, &stop, &config, period, (color, depth, info))
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
            _mount: mount,
        })
    }

    fn run(
        ctx: &Context,
        stop: &AtomicBool,
        config: &SimConfig,
        period: Duration,
        (color_pub, depth_pub, info_pub): (
            Publisher<ImageMsg>,
            Publisher<ImageMsg>,
            Publisher<CameraInfo>,
        ),
    ) {
        let mut seq = 0u32;
        while !stop.load(Ordering::SeqCst) && !ctx.is_shutdown() {
            match render(config, Time::now(), seq) {
                Ok((color, depth, info)) => {
                    color_pub.publish(color);
                    depth_pub.publish(depth);
                    info_pub.publish(info);
                }
                Err(e) => {
                    log::error!("simulated camera stopped: {e}");
                    break;
                }
            }
            seq = seq.wrapping_add(1);
            std::thread::sleep(period);
        }
    }
}

impl Drop for SimCamera {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("simulated camera thread panicked");
            }
        }
    }
}
