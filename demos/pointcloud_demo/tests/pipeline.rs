use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use depthcloud::bus::{BusError, Context};
use depthcloud::image::ImageEncoding;
use depthcloud::k3d::conversions::from_point_cloud2;
use depthcloud::k3d::io::pcd::read_pcd_binary;
use depthcloud::image::ImageError;
use depthcloud::msgs::{
    CameraInfo, Header, ImageMsg, PointCloud2, Time, Transform, TransformStamped, Vector3,
};
use depthcloud::tf::{TfError, TransformBroadcaster};
use pointcloud_demo::{DemoError, PipelineConfig, PointCloudNode, SimCamera, SimConfig, Topics};

fn config() -> PipelineConfig {
    PipelineConfig {
        image_timeout: Some(Duration::from_secs(5)),
        calibration_timeout: Duration::from_secs(5),
        transform_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

fn sim(width: u32, height: u32) -> SimConfig {
    SimConfig {
        width,
        height,
        rate_hz: 30.0,
        ..Default::default()
    }
}

fn run(ctx: &Context, config: PipelineConfig, sim: SimConfig) -> Result<Arc<PointCloud2>, DemoError> {
    let topics = config.topics.clone();
    let node = PointCloudNode::new(ctx, config)?;
    let _camera = SimCamera::start(ctx, &topics, sim)?;
    node.run_once()
}

/// Publishes 1x1 image pairs, and optionally calibration, until stopped.
fn fake_camera(
    ctx: &Context,
    topics: &Topics,
    color_encoding: &'static str,
    with_info: bool,
    stop: Arc<AtomicBool>,
) -> Result<(), BusError> {
    let color = ctx.advertise::<ImageMsg>(&topics.color, 1, false)?;
    let depth = ctx.advertise::<ImageMsg>(&topics.depth, 1, false)?;
    let info = ctx.advertise::<CameraInfo>(&topics.camera_info, 1, false)?;
    std::thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            let header = Header::new(Time::now(), "head_camera_rgb_optical_frame");
            color.publish(ImageMsg {
                header: header.clone(),
                height: 1,
                width: 1,
                encoding: color_encoding.to_string(),
                step: 3,
                data: vec![0, 0, 0],
                ..Default::default()
            });
            depth.publish(ImageMsg {
                header: header.clone(),
                height: 1,
                width: 1,
                encoding: "32FC1".to_string(),
                step: 4,
                data: 1.0f32.to_le_bytes().to_vec(),
                ..Default::default()
            });
            if with_info {
                info.publish(CameraInfo::from_intrinsics(header, 1, 1, (1.0, 1.0), (0.0, 0.0)));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    });
    Ok(())
}

fn link(parent: &str, child: &str, secs: f64) -> TransformStamped {
    TransformStamped {
        header: Header::new(Time::from_secs_f64(secs), parent),
        child_frame_id: child.to_string(),
        transform: Transform {
            translation: Vector3::new(0.0, 0.0, 1.0),
            ..Default::default()
        },
    }
}

#[test]
fn publishes_cloud_in_target_frame() -> Result<(), DemoError> {
    let ctx = Context::new();
    let (w, h) = (64, 48);
    let cloud = run(&ctx, config(), sim(w, h))?;

    assert_eq!(cloud.header.frame_id, "base_link");
    assert!(cloud.len() <= (w * h) as usize);
    assert!(!cloud.is_empty());

    let points = from_point_cloud2(&cloud)?;
    assert!(points.points().iter().flatten().all(|v| v.is_finite()));

    // the camera looks forward from 1.1m, the scene is 1.5m to 2m ahead
    for [x, _, z] in points.points() {
        assert!(*x > 1.4 && *x < 2.2, "x = {x}");
        assert!(*z < 1.2 + 1.0, "z = {z}");
    }
    Ok(())
}

#[test]
fn holes_produce_no_points() -> Result<(), DemoError> {
    let (w, h) = (32, 24);
    let dense = run(
        &Context::new(),
        config(),
        SimConfig {
            hole_ratio: 0.0,
            ..sim(w, h)
        },
    )?;
    assert_eq!(dense.len(), (w * h) as usize);

    let sparse = run(
        &Context::new(),
        config(),
        SimConfig {
            hole_ratio: 0.5,
            depth_encoding: ImageEncoding::Depth16U,
            ..sim(w, h)
        },
    )?;
    assert!(sparse.len() < dense.len());
    Ok(())
}

#[test]
fn publishes_at_most_once() -> Result<(), DemoError> {
    let ctx = Context::new();
    let config = config();
    let output = ctx.subscribe::<PointCloud2>(&config.topics.output, 10)?;

    let cloud = run(&ctx, config.clone(), sim(16, 12))?;
    let received = output.recv_timeout(Duration::from_secs(1))?;
    assert_eq!(received.header, cloud.header);

    std::thread::sleep(Duration::from_millis(100));
    assert!(output.try_recv().is_none());

    // latched for late subscribers
    let late = ctx.wait_for_message::<PointCloud2>(&config.topics.output, Duration::from_secs(1))?;
    assert_eq!(late.data, cloud.data);
    Ok(())
}

#[test]
fn no_publish_without_calibration() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new();
    let config = PipelineConfig {
        calibration_timeout: Duration::from_millis(100),
        ..config()
    };
    let node = PointCloudNode::new(&ctx, config.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    fake_camera(&ctx, &config.topics, "bgr8", false, stop.clone())?;
    let res = node.run_once();
    stop.store(true, Ordering::SeqCst);

    assert!(matches!(res, Err(DemoError::Calibration(BusError::Timeout(_)))));
    let published =
        ctx.wait_for_message::<PointCloud2>(&config.topics.output, Duration::from_millis(50));
    assert!(matches!(published, Err(BusError::Timeout(_))));
    Ok(())
}

#[test]
fn no_publish_without_transform() -> Result<(), DemoError> {
    let ctx = Context::new();
    let config = config();
    let res = run(
        &ctx,
        config.clone(),
        SimConfig {
            publish_mount: false,
            ..sim(16, 12)
        },
    );

    assert!(matches!(res, Err(DemoError::Transform(TfError::Lookup(_)))));
    let published =
        ctx.wait_for_message::<PointCloud2>(&config.topics.output, Duration::from_millis(50));
    assert!(matches!(published, Err(BusError::Timeout(_))));
    Ok(())
}

#[test]
fn no_publish_on_undecodable_image() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new();
    let config = config();
    let node = PointCloudNode::new(&ctx, config.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    fake_camera(&ctx, &config.topics, "yuv422", true, stop.clone())?;
    let res = node.run_once();
    stop.store(true, Ordering::SeqCst);

    assert!(matches!(
        res,
        Err(DemoError::Decode(ImageError::UnsupportedEncoding(_)))
    ));
    let published =
        ctx.wait_for_message::<PointCloud2>(&config.topics.output, Duration::from_millis(50));
    assert!(matches!(published, Err(BusError::Timeout(_))));
    Ok(())
}

#[test]
fn no_publish_when_transform_history_does_not_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new();
    let config = config();
    let topics = config.topics.clone();
    let node = PointCloudNode::new(&ctx, config.clone())?;

    // base_link <- torso is known at 1s and 2s, torso <- camera only at 10s
    let broadcaster = TransformBroadcaster::new(&ctx)?;
    broadcaster.send_transforms(vec![
        link("base_link", "torso", 1.0),
        link("base_link", "torso", 2.0),
        link("torso", "head_camera_rgb_optical_frame", 10.0),
    ]);

    let _camera = SimCamera::start(
        &ctx,
        &topics,
        SimConfig {
            publish_mount: false,
            ..sim(16, 12)
        },
    )?;
    let res = node.run_once();

    assert!(matches!(
        res,
        Err(DemoError::Transform(TfError::Extrapolation { ref frame, .. }))
            if frame == "head_camera_rgb_optical_frame"
    ));
    let published =
        ctx.wait_for_message::<PointCloud2>(&config.topics.output, Duration::from_millis(50));
    assert!(matches!(published, Err(BusError::Timeout(_))));
    Ok(())
}

#[test]
fn shutdown_aborts_without_publishing() -> Result<(), DemoError> {
    let ctx = Context::new();
    let config = PipelineConfig {
        image_timeout: None,
        ..config()
    };
    let node = PointCloudNode::new(&ctx, config)?;

    std::thread::spawn({
        let ctx = ctx.clone();
        move || {
            std::thread::sleep(Duration::from_millis(50));
            ctx.shutdown();
        }
    });

    assert!(matches!(
        node.run_once(),
        Err(DemoError::Images(BusError::Shutdown))
    ));
    Ok(())
}

#[test]
fn writes_pcd_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("generated_cloud.pcd");
    let config = PipelineConfig {
        output_pcd: Some(path.clone()),
        ..config()
    };

    let cloud = run(&Context::new(), config, sim(16, 12))?;
    let written = read_pcd_binary(&path)?;
    let published = from_point_cloud2(&cloud)?;

    assert_eq!(written.len(), published.len());
    assert_eq!(written.colors(), published.colors());
    for (a, b) in written.points().iter().zip(published.points()) {
        for i in 0..3 {
            assert_relative_eq!(a[i], b[i]);
        }
    }
    Ok(())
}
