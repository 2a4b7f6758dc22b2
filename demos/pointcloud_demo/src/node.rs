use std::sync::Arc;
use std::time::Duration;

use depthcloud::bus::{ApproximateTimeSync, Context, Publisher, SyncedSubscriber};
use depthcloud::image::{decode_color, decode_depth, ImageEncoding};
use depthcloud::k3d::conversions::{from_point_cloud2, to_point_cloud2, transform_point_cloud2};
use depthcloud::k3d::io::pcd::write_pcd_binary;
use depthcloud::k3d::{RgbdPointCloud, RigidTransform};
use depthcloud::msgs::{CameraInfo, ImageMsg, PointCloud2, Stamped, Time};
use depthcloud::tf::{TfError, TransformListener};

use crate::config::PipelineConfig;
use crate::error::DemoError;

/// Converts one registered color and depth pair into a point cloud in the
/// target frame and publishes it on a latched topic.
pub struct PointCloudNode {
    ctx: Context,
    config: PipelineConfig,
    images: SyncedSubscriber<ImageMsg, ImageMsg>,
    listener: TransformListener,
    publisher: Publisher<PointCloud2>,
}

impl PointCloudNode {
    /// Subscribe to the image streams, start collecting transforms and
    /// advertise the output topic.
    pub fn new(ctx: &Context, config: PipelineConfig) -> Result<Self, DemoError> {
        let color = ctx.subscribe::<ImageMsg>(&config.topics.color, 1)?;
        let depth = ctx.subscribe::<ImageMsg>(&config.topics.depth, 1)?;
        let images = SyncedSubscriber::new(
            ctx,
            color,
            depth,
            ApproximateTimeSync::new(config.sync_queue_size),
        );

        let listener = TransformListener::new(ctx)?;
        let publisher = ctx.advertise::<PointCloud2>(&config.topics.output, 1, true)?;

        log::info!(
            "waiting for images on '{}' and '{}'",
            config.topics.color,
            config.topics.depth
        );

        Ok(Self {
            ctx: ctx.clone(),
            config,
            images,
            listener,
            publisher,
        })
    }

    /// Run the pipeline once.
    ///
    /// Nothing is published unless every stage succeeds, and the node is
    /// consumed so a second cloud cannot be published.
    ///
    /// # Returns
    ///
    /// The published cloud.
    pub fn run_once(mut self) -> Result<Arc<PointCloud2>, DemoError> {
        let (color_msg, depth_msg) = self
            .images
            .next_pair(self.config.image_timeout.unwrap_or(Duration::MAX))
            .map_err(DemoError::Images)?;
        log::info!(
            "received 2 images (color {}, depth {})",
            color_msg.stamp(),
            depth_msg.stamp()
        );

        let camera_info = self
            .ctx
            .wait_for_message::<CameraInfo>(
                &self.config.topics.camera_info,
                self.config.calibration_timeout,
            )
            .map_err(DemoError::Calibration)?;
        log::info!(
            "camera calibration received for frame '{}'",
            camera_info.header.frame_id
        );

        let bgr = decode_color(&color_msg, ImageEncoding::Bgr8)?;
        let depth = decode_depth(&depth_msg)?;
        log::info!("depth encoding: {}", depth.encoding());

        let rgbd = RgbdPointCloud::new(&camera_info)?;
        let cloud = rgbd.to_pointcloud(&bgr, &depth)?;
        let camera_cloud = to_point_cloud2(&cloud, depth_msg.stamp());
        log::info!(
            "{} points in '{}'",
            camera_cloud.len(),
            camera_cloud.header.frame_id
        );

        let target_t_camera = self.lookup_transform(&camera_cloud.header.frame_id)?;
        let target_cloud =
            transform_point_cloud2(&self.config.target_frame, &target_t_camera, &camera_cloud)?;

        if let Some(path) = &self.config.output_pcd {
            write_pcd_binary(path, &from_point_cloud2(&target_cloud)?)?;
            log::info!("wrote cloud to {}", path.display());
        }

        let target_cloud = Arc::new(target_cloud);
        self.publisher.publish(target_cloud.clone());
        log::info!(
            "published {} points in '{}' on '{}'",
            target_cloud.len(),
            target_cloud.header.frame_id,
            self.publisher.topic()
        );

        Ok(target_cloud)
    }

    /// Wait for `target_T_source` at the latest common time.
    fn lookup_transform(&self, source: &str) -> Result<RigidTransform, TfError> {
        let target = &self.config.target_frame;
        match self.listener.wait_for_transform(
            target,
            source,
            Time::ZERO,
            self.config.transform_timeout,
        ) {
            // surface why the last attempt failed
            Err(TfError::Timeout { .. }) => {
                self.listener.lookup_transform(target, source, Time::ZERO)
            }
            res => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCamera, SimConfig};

    fn config() -> PipelineConfig {
        PipelineConfig {
            image_timeout: Some(Duration::from_secs(5)),
            calibration_timeout: Duration::from_secs(5),
            transform_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_once_with_simulated_camera() -> Result<(), DemoError> {
        let ctx = Context::new();
        let config = config();
        let node = PointCloudNode::new(&ctx, config.clone())?;
        let _camera = SimCamera::start(&ctx, &config.topics, SimConfig::default())?;

        let cloud = node.run_once()?;
        assert_eq!(cloud.header.frame_id, "base_link");
        assert!(!cloud.is_empty());
        Ok(())
    }

    #[test]
    fn test_images_timeout() -> Result<(), DemoError> {
        let ctx = Context::new();
        let config = PipelineConfig {
            image_timeout: Some(Duration::from_millis(30)),
            ..config()
        };
        let node = PointCloudNode::new(&ctx, config)?;
        assert!(matches!(node.run_once(), Err(DemoError::Images(_))));
        Ok(())
    }
}
