use std::collections::BTreeMap;

use depthcloud_bus::{Context, Publisher};
use depthcloud_msgs::{TfMessage, TransformStamped};

use crate::error::TfError;
use crate::{TF_STATIC_TOPIC, TF_TOPIC};

/// Publishes time-varying transforms on the `/tf` topic.
pub struct TransformBroadcaster {
    publisher: Publisher<TfMessage>,
}

impl TransformBroadcaster {
    /// Advertise the dynamic transform topic.
    pub fn new(ctx: &Context) -> Result<Self, TfError> {
        Ok(Self {
            publisher: ctx.advertise(TF_TOPIC, 100, false)?,
        })
    }

    /// Publish a batch of transforms.
    pub fn send_transforms(&self, transforms: Vec<TransformStamped>) {
        self.publisher.publish(TfMessage { transforms });
    }

    /// Publish a single transform.
    pub fn send_transform(&self, transform: TransformStamped) {
        self.send_transforms(vec![transform]);
    }
}

/// Publishes fixed transforms on the latched `/tf_static` topic.
///
/// Every send republishes all transforms given so far, keyed by child
/// frame, so late subscribers receive the complete set.
pub struct StaticTransformBroadcaster {
    publisher: Publisher<TfMessage>,
    transforms: BTreeMap<String, TransformStamped>,
}

impl StaticTransformBroadcaster {
    /// Advertise the static transform topic.
    pub fn new(ctx: &Context) -> Result<Self, TfError> {
        Ok(Self {
            publisher: ctx.advertise(TF_STATIC_TOPIC, 1, true)?,
            transforms: BTreeMap::new(),
        })
    }

    /// Add or replace transforms and republish the accumulated set.
    pub fn send_transforms(&mut self, transforms: Vec<TransformStamped>) {
        for transform in transforms {
            log::debug!(
                "static transform '{}' -> '{}'",
                transform.header.frame_id,
                transform.child_frame_id
            );
            self.transforms
                .insert(transform.child_frame_id.clone(), transform);
        }
        self.publisher.publish(TfMessage {
            transforms: self.transforms.values().cloned().collect(),
        });
    }

    /// Add or replace a single transform.
    pub fn send_transform(&mut self, transform: TransformStamped) {
        self.send_transforms(vec![transform]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthcloud_msgs::{Header, Time};
    use std::time::Duration;

    fn stamped(parent: &str, child: &str) -> TransformStamped {
        TransformStamped {
            header: Header::new(Time::ZERO, parent),
            child_frame_id: child.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_static_broadcaster_accumulates() -> Result<(), TfError> {
        let ctx = Context::new();
        let mut broadcaster = StaticTransformBroadcaster::new(&ctx)?;
        broadcaster.send_transform(stamped("base_link", "torso"));
        broadcaster.send_transform(stamped("torso", "head"));
        broadcaster.send_transform(stamped("base_link", "torso"));

        let msg = ctx.wait_for_message::<TfMessage>(TF_STATIC_TOPIC, Duration::from_millis(50))?;
        let children: Vec<&str> = msg
            .transforms
            .iter()
            .map(|t| t.child_frame_id.as_str())
            .collect();
        assert_eq!(children, vec!["head", "torso"]);
        Ok(())
    }

    #[test]
    fn test_dynamic_broadcaster_is_not_latched() -> Result<(), TfError> {
        let ctx = Context::new();
        let broadcaster = TransformBroadcaster::new(&ctx)?;
        broadcaster.send_transform(stamped("odom", "base_link"));

        let late = ctx.wait_for_message::<TfMessage>(TF_TOPIC, Duration::from_millis(10));
        assert!(late.is_err());

        let sub = ctx.subscribe::<TfMessage>(TF_TOPIC, 10)?;
        broadcaster.send_transform(stamped("odom", "base_link"));
        assert_eq!(sub.try_recv().map(|m| m.transforms.len()), Some(1));
        Ok(())
    }
}
