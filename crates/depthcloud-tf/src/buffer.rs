use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use depthcloud_3d::RigidTransform;
use depthcloud_msgs::{Time, TransformStamped};

use crate::error::TfError;

/// Default length of the tracked history of dynamic transforms.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(10);

/// Guards against cycles in a malformed frame graph.
const MAX_GRAPH_DEPTH: usize = 1000;

/// The link from a child frame to its parent.
#[derive(Debug, Clone)]
struct FrameLink {
    parent: String,
    is_static: bool,
    // parent_T_child samples sorted by time
    samples: VecDeque<(Time, RigidTransform)>,
}

impl FrameLink {
    fn newest(&self) -> Option<Time> {
        self.samples.back().map(|(t, _)| *t)
    }

    fn oldest(&self) -> Option<Time> {
        self.samples.front().map(|(t, _)| *t)
    }

    /// parent_T_child at `time`, interpolating between bracketing samples.
    fn sample(&self, child: &str, time: Time) -> Result<RigidTransform, TfError> {
        if self.is_static {
            return self
                .samples
                .back()
                .map(|(_, t)| *t)
                .ok_or_else(|| TfError::Lookup(format!("frame '{child}' has no transform")));
        }

        let (Some(oldest), Some(newest)) = (self.oldest(), self.newest()) else {
            return Err(TfError::Lookup(format!("frame '{child}' has no transform")));
        };
        if time < oldest || time > newest {
            return Err(TfError::Extrapolation {
                frame: child.to_string(),
                requested: time,
                oldest,
                newest,
            });
        }

        let idx = self.samples.partition_point(|(t, _)| *t < time);
        let (t1, tf1) = self.samples[idx];
        if t1 == time || idx == 0 {
            return Ok(tf1);
        }
        let (t0, tf0) = self.samples[idx - 1];
        let ratio = (time.nanos - t0.nanos) as f64 / (t1.nanos - t0.nanos) as f64;
        Ok(tf0.interpolate(&tf1, ratio))
    }
}

/// Stores the history of every frame link and answers transform queries.
///
/// Each frame has at most one parent, so the frames form a forest. A query
/// between two frames walks both up to their closest common ancestor.
#[derive(Debug, Clone)]
pub struct TransformBuffer {
    links: HashMap<String, FrameLink>,
    cache_time: Duration,
}

impl Default for TransformBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TIME)
    }
}

impl TransformBuffer {
    /// Create a buffer keeping `cache_time` of dynamic history per link.
    pub fn new(cache_time: Duration) -> Self {
        Self {
            links: HashMap::new(),
            cache_time,
        }
    }

    /// Check whether a frame appears in the graph, as a child or a parent.
    pub fn frame_exists(&self, frame: &str) -> bool {
        self.links.contains_key(frame) || self.links.values().any(|l| l.parent == frame)
    }

    /// Names of every known frame, sorted.
    pub fn frames(&self) -> Vec<String> {
        let mut frames: Vec<String> = self
            .links
            .iter()
            .flat_map(|(child, link)| [child.clone(), link.parent.clone()])
            .collect();
        frames.sort();
        frames.dedup();
        frames
    }

    /// Store a transform.
    ///
    /// Static transforms replace the link history and are valid at every
    /// time. Dynamic samples older than the cache time relative to the
    /// newest sample are discarded. Re-parenting a frame drops its history.
    ///
    /// # Errors
    ///
    /// Returns [`TfError::InvalidTransform`] for empty or self-referencing
    /// frame ids and for rotations that cannot be normalized.
    pub fn set_transform(&mut self, msg: &TransformStamped, is_static: bool) -> Result<(), TfError> {
        let parent = msg.header.frame_id.trim_start_matches('/');
        let child = msg.child_frame_id.trim_start_matches('/');

        if parent.is_empty() || child.is_empty() {
            return Err(TfError::InvalidTransform(format!(
                "empty frame id in '{parent}' -> '{child}'"
            )));
        }
        if parent == child {
            return Err(TfError::InvalidTransform(format!(
                "frame '{child}' cannot be its own parent"
            )));
        }

        let transform = RigidTransform::from_msg(&msg.transform)
            .map_err(|e| TfError::InvalidTransform(format!("'{parent}' -> '{child}': {e}")))?;

        let link = self
            .links
            .entry(child.to_string())
            .or_insert_with(|| FrameLink {
                parent: parent.to_string(),
                is_static,
                samples: VecDeque::new(),
            });

        if link.parent != parent || link.is_static != is_static {
            log::debug!("frame '{child}' re-parented to '{parent}'");
            link.parent = parent.to_string();
            link.is_static = is_static;
            link.samples.clear();
        }

        if is_static {
            link.samples.clear();
            link.samples.push_back((Time::ZERO, transform));
            return Ok(());
        }

        let stamp = msg.header.stamp;
        let idx = link.samples.partition_point(|(t, _)| *t < stamp);
        match link.samples.get_mut(idx) {
            Some(sample) if sample.0 == stamp => sample.1 = transform,
            _ => link.samples.insert(idx, (stamp, transform)),
        }

        if let Some(horizon) = link.newest().and_then(|n| n.checked_sub(self.cache_time)) {
            while link.oldest().is_some_and(|t| t < horizon) {
                link.samples.pop_front();
            }
        }

        Ok(())
    }

    /// Frames from `frame` up to its root, starting with `frame` itself.
    fn chain(&self, frame: &str) -> Result<Vec<String>, TfError> {
        let mut chain = vec![frame.to_string()];
        let mut current = frame;
        while let Some(link) = self.links.get(current) {
            if chain.len() > MAX_GRAPH_DEPTH {
                return Err(TfError::Lookup(format!(
                    "the frame graph above '{frame}' contains a cycle"
                )));
            }
            chain.push(link.parent.clone());
            current = &link.parent;
        }
        Ok(chain)
    }

    /// The latest time at which every dynamic link of `path` has data.
    fn latest_common_time(&self, path: &[&str]) -> Result<Time, TfError> {
        let mut latest: Option<Time> = None;
        for child in path {
            let Some(link) = self.links.get(*child) else {
                continue;
            };
            if link.is_static {
                continue;
            }
            let newest = link
                .newest()
                .ok_or_else(|| TfError::Lookup(format!("frame '{child}' has no transform")))?;
            latest = Some(latest.map_or(newest, |l| l.min(newest)));
        }
        Ok(latest.unwrap_or(Time::ZERO))
    }

    /// ancestor_T_frame, composing the links from `chain[0]` up to `chain[upto]`.
    fn compose_up(&self, chain: &[String], upto: usize, time: Time) -> Result<RigidTransform, TfError> {
        let mut acc = RigidTransform::IDENTITY;
        for child in &chain[..upto] {
            let link = self
                .links
                .get(child)
                .ok_or_else(|| TfError::Lookup(format!("frame '{child}' has no parent")))?;
            acc = link.sample(child, time)? * acc;
        }
        Ok(acc)
    }

    /// Look up the transform taking points from `source` into `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The frame to express points in.
    /// * `source` - The frame the points are expressed in.
    /// * `time` - The time of the query; [`Time::ZERO`] selects the latest
    ///   time at which every link on the path has data.
    ///
    /// # Returns
    ///
    /// `target_T_source`.
    ///
    /// # Errors
    ///
    /// Returns [`TfError::Lookup`] for unknown or unconnected frames and
    /// [`TfError::Extrapolation`] when `time` lies outside the history.
    pub fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: Time,
    ) -> Result<RigidTransform, TfError> {
        let target = target.trim_start_matches('/');
        let source = source.trim_start_matches('/');

        for frame in [target, source] {
            if !self.frame_exists(frame) {
                return Err(TfError::Lookup(format!(
                    "\"{frame}\" passed to lookup_transform does not exist"
                )));
            }
        }
        if target == source {
            return Ok(RigidTransform::IDENTITY);
        }

        let source_chain = self.chain(source)?;
        let target_chain = self.chain(target)?;

        let Some((source_idx, target_idx)) = source_chain
            .iter()
            .enumerate()
            .find_map(|(i, f)| target_chain.iter().position(|g| g == f).map(|j| (i, j)))
        else {
            return Err(TfError::Lookup(format!(
                "could not find a connection between '{target}' and '{source}' because they are not part of the same tree"
            )));
        };

        let time = if time.is_zero() {
            let path: Vec<&str> = source_chain[..source_idx]
                .iter()
                .chain(&target_chain[..target_idx])
                .map(String::as_str)
                .collect();
            self.latest_common_time(&path)?
        } else {
            time
        };

        let ancestor_t_source = self.compose_up(&source_chain, source_idx, time)?;
        let ancestor_t_target = self.compose_up(&target_chain, target_idx, time)?;

        Ok(ancestor_t_target.inverse() * ancestor_t_source)
    }

    /// Check whether [`TransformBuffer::lookup_transform`] would succeed.
    pub fn can_transform(&self, target: &str, source: &str, time: Time) -> bool {
        self.lookup_transform(target, source, time).is_ok()
    }
}
