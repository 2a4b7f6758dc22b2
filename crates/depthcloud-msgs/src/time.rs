use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in time expressed in nanoseconds since the unix epoch.
///
/// [`Time::ZERO`] has a special meaning when used as a lookup key: it asks
/// for the latest available data instead of an exact instant.
///
/// # Examples
///
/// ```
/// use depthcloud_msgs::Time;
///
/// let t = Time::from_secs_f64(1.5);
/// assert_eq!(t.nanos, 1_500_000_000);
/// assert!(!t.is_zero());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    /// Nanoseconds since the unix epoch.
    pub nanos: u64,
}

impl Time {
    /// The zero time, used as "latest available".
    pub const ZERO: Time = Time { nanos: 0 };

    /// Create a time from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Create a time from fractional seconds. Negative values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            nanos: (secs.max(0.0) * 1e9).round() as u64,
        }
    }

    /// The current wall clock time.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self { nanos }
    }

    /// The time as fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 * 1e-9
    }

    /// Check whether this is the zero time.
    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// The absolute distance between two times.
    pub fn abs_diff(&self, other: Time) -> Duration {
        Duration::from_nanos(self.nanos.abs_diff(other.nanos))
    }

    /// Subtract a duration, returning `None` on underflow.
    pub fn checked_sub(&self, duration: Duration) -> Option<Time> {
        let nanos = u64::try_from(duration.as_nanos()).ok()?;
        self.nanos.checked_sub(nanos).map(Time::from_nanos)
    }
}

impl std::ops::Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        Time::from_nanos(self.nanos.saturating_add(rhs.as_nanos() as u64))
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.nanos / 1_000_000_000, self.nanos % 1_000_000_000)
    }
}

/// Standard metadata attached to stamped messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    /// Sequence number assigned by the producer.
    pub seq: u32,
    /// Acquisition time of the data.
    pub stamp: Time,
    /// The reference frame the data is expressed in.
    pub frame_id: String,
}

impl Header {
    /// Create a header with the given stamp and frame.
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Self {
            seq: 0,
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// Messages that carry a [`Header`].
pub trait Stamped {
    /// The header of the message.
    fn header(&self) -> &Header;

    /// Shortcut for the header stamp.
    fn stamp(&self) -> Time {
        self.header().stamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_arithmetic() {
        let t = Time::from_nanos(2_000_000_000);
        assert_eq!(t + Duration::from_millis(500), Time::from_nanos(2_500_000_000));
        assert_eq!(
            t.checked_sub(Duration::from_secs(1)),
            Some(Time::from_nanos(1_000_000_000))
        );
        assert_eq!(t.checked_sub(Duration::from_secs(3)), None);
        assert_eq!(
            t.abs_diff(Time::from_nanos(1_000_000_000)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_time_display() {
        assert_eq!(Time::from_nanos(1_000_000_042).to_string(), "1.000000042");
        assert_eq!(Time::from_secs_f64(-3.0), Time::ZERO);
    }
}
