#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use depthcloud_msgs as msgs;

#[doc(inline)]
pub use depthcloud_bus as bus;

#[doc(inline)]
pub use depthcloud_image as image;

#[doc(inline)]
pub use depthcloud_3d as k3d;

#[doc(inline)]
pub use depthcloud_tf as tf;
