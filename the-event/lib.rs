//! Event plumbing shared between the document engine and its consumers.

pub mod registry;
pub mod throttle;

pub use registry::{
  Registry,
  SubscriberKey,
};
pub use throttle::Throttle;
