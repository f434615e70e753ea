//! Feature slices for the kiosk (one reducer module per concern).

pub mod jobs;
pub mod navigation;
pub mod notifications;
pub mod reconcile;
