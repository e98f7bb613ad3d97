//! Core types: device identifiers, collaborator traits, tracing setup

pub mod device;
pub mod tracing;

pub use device::{
    Device, DeviceController, DeviceError, DeviceFuture, DeviceId, DeviceResult, DeviceTable,
    SetStateOutcome, TargetResolver,
};
pub use self::tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
