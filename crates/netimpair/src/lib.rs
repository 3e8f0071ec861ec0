//! netimpair: a userspace, tunnel-interposed network impairment emulator.
//!
//! A single-threaded `poll()` loop reads packets off a pollable device,
//! subjects them to configurable delay, rate shaping, and packet loss, and
//! reinjects them in order once their scheduled departure time arrives.

pub mod bridge;
pub mod config;
pub mod control;
pub mod device;
pub mod loss;
pub mod packet;
pub mod queue;
pub mod scheduler;
pub mod shaper;
pub mod stats;

pub use config::{ImpairConfig, RawArgs};
pub use control::{ControlSurface, SharedControl};
pub use device::{RawTunnelDevice, TunnelDevice};
pub use loss::LossMode;
pub use scheduler::{Scheduler, SchedulerConfig};

pub use netimpair_common::{Error, Result};
