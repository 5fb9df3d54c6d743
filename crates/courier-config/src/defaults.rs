//! Default values and environment variable names.

/// Per-task deadline applied when the configuration omits one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
/// Capacity of the intake queue.
pub const DEFAULT_INTAKE_CAPACITY: usize = 100;
/// Log level applied when neither configuration nor `RUST_LOG` set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Request timeout for object-store HTTP calls.
pub const DEFAULT_OSS_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Overrides `enabled`.
pub const ENV_ENABLED: &str = "COURIER_ENABLED";
/// Overrides `timeout_secs`.
pub const ENV_TIMEOUT_SECS: &str = "COURIER_TIMEOUT_SECS";
/// Overrides `machine_addr`.
pub const ENV_MACHINE_ADDR: &str = "COURIER_MACHINE_ADDR";
