//! Error types for iqserve.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Driver-layer, parameter-validation,
//! and transport errors are all captured here.

/// The error type for all iqserve operations.
///
/// Variants cover the full range of failure modes encountered when driving
/// an SDR receiver and serving its samples: driver status rejections,
/// device enumeration failures, invalid client parameters, and I/O faults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The hardware driver rejected an operation with a non-zero status.
    ///
    /// The status code is the driver's own numeric error value; the
    /// operation names the parameter update that was being applied.
    #[error("driver status {status} while applying {operation}")]
    DriverStatus {
        /// Which update the driver rejected.
        operation: &'static str,
        /// The driver's numeric status code (never zero).
        status: i32,
    },

    /// The driver library could not be loaded or initialized.
    ///
    /// Typically the vendor service is not running or the shared library
    /// is missing from this host.
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// Device enumeration found no receivers of the selected kind.
    #[error("no devices found")]
    NoDevices,

    /// A serial filter was configured but no attached device matches it.
    #[error("no device with serial '{0}'")]
    SerialNotFound(String),

    /// The device disappeared from the host while in use.
    #[error("device removed")]
    DeviceRemoved,

    /// An invalid parameter was passed to a tuner operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested operation is not supported by this backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The session or tuner is not running.
    #[error("not running")]
    NotRunning,

    /// `start()` was called on a session or tuner that is already running.
    #[error("already running")]
    AlreadyRunning,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
