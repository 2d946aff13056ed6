//! RspBuilder -- fluent builder for constructing [`RspTuner`] instances.
//!
//! Separates configuration from construction so callers can set the model
//! and serial filter before the driver opens the device. The driver itself
//! is injected at build time: production code supplies the vendor FFI
//! implementation, tests supply a mock.
//!
//! # Example
//!
//! ```ignore
//! let tuner = RspBuilder::new(rsp_two())
//!     .serial("1809XXXX")
//!     .build_with_driver(driver)
//!     .await?;
//! ```

use std::sync::Arc;

use tracing::info;

use iqserve_core::Result;

use crate::driver::Driver;
use crate::models::RspModel;
use crate::tuner::RspTuner;

/// Fluent builder for [`RspTuner`].
pub struct RspBuilder {
    model: RspModel,
    serial: Option<String>,
}

impl RspBuilder {
    /// Create a new builder for the given RSP model.
    pub fn new(model: RspModel) -> Self {
        RspBuilder {
            model,
            serial: None,
        }
    }

    /// Only open the device with this serial number.
    ///
    /// Without a filter the first enumerated device of the model is used.
    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    /// Open the device through the supplied driver and build the tuner.
    ///
    /// Open failures carry the startup failure class
    /// ([`DriverUnavailable`](iqserve_core::Error::DriverUnavailable),
    /// [`NoDevices`](iqserve_core::Error::NoDevices),
    /// [`SerialNotFound`](iqserve_core::Error::SerialNotFound)) so the
    /// hosting process can exit with the matching code.
    pub async fn build_with_driver(self, driver: Arc<dyn Driver>) -> Result<RspTuner> {
        driver.open(self.serial.as_deref()).await?;
        info!(
            model = self.model.name,
            serial = self.serial.as_deref().unwrap_or("first available"),
            "RSP device opened"
        );
        Ok(RspTuner::new(self.model, self.serial, driver))
    }
}
