//!
//! This library reads the live display of a TP8236 digital multimeter.
//!
//! <br>
//!
//! # Details
//!
//! - The meter streams a 22 byte status frame about every 250 ms over its
//!   USB serial bridge. Each frame mirrors the LCD: four digits, decimal
//!   points, sign, unit icons and the analog range bar.
//!
//! - Single reading
//!
//!   ```no_run
//!   use std::time::Duration;
//!   use tp8236ctrl::{Device, Sampler, DEFAULT_BAUDRATE, DEFAULT_TIMEOUT};
//!   #[tokio::main]
//!   async fn main() -> tp8236ctrl::Result<()> {
//!       let path = "/dev/ttyUSB0".to_string();
//!       let sampler = Sampler::new(Device::new(&path, DEFAULT_BAUDRATE)?, DEFAULT_TIMEOUT);
//!       println!("{}", sampler.read_once().await?);
//!       Ok(())
//!   }
//!   ```
//!
//! - Continuous sampling keeps a bounded history, see [`Sampler::start`].
//!
//! # Supported devices
//!
//!  * TP8236
//!

pub mod buffer;
pub mod device;
pub mod measurement;
pub mod proto;
pub mod rawmea;
pub mod sampler;

use std::time::Duration;

pub use device::Device;
pub use measurement::{Measurement, Unit};
pub use proto::Result;
pub use sampler::{Sampler, SamplerConfig};

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyUSB0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM1";

/// Default Baudrate for TP8236.
pub const DEFAULT_BAUDRATE: u32 = 2400;

/// The meter sends a frame about every 250 ms.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

pub const DEFAULT_CAPACITY: usize = 1000;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
