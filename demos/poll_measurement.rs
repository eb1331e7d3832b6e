use std::time::Duration;

use tp8236ctrl::{Device, Sampler, SamplerConfig, DEFAULT_BAUDRATE, DEFAULT_TIMEOUT};

#[tokio::main]
async fn main() -> tp8236ctrl::Result<()> {
    let path = "/dev/ttyUSB0".to_string();
    let device = Device::new(&path, DEFAULT_BAUDRATE)?.with_name("bench");
    let sampler = Sampler::new(device, DEFAULT_TIMEOUT);

    // Sample in the background, keep the last 100 readings.
    sampler.start_with(&SamplerConfig {
        interval: Duration::from_millis(500),
        capacity: 100,
    })?;

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        match sampler.latest() {
            Some(mea) => println!("Value: {}", mea),
            None => println!("NO_DATA"),
        }
    }

    sampler.stop().await;
    println!("{} samples collected", sampler.history().len());
    Ok(())
}
