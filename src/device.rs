use futures::{Stream, StreamExt};
use log::debug;
use std::pin::Pin;
use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialPortType};
use tokio_util::codec::FramedRead;

use crate::measurement::Measurement;
use crate::proto::{codec::FrameCodec, frame::Frame, ProtoError, Result};

type FrameStream = Pin<Box<dyn Stream<Item = std::io::Result<Frame>> + Send>>;

/// Source of raw status frames. The meter only talks, it never listens.
pub struct Device {
    stream: FrameStream,
    name: Option<String>,
}

impl Device {
    pub fn new(com: impl AsRef<str>, baudrate: u32) -> Result<Self> {
        #[allow(unused_mut)]
        let mut port = tokio_serial::new(com.as_ref(), baudrate).open_native_async()?;

        #[cfg(unix)]
        port.set_exclusive(false)?;

        debug!("opened {} at {} baud", com.as_ref(), baudrate);
        Ok(Self::from_stream(FramedRead::new(port, FrameCodec::default())))
    }

    /// Uses any frame stream as the device, e.g. a different transport.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Frame>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
            name: None,
        }
    }

    /// Tags every measurement of this device with `name`, so samples of
    /// several meters can be told apart.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn new_faked(data: Vec<u8>) -> Self {
        Self::from_stream(FramedRead::new(
            super::proto::fake::FakeBuffer::chunked(data, 5),
            FrameCodec::default(),
        ))
    }

    /// Next raw frame, unchecked.
    pub async fn frame(&mut self) -> Result<Frame> {
        match self.stream.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(ioerr)) => Err(ioerr.into()),
            None => Err(ProtoError::Abort),
        }
    }

    /// Waits for the next frame and decodes it. Frames with broken framing
    /// bytes are returned as error, not skipped.
    pub async fn live_measurement(&mut self) -> Result<Measurement> {
        let frame = self.frame().await?;
        frame.validate()?;
        let mut mea = Measurement::from_frame(&frame);
        mea.device = self.name.clone();
        Ok(mea)
    }
}

/// Serial ports present on this machine, one description per port.
pub fn list_ports() -> Result<Vec<String>> {
    Ok(tokio_serial::available_ports()?
        .iter()
        .map(describe_port)
        .collect())
}

fn describe_port(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(info) => {
            let mut desc = format!(
                "{} - USB (VID: 0x{:04x}, PID: 0x{:04x})",
                port.port_name, info.vid, info.pid
            );
            if let Some(ref product) = info.product {
                desc.push_str(&format!(" {}", product));
            }
            desc
        }
        SerialPortType::BluetoothPort => format!("{} - Bluetooth", port.port_name),
        SerialPortType::PciPort => format!("{} - PCI", port.port_name),
        SerialPortType::Unknown => format!("{} - Unknown", port.port_name),
    }
}
