use std::pin::Pin;

/// In-memory stand-in for the serial port.
pub(crate) struct FakeBuffer {
    data: Vec<u8>,
    chunk: usize,
}

impl FakeBuffer {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            chunk: usize::MAX,
        }
    }

    /// Hands out at most `chunk` bytes per read, like a slow serial line.
    pub(crate) fn chunked(data: Vec<u8>, chunk: usize) -> Self {
        Self { data, chunk }
    }
}

impl tokio::io::AsyncRead for FakeBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        if !self.data.is_empty() {
            let c = buf.remaining().min(self.chunk).min(self.data.len());
            buf.put_slice(&self.data[0..c]);
            self.data.drain(0..c);
        }
        std::task::Poll::Ready(Ok(()))
    }
}
