use crate::error::Result;

/// Result of one read attempt on a [`ByteSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written to the front of the buffer.
    Data(usize),
    /// Nothing arrived before the read timeout; try again later.
    Idle,
    /// The source is exhausted and will never yield more bytes.
    Closed,
}

/// Anything bytes can be pulled from in arbitrary-sized pieces.
///
/// Implemented by [`SerialStream`](crate::SerialStream) for live ports and by
/// [`ReplaySource`](crate::ReplaySource) for capture files.
pub trait ByteSource {
    /// Read whatever is available, waiting at most the source's timeout.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Human-readable name for logs (port path or file path).
    fn name(&self) -> &str;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        (**self).read_available(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
