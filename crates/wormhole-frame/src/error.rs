/// Errors that can occur while encoding frames.
///
/// Decode-side problems are not errors in this protocol: bytes that fail
/// header validation are body continuation, and inconsistent buffers are
/// silently dropped by the assembly layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload length does not fit in the header's length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
