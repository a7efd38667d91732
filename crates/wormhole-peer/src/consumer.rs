use bytes::Bytes;

/// Receives every fully reassembled payload.
///
/// Invoked on the receiver's assembly task, once per non-empty frame, in
/// arrival order. Implementations should hand work off quickly: time spent
/// here stalls reassembly for every connection.
pub trait FrameConsumer: Send + Sync {
    fn on_frame(&self, payload: Bytes);
}

impl<F> FrameConsumer for F
where
    F: Fn(Bytes) + Send + Sync,
{
    fn on_frame(&self, payload: Bytes) {
        self(payload)
    }
}
