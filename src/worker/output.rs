use std::sync::Mutex;

/// Merged capture buffer shared between the child's stdout pump, its
/// stderr pump and in-process annotation writers.
///
/// All appends serialise on the mutex so annotations never interleave with
/// child bytes mid-write. The buffer is unbounded; no truncation is applied.
/// Ordering between the two child streams follows pipe delivery order.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        let mut bytes = self
            .bytes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        bytes.extend_from_slice(chunk);
    }

    /// Drain the captured bytes, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        let mut bytes = self
            .bytes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *bytes)
    }
}
