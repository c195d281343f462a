//! A fixed-capacity byte accumulator used to cap captured stdout/stderr.
//!
//! Once the cap is reached, further pushes are silent no-ops — the process
//! keeps running and the rest of its output is read and discarded so it
//! never blocks on a full pipe.

pub struct BoundedBuffer {
    data: Vec<u8>,
    cap: usize,
}

impl BoundedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.data.len() >= self.cap {
            return;
        }
        let remaining = self.cap - self.data.len();
        let take = remaining.min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_at_cap() {
        let mut buf = BoundedBuffer::new(4);
        buf.push(b"abcdefgh");
        assert_eq!(buf.into_vec(), b"abcd");
    }

    #[test]
    fn push_accumulates_across_calls() {
        let mut buf = BoundedBuffer::new(10);
        buf.push(b"ab");
        buf.push(b"cd");
        assert_eq!(buf.into_vec(), b"abcd");
    }

    #[test]
    fn push_past_cap_is_noop() {
        let mut buf = BoundedBuffer::new(2);
        buf.push(b"ab");
        buf.push(b"cd");
        assert_eq!(buf.into_vec(), b"ab");
    }
}
