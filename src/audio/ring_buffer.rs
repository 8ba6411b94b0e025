//! Fixed-capacity circular buffer of PCM samples between the capture callback
//! and the processing thread. Pre-allocated; the oldest samples are overwritten.

pub struct RingBuffer {
    buffer: Box<[i16]>,
    write_pos: usize,
    read_pos: usize,
    unread: usize,
}

impl RingBuffer {
    /// Buffer holding `duration_secs` of mono audio at `sample_rate` Hz.
    pub fn new(sample_rate: u32, duration_secs: f32) -> Self {
        let capacity = ((sample_rate as f32 * duration_secs) as usize).max(1);
        Self {
            buffer: vec![0i16; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            unread: 0,
        }
    }

    /// Append samples. When the reader falls behind, unread samples are dropped
    /// oldest first.
    #[inline]
    pub fn write(&mut self, samples: &[i16]) {
        let capacity = self.capacity();
        for &s in samples {
            self.buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % capacity;
            if self.unread == capacity {
                self.read_pos = self.write_pos;
            } else {
                self.unread += 1;
            }
        }
    }

    /// Copy up to `output.len()` unread samples; returns how many were read.
    #[inline]
    pub fn read(&mut self, output: &mut [i16]) -> usize {
        let capacity = self.capacity();
        let to_read = output.len().min(self.unread);
        for slot in output.iter_mut().take(to_read) {
            *slot = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % capacity;
        }
        self.unread -= to_read;
        to_read
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.unread
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Discard unread samples (e.g. audio captured while a cue was playing).
    pub fn reset_read(&mut self) {
        self.read_pos = self.write_pos;
        self.unread = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_order() {
        let mut rb = RingBuffer::new(8, 1.0);
        rb.write(&[1, 2, 3]);
        let mut out = [0i16; 2];
        assert_eq!(rb.read(&mut out), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(rb.available(), 1);
    }

    #[test]
    fn overflow_keeps_newest() {
        let mut rb = RingBuffer::new(4, 1.0);
        rb.write(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rb.available(), 4);
        let mut out = [0i16; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn reset_discards_unread() {
        let mut rb = RingBuffer::new(4, 1.0);
        rb.write(&[1, 2]);
        rb.reset_read();
        assert_eq!(rb.available(), 0);
        rb.write(&[9]);
        let mut out = [0i16; 4];
        assert_eq!(rb.read(&mut out), 1);
        assert_eq!(out[0], 9);
    }
}
