//! Fixed-size circular byte buffer.
//!
//! Holds decoded PCM between the producer thread and the output device.
//! Writes are bounded: a full ring accepts nothing and the producer blocks
//! upstream instead of overwriting unplayed audio.

pub struct RingBuffer {
    buf: Vec<u8>,
    size: usize,
    write_offset: usize,
    read_offset: usize,
    length: usize,
}

impl RingBuffer {
    /// Create a new `RingBuffer` of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size],
            size,
            write_offset: 0,
            read_offset: 0,
            length: 0,
        }
    }

    /// How many bytes are currently available to read.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// How many bytes can still be written before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.size - self.length
    }

    /// Write as much of `chunk` as fits, returning the number of bytes
    /// accepted. Unread data is never overwritten.
    pub fn write(&mut self, chunk: &[u8]) -> usize {
        let to_write = chunk.len().min(self.remaining());
        if to_write == 0 {
            return 0;
        }
        let chunk = &chunk[..to_write];

        let available_at_end = self.size - self.write_offset;
        if to_write <= available_at_end {
            self.buf[self.write_offset..self.write_offset + to_write].copy_from_slice(chunk);
        } else {
            // Wrap around
            self.buf[self.write_offset..].copy_from_slice(&chunk[..available_at_end]);
            self.buf[..to_write - available_at_end].copy_from_slice(&chunk[available_at_end..]);
        }

        self.write_offset = (self.write_offset + to_write) % self.size;
        self.length += to_write;
        to_write
    }

    /// Read into `out`, returning the number of bytes copied.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let to_read = out.len().min(self.length);
        if to_read == 0 {
            return 0;
        }

        let available_at_end = self.size - self.read_offset;
        if to_read <= available_at_end {
            out[..to_read].copy_from_slice(&self.buf[self.read_offset..self.read_offset + to_read]);
        } else {
            out[..available_at_end].copy_from_slice(&self.buf[self.read_offset..]);
            out[available_at_end..to_read].copy_from_slice(&self.buf[..to_read - available_at_end]);
        }

        self.read_offset = (self.read_offset + to_read) % self.size;
        self.length -= to_read;
        to_read
    }

    /// Reset the buffer to empty.
    pub fn clear(&mut self) {
        self.write_offset = 0;
        self.read_offset = 0;
        self.length = 0;
    }
}
