use std::collections::VecDeque;

/// Bounded FIFO of bytes shared by one writer and one reader.
///
/// The capacity bounds how many bytes may sit in the buffer at any moment,
/// not how many bytes the stream can carry over its lifetime. The writer
/// half appends and closes; the reader half peeks and pops. Both halves are
/// short-lived views created on demand, so the borrow checker enforces the
/// single-writer single-reader rule.
#[derive(Debug)]
pub struct ByteStream {
    buf: VecDeque<u8>,
    capacity: usize,
    pushed: u64,
    popped: u64,
    closed: bool,
    error: bool,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
            popped: 0,
            closed: false,
            error: false,
        }
    }

    /// Writing surface, valid for the duration of the borrow.
    pub fn writer(&mut self) -> Writer<'_> {
        Writer { stream: self }
    }

    /// Reading surface, valid for the duration of the borrow.
    pub fn reader(&mut self) -> Reader<'_> {
        Reader { stream: self }
    }

    pub fn available_capacity(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn bytes_buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn bytes_popped(&self) -> u64 {
        self.popped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The stream is finished once the writer has closed it and the reader
    /// has drained every byte.
    pub fn is_finished(&self) -> bool {
        self.closed && self.buf.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error
    }
}

/// Writer half of a [`ByteStream`].
#[derive(Debug)]
pub struct Writer<'a> {
    stream: &'a mut ByteStream,
}

impl Writer<'_> {
    /// Append as much of `data` as fits, silently truncating the excess.
    /// Returns the number of bytes accepted. Pushing to a closed stream is
    /// a no-op.
    pub fn push(&mut self, data: &[u8]) -> usize {
        if self.stream.closed {
            return 0;
        }
        let count = data.len().min(self.stream.available_capacity());
        self.stream.buf.extend(&data[..count]);
        self.stream.pushed += count as u64;
        count
    }

    /// Mark the end of the stream. Idempotent.
    pub fn close(&mut self) {
        self.stream.closed = true;
    }

    /// Set the sticky error flag.
    pub fn set_error(&mut self) {
        self.stream.error = true;
    }

    pub fn available_capacity(&self) -> usize {
        self.stream.available_capacity()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.stream.pushed
    }

    pub fn is_closed(&self) -> bool {
        self.stream.closed
    }
}

/// Reader half of a [`ByteStream`].
#[derive(Debug)]
pub struct Reader<'a> {
    stream: &'a mut ByteStream,
}

impl Reader<'_> {
    /// Contiguous view of the head of the buffer. The slice stays valid
    /// until the next mutating call on the stream.
    pub fn peek(&self) -> &[u8] {
        self.stream.buf.as_slices().0
    }

    /// Remove up to `n` bytes from the head of the buffer.
    pub fn pop(&mut self, n: usize) {
        let count = n.min(self.stream.buf.len());
        self.stream.buf.drain(..count);
        self.stream.popped += count as u64;
    }

    pub fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }

    pub fn has_error(&self) -> bool {
        self.stream.error
    }

    pub fn bytes_buffered(&self) -> usize {
        self.stream.buf.len()
    }

    pub fn bytes_popped(&self) -> u64 {
        self.stream.popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_truncates_at_capacity() {
        let mut stream = ByteStream::new(2);
        assert_eq!(stream.writer().push(b"cat"), 2);
        assert_eq!(stream.available_capacity(), 0);
        assert_eq!(stream.bytes_pushed(), 2);
        assert_eq!(stream.reader().peek(), b"ca");

        stream.reader().pop(1);
        assert_eq!(stream.reader().peek(), b"a");
        assert_eq!(stream.available_capacity(), 1);
        assert_eq!(stream.bytes_popped(), 1);

        assert_eq!(stream.writer().push(b"t"), 1);
        assert_eq!(stream.bytes_buffered(), 2);
        let mut collected = Vec::new();
        let mut reader = stream.reader();
        while !reader.peek().is_empty() {
            collected.extend_from_slice(reader.peek());
            let n = reader.peek().len();
            reader.pop(n);
        }
        assert_eq!(collected, b"at");
    }

    #[test]
    fn close_stops_accepting_bytes() {
        let mut stream = ByteStream::new(8);
        stream.writer().push(b"hi");
        stream.writer().close();
        assert_eq!(stream.writer().push(b"more"), 0);
        assert!(stream.is_closed());
        assert!(!stream.is_finished());
        stream.reader().pop(2);
        assert!(stream.is_finished());
        assert!(stream.reader().is_finished());
    }

    #[test]
    fn error_flag_is_sticky() {
        let mut stream = ByteStream::new(8);
        assert!(!stream.has_error());
        stream.writer().set_error();
        assert!(stream.has_error());
        assert!(stream.reader().has_error());
    }

    #[test]
    fn counters_balance() {
        let mut stream = ByteStream::new(5);
        let chunks: &[&[u8]] = &[b"ab", b"cdefg", b"", b"hij"];
        for chunk in chunks {
            stream.writer().push(chunk);
            let buffered = stream.bytes_buffered();
            stream.reader().pop(buffered / 2);
            assert_eq!(
                stream.bytes_pushed() - stream.bytes_popped(),
                stream.bytes_buffered() as u64
            );
            assert!(stream.bytes_buffered() <= 5);
        }
    }

    #[test]
    fn peek_is_stable_between_mutations() {
        let mut stream = ByteStream::new(4);
        stream.writer().push(b"abcd");
        let reader = stream.reader();
        let first = reader.peek();
        let second = reader.peek();
        assert_eq!(first, second);
        assert_eq!(first, b"abcd");
    }
}
