use std::collections::BTreeMap;

use crate::stream::Writer;

/// Reorders substring fragments into a contiguous byte stream.
///
/// Fragments are keyed by their absolute index in the logical stream. The
/// in-order prefix goes straight to the output stream; everything ahead of
/// it waits in `pending`, kept as disjoint intervals. Fragments outside the
/// window implied by the output's spare capacity are dropped.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: BTreeMap<u64, Vec<u8>>,
    next_index: u64,
    bytes_pending: u64,
    eof_seen: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first byte not yet pushed to the output.
    pub fn first_unassembled_index(&self) -> u64 {
        self.next_index
    }

    /// Bytes stored ahead of the in-order prefix.
    pub fn bytes_pending(&self) -> u64 {
        self.bytes_pending
    }

    /// Accept the fragment `data` starting at `first_index`; `is_last`
    /// marks the fragment that ends the stream. In-order bytes are pushed
    /// to `output` immediately, and the output is closed once the last
    /// byte has been assembled.
    pub fn insert(&mut self, first_index: u64, data: &[u8], is_last: bool, mut output: Writer<'_>) {
        if is_last {
            self.eof_seen = true;
        }

        let window_end = self.next_index + output.available_capacity() as u64;
        let data_end = first_index + data.len() as u64;

        // Entirely behind the assembled prefix or beyond the window.
        if data_end <= self.next_index || first_index >= window_end {
            self.maybe_close(&mut output);
            return;
        }

        // Trim the already-assembled prefix and the out-of-window suffix.
        let start = first_index.max(self.next_index);
        let end = data_end.min(window_end);
        let data = &data[(start - first_index) as usize..(end - first_index) as usize];
        let first_index = start;
        if data.is_empty() {
            self.maybe_close(&mut output);
            return;
        }
        let new_end = first_index + data.len() as u64;

        // Coalesce with the closest stored interval at or before first_index.
        if let Some((&prev_start, prev)) = self.pending.range(..=first_index).next_back() {
            let prev_end = prev_start + prev.len() as u64;
            if new_end <= prev_end {
                // Already fully stored.
                self.maybe_close(&mut output);
                return;
            }
            if prev_end > first_index {
                let keep = (first_index - prev_start) as usize;
                self.bytes_pending -= (prev.len() - keep) as u64;
                if keep == 0 {
                    self.pending.remove(&prev_start);
                } else if let Some(stored) = self.pending.get_mut(&prev_start) {
                    stored.truncate(keep);
                }
            }
        }

        // Swallow stored intervals the new fragment overlaps on the right.
        loop {
            let Some((&next_start, next)) = self.pending.range(first_index..).next() else {
                break;
            };
            if next_start >= new_end {
                break;
            }
            let next_end = next_start + next.len() as u64;
            if next_end <= new_end {
                self.bytes_pending -= next.len() as u64;
                self.pending.remove(&next_start);
            } else {
                // Partial overlap: keep the suffix that extends past us.
                let cut = (new_end - next_start) as usize;
                let suffix = next[cut..].to_vec();
                self.pending.remove(&next_start);
                self.bytes_pending -= cut as u64;
                self.pending.insert(new_end, suffix);
                break;
            }
        }

        self.bytes_pending += data.len() as u64;
        self.pending.insert(first_index, data.to_vec());

        // Flush the contiguous prefix.
        while let Some(chunk) = self.pending.remove(&self.next_index) {
            output.push(&chunk);
            self.next_index += chunk.len() as u64;
            self.bytes_pending -= chunk.len() as u64;
        }

        self.maybe_close(&mut output);
    }

    fn maybe_close(&self, output: &mut Writer<'_>) {
        if self.eof_seen && self.bytes_pending == 0 {
            output.close();
        }
    }
}
