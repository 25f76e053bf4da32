//! Analyser Ring Buffer
//!
//! Single-writer, multi-reader circular buffer between the audio thread and
//! the display readers:
//! - The audio thread never waits: it takes a non-blocking shared lock and
//!   skips the block if a resize holds the storage
//! - Readers copy under a sequence counter and retry if a write overlapped
//! - Resizes are posted and applied later from a non-realtime thread

use std::hint::spin_loop;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};

use fe_core::{ChannelBuffer, FeError, FeResult, Sample};
use parking_lot::RwLock;

/// Reader copy attempts before returning a possibly torn snapshot
const MAX_READ_ATTEMPTS: usize = 8;

/// Marker for "no resize pending"
const NO_PENDING_RESIZE: usize = usize::MAX;

/// Result of `apply_pending_resize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Nothing was pending
    Idle,
    /// The buffer now has this size (0 = inactive)
    Applied(usize),
    /// The storage was busy; the request stays pending
    Deferred,
}

struct Storage {
    channels: Box<[Box<[AtomicU64]>]>,
    mask: usize,
}

impl Storage {
    fn new(num_channels: usize, size: usize) -> Self {
        let channels = (0..num_channels)
            .map(|_| {
                (0..size)
                    .map(|_| AtomicU64::new(0.0_f64.to_bits()))
                    .collect::<Box<[AtomicU64]>>()
            })
            .collect();

        Self {
            channels,
            mask: size.saturating_sub(1),
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }
}

/// Copy of the ring buffer contents
///
/// `channels` keeps the raw slot order; `write_index` is the slot the next
/// sample goes to, so the oldest sample sits there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingBufferSnapshot {
    pub channels: Vec<Vec<Sample>>,
    pub write_index: usize,
    /// Total samples pushed since the last resize (wrapping)
    pub samples_written: usize,
    /// Sequence value the copy was taken at
    pub sequence: u64,
    /// False if every attempt overlapped a write
    pub consistent: bool,
}

impl RingBufferSnapshot {
    pub fn size(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel, oldest first
    pub fn ordered(&self, channel: usize) -> impl Iterator<Item = Sample> + '_ {
        let data = self.channels.get(channel).map_or(&[][..], Vec::as_slice);
        let split = self.write_index.min(data.len());

        data[split..].iter().chain(data[..split].iter()).copied()
    }
}

/// Circular capture buffer for the spectrum, oscilloscope and goniometer
pub struct AnalyserRingBuffer {
    storage: RwLock<Storage>,
    num_channels: usize,
    /// Cached storage size for lock-free queries
    size: AtomicUsize,
    /// Total samples written (wrapping)
    write_position: AtomicUsize,
    /// Even while idle, odd during a write
    sequence: AtomicU64,
    pending_size: AtomicUsize,
}

impl std::fmt::Debug for AnalyserRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyserRingBuffer")
            .field("num_channels", &self.num_channels)
            .field("size", &self.size())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl AnalyserRingBuffer {
    /// Inactive buffer (size 0) capturing `num_channels` channels
    pub fn new(num_channels: usize) -> Self {
        Self {
            storage: RwLock::new(Storage::new(num_channels, 0)),
            num_channels,
            size: AtomicUsize::new(0),
            write_position: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            pending_size: AtomicUsize::new(NO_PENDING_RESIZE),
        }
    }

    /// Active buffer of `size` samples per channel
    pub fn with_size(num_channels: usize, size: usize) -> FeResult<Self> {
        Self::validate_size(size)?;

        let buffer = Self::new(num_channels);
        *buffer.storage.write() = Storage::new(num_channels, size);
        buffer.size.store(size, Ordering::Release);
        Ok(buffer)
    }

    fn validate_size(size: usize) -> FeResult<()> {
        if size == 0 || size.is_power_of_two() {
            Ok(())
        } else {
            Err(FeError::InvalidBufferSize(size))
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Samples per channel (0 while inactive)
    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.size() > 0
    }

    /// Changes whenever a write completes or a resize is applied
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn pending_size(&self) -> Option<usize> {
        match self.pending_size.load(Ordering::Acquire) {
            NO_PENDING_RESIZE => None,
            size => Some(size),
        }
    }

    /// Post a resize; 0 deactivates the buffer
    ///
    /// The new storage is allocated by the next `apply_pending_resize` call.
    pub fn set_analyser_buffer_size(&self, new_size: usize) -> FeResult<()> {
        Self::validate_size(new_size)?;

        self.pending_size.store(new_size, Ordering::Release);
        log::debug!("[AnalyserRingBuffer] Resize to {} posted", new_size);
        Ok(())
    }

    /// Apply a posted resize if the storage can be locked without waiting
    pub fn apply_pending_resize(&self) -> ResizeOutcome {
        let requested = self.pending_size.load(Ordering::Acquire);
        if requested == NO_PENDING_RESIZE {
            return ResizeOutcome::Idle;
        }

        let Some(mut storage) = self.storage.try_write() else {
            log::trace!("[AnalyserRingBuffer] Storage busy, resize to {} re-posted", requested);
            return ResizeOutcome::Deferred;
        };

        if storage.size() != requested {
            *storage = Storage::new(self.num_channels, requested);
        }

        self.size.store(requested, Ordering::Release);
        self.write_position.store(0, Ordering::Release);
        self.sequence.fetch_add(2, Ordering::AcqRel);

        // A newer request posted meanwhile stays pending
        let _ = self.pending_size.compare_exchange(
            requested,
            NO_PENDING_RESIZE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        drop(storage);
        log::debug!("[AnalyserRingBuffer] Resized to {}", requested);
        ResizeOutcome::Applied(requested)
    }

    /// Copy `num_samples` samples of `buffer` into the ring (audio thread)
    ///
    /// Only one thread may push. Buffers with fewer channels than the ring
    /// repeat their last channel. Returns false if the block was skipped
    /// because the buffer is inactive or being resized.
    pub fn push_samples(&self, buffer: &ChannelBuffer, start_sample: usize, num_samples: usize) -> bool {
        let Some(storage) = self.storage.try_read() else {
            return false;
        };

        let size = storage.size();
        let (start, num) = buffer.clamp_range(start_sample, num_samples);

        if size == 0 || buffer.num_channels() == 0 {
            return false;
        }

        // Only the last `size` samples survive
        let skip = num.saturating_sub(size);
        let position = self.write_position.load(Ordering::Relaxed);

        self.sequence.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);

        for (c, slots) in storage.channels.iter().enumerate() {
            let source = buffer.range(c.min(buffer.num_channels() - 1), start, num);

            for (i, &sample) in source.iter().enumerate().skip(skip) {
                let slot = position.wrapping_add(i) & storage.mask;
                slots[slot].store(sample.to_bits(), Ordering::Relaxed);
            }
        }

        self.write_position
            .store(position.wrapping_add(num), Ordering::Relaxed);
        self.sequence.fetch_add(1, Ordering::Release);

        true
    }

    /// Copy the buffer into `snapshot`, reusing its allocations
    ///
    /// Returns false if the buffer is inactive.
    pub fn read_into(&self, snapshot: &mut RingBufferSnapshot) -> bool {
        let storage = self.storage.read();
        let size = storage.size();

        if size == 0 {
            snapshot.channels.clear();
            return false;
        }

        snapshot.channels.resize_with(storage.channels.len(), Vec::new);
        for channel in &mut snapshot.channels {
            channel.resize(size, 0.0);
        }

        snapshot.consistent = false;

        for _ in 0..MAX_READ_ATTEMPTS {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                spin_loop();
                continue;
            }

            let position = self.write_position.load(Ordering::Relaxed);
            for (slots, channel) in storage.channels.iter().zip(snapshot.channels.iter_mut()) {
                for (slot, sample) in slots.iter().zip(channel.iter_mut()) {
                    *sample = f64::from_bits(slot.load(Ordering::Relaxed));
                }
            }

            fence(Ordering::Acquire);
            let after = self.sequence.load(Ordering::Relaxed);

            snapshot.write_index = position & storage.mask;
            snapshot.samples_written = position;
            snapshot.sequence = before;

            if before == after {
                snapshot.consistent = true;
                break;
            }
        }

        true
    }

    /// Fresh snapshot, or None while inactive
    pub fn read_snapshot(&self) -> Option<RingBufferSnapshot> {
        let mut snapshot = RingBufferSnapshot::default();
        self.read_into(&mut snapshot).then_some(snapshot)
    }

    /// Clear the contents without resizing
    pub fn clear(&self) {
        let Some(storage) = self.storage.try_write() else {
            return;
        };

        for slot in storage.channels.iter().flat_map(|c| c.iter()) {
            slot.store(0.0_f64.to_bits(), Ordering::Relaxed);
        }

        self.write_position.store(0, Ordering::Release);
        self.sequence.fetch_add(2, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(num_channels: usize, values: std::ops::Range<usize>) -> ChannelBuffer {
        let samples: Vec<Sample> = values.map(|v| v as Sample).collect();
        ChannelBuffer::from_channels(vec![samples; num_channels])
    }

    #[test]
    fn test_inactive_until_resized() {
        let ring = AnalyserRingBuffer::new(2);
        assert!(!ring.is_active());
        assert!(!ring.push_samples(&ramp(2, 0..4), 0, 4));
        assert!(ring.read_snapshot().is_none());

        ring.set_analyser_buffer_size(16).unwrap();
        assert!(!ring.is_active());
        assert_eq!(ring.apply_pending_resize(), ResizeOutcome::Applied(16));
        assert!(ring.is_active());
        assert_eq!(ring.apply_pending_resize(), ResizeOutcome::Idle);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let ring = AnalyserRingBuffer::new(2);
        assert!(matches!(
            ring.set_analyser_buffer_size(1000),
            Err(FeError::InvalidBufferSize(1000))
        ));
        assert_eq!(ring.pending_size(), None);
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let ring = AnalyserRingBuffer::with_size(1, 8).unwrap();
        ring.push_samples(&ramp(1, 0..6), 0, 6);
        ring.push_samples(&ramp(1, 6..11), 0, 5);

        let snapshot = ring.read_snapshot().unwrap();
        assert!(snapshot.consistent);
        assert_eq!(snapshot.channels[0], vec![8.0, 9.0, 10.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(snapshot.write_index, 3);

        let ordered: Vec<Sample> = snapshot.ordered(0).collect();
        assert_eq!(ordered, vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_block_longer_than_buffer() {
        let ring = AnalyserRingBuffer::with_size(1, 4).unwrap();
        ring.push_samples(&ramp(1, 0..10), 0, 10);

        let ordered: Vec<Sample> = ring.read_snapshot().unwrap().ordered(0).collect();
        assert_eq!(ordered, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_mono_input_fills_every_channel() {
        let ring = AnalyserRingBuffer::with_size(2, 4).unwrap();
        ring.push_samples(&ramp(1, 1..5), 0, 4);

        let snapshot = ring.read_snapshot().unwrap();
        assert_eq!(snapshot.channels[0], snapshot.channels[1]);
    }

    #[test]
    fn test_writer_skips_while_resizing() {
        let ring = AnalyserRingBuffer::with_size(2, 8).unwrap();
        let guard = ring.storage.write();
        assert!(!ring.push_samples(&ramp(2, 0..4), 0, 4));
        drop(guard);
        assert!(ring.push_samples(&ramp(2, 0..4), 0, 4));
    }

    #[test]
    fn test_resize_deferred_while_reader_holds_lock() {
        let ring = AnalyserRingBuffer::with_size(2, 8).unwrap();
        ring.set_analyser_buffer_size(32).unwrap();

        let guard = ring.storage.read();
        assert_eq!(ring.apply_pending_resize(), ResizeOutcome::Deferred);
        assert_eq!(ring.pending_size(), Some(32));
        drop(guard);

        assert_eq!(ring.apply_pending_resize(), ResizeOutcome::Applied(32));
        assert_eq!(ring.size(), 32);
    }

    #[test]
    fn test_sequence_advances_per_write() {
        let ring = AnalyserRingBuffer::with_size(2, 8).unwrap();
        let before = ring.sequence();
        ring.push_samples(&ramp(2, 0..4), 0, 4);
        assert_eq!(ring.sequence(), before + 2);
    }
}
