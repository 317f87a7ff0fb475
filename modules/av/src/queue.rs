use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// A decoded unit of audio or video.
pub trait Frame: Send {
    /// Bytes of decoded data held by the frame.
    fn size(&self) -> usize;
}

struct Frames<F> {
    queue: VecDeque<F>,
    cached_bytes: usize,
}

/// A FIFO of decoded frames with back-pressure.
///
/// `push` blocks while the queue holds more than `max_cached_bytes` *and*
/// more than `min_frames` frames, polling until the consumer pops or the
/// queue is made inactive. The frame count floor keeps streams with large
/// frames from starving the consumer.
pub struct FrameQueue<F: Frame> {
    frames: Mutex<Frames<F>>,
    max_cached_bytes: usize,
    min_frames: usize,
    poll_interval: Duration,
    active: AtomicBool,
}

impl<F: Frame> FrameQueue<F> {
    pub fn new(max_cached_bytes: usize, min_frames: usize) -> Self {
        FrameQueue {
            frames: Mutex::new(Frames {
                queue: VecDeque::new(),
                cached_bytes: 0,
            }),
            max_cached_bytes,
            min_frames,
            poll_interval: Duration::from_millis(10),
            active: AtomicBool::new(true),
        }
    }

    /// Sets how long a blocked `push` sleeps between checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[inline]
    pub fn max_cached_bytes(&self) -> usize {
        self.max_cached_bytes
    }

    #[inline]
    pub fn min_frames(&self) -> usize {
        self.min_frames
    }

    fn is_full(&self) -> bool {
        let frames = self.frames.lock().unwrap();
        frames.cached_bytes > self.max_cached_bytes && frames.queue.len() > self.min_frames
    }

    /// Appends a frame, waiting while the queue is full and active.
    pub fn push(&self, frame: F) {
        while self.is_active() && self.is_full() {
            thread::sleep(self.poll_interval);
        }

        let mut frames = self.frames.lock().unwrap();
        frames.cached_bytes += frame.size();
        frames.queue.push_back(frame);
    }

    /// Removes the oldest frame.
    pub fn pop(&self) -> Option<F> {
        let mut frames = self.frames.lock().unwrap();
        let frame = frames.queue.pop_front()?;
        frames.cached_bytes -= frame.size();
        Some(frame)
    }

    /// Runs `func` with the oldest frame without removing it.
    pub fn front<T, R>(&self, func: T) -> Option<R>
    where
        T: FnOnce(&F) -> R,
    {
        let frames = self.frames.lock().unwrap();
        frames.queue.front().map(func)
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cached_bytes(&self) -> usize {
        self.frames.lock().unwrap().cached_bytes
    }

    /// Drops every queued frame.
    pub fn clear(&self) {
        let mut frames = self.frames.lock().unwrap();
        frames.queue.clear();
        frames.cached_bytes = 0;
    }

    /// Releases producers blocked in `push`, and keeps them from blocking
    /// again.
    pub fn set_inactive(&self) {
        debug!("Frame queue set inactive with {} frames.", self.len());
        self.active.store(false, Ordering::Release);
    }

    pub fn set_active(&self) {
        self.active.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
