use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::errors::*;
use crate::settings::{AnimationParams, Synchronization};
use crate::utils::pool::ObjectPool;
use crate::video::RenderState;

use super::{AnimationHandle, SharedAnimation};

#[derive(Default)]
struct Pending {
    added: Vec<(AnimationHandle, SharedAnimation)>,
    removed: Vec<AnimationHandle>,
}

#[derive(Default)]
struct Step {
    frame_requested: bool,
    step_done: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    paused: AtomicBool,
    closed: AtomicBool,
    step: Mutex<Step>,
    signal: Condvar,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Blocks the animation thread until a frame was requested.
    fn wait_for_frame(&self) {
        let mut step = self.step.lock().unwrap();
        while !step.frame_requested && !self.is_closed() {
            step = self.signal.wait(step).unwrap();
        }

        step.frame_requested = false;
    }

    fn finish_step(&self) {
        let mut step = self.step.lock().unwrap();
        step.step_done = true;
        self.signal.notify_all();
    }
}

/// Owns the animation thread and the registry of animations.
///
/// Registration is thread-safe: added and removed animations are queued and
/// merged into the live list at the top of every iteration of the animation
/// thread, never in the middle of one.
///
/// With `Synchronization::Lockstep` the render thread paces the animation
/// thread. Every frame calls `next_frame` to start a step and `wait_for_step`
/// to wait for its completion. With `Synchronization::Free` the thread steps
/// every `step_interval_ms`.
pub struct AnimationManager {
    params: AnimationParams,
    shared: Arc<Shared>,
    registry: Mutex<ObjectPool<AnimationHandle, SharedAnimation>>,
    thread: Option<JoinHandle<()>>,
}

impl AnimationManager {
    /// Spawns the animation thread.
    pub fn new(params: AnimationParams) -> Result<Self> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            paused: AtomicBool::new(params.start_paused),
            closed: AtomicBool::new(false),
            step: Mutex::new(Step::default()),
            signal: Condvar::new(),
        });

        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("Animation".into())
                .spawn(move || run(&shared, params))
                .map_err(Error::from)?
        };

        info!("Animation thread started ({:?}).", params.synchronization);

        Ok(AnimationManager {
            params,
            shared,
            registry: Mutex::new(ObjectPool::new()),
            thread: Some(thread),
        })
    }

    #[inline]
    pub fn params(&self) -> &AnimationParams {
        &self.params
    }

    /// Registers an animation. It is picked up by the animation thread at
    /// the start of its next iteration.
    pub fn add_animation(&self, animation: SharedAnimation) -> AnimationHandle {
        let handle = self.registry.lock().unwrap().create(animation.clone());
        self.shared
            .pending
            .lock()
            .unwrap()
            .added
            .push((handle, animation));
        handle
    }

    /// Unregisters an animation. Returns `false` if the handle is stale.
    pub fn remove_animation(&self, handle: AnimationHandle) -> bool {
        if self.registry.lock().unwrap().free(handle).is_none() {
            warn!("Removing stale {}.", handle);
            return false;
        }

        self.shared.pending.lock().unwrap().removed.push(handle);
        true
    }

    #[inline]
    pub fn is_alive(&self, handle: AnimationHandle) -> bool {
        self.registry.lock().unwrap().is_alive(handle)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `gl_animate` of every registered animation that uses it, on the
    /// calling (render) thread.
    pub fn update_graphics(&self, rs: &mut RenderState, dt: f64) -> Result<()> {
        let animations: Vec<SharedAnimation> = {
            let registry = self.registry.lock().unwrap();
            registry.iter().map(|(_, v)| v.clone()).collect()
        };

        for v in animations {
            let mut animation = v.lock().unwrap();
            if animation.use_gl_animation() {
                animation.gl_animate(rs, dt)?;
            }
        }

        Ok(())
    }

    /// Skips `animate` calls until `resume`. The thread keeps its cadence,
    /// so time deltas do not jump when resuming.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Lets the animation thread start its next step. Does nothing unless
    /// synchronization is `Lockstep`.
    pub fn next_frame(&self) {
        if self.params.synchronization != Synchronization::Lockstep {
            return;
        }

        let mut step = self.shared.step.lock().unwrap();
        step.frame_requested = true;
        self.shared.signal.notify_all();
    }

    /// Blocks until the animation thread finished a step. Returns immediately
    /// unless synchronization is `Lockstep`, or once the manager is closed.
    pub fn wait_for_step(&self) {
        if self.params.synchronization != Synchronization::Lockstep {
            return;
        }

        let mut step = self.shared.step.lock().unwrap();
        while !step.step_done && !self.shared.is_closed() {
            step = self.shared.signal.wait(step).unwrap();
        }

        step.step_done = false;
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stops the animation thread and waits for it. An `animate` call in
    /// flight completes first. Calling it again does nothing.
    pub fn close(&mut self) {
        let thread = match self.thread.take() {
            Some(v) => v,
            None => return,
        };

        {
            let _step = self.shared.step.lock().unwrap();
            self.shared.closed.store(true, Ordering::Release);
            self.shared.signal.notify_all();
        }

        if thread.join().is_err() {
            error!("Animation thread panicked.");
        }

        info!("Animation thread stopped.");
    }
}

impl Drop for AnimationManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn merge(shared: &Shared, animations: &mut Vec<(AnimationHandle, SharedAnimation)>) {
    let mut pending = shared.pending.lock().unwrap();
    animations.extend(pending.added.drain(..));

    for handle in pending.removed.drain(..) {
        animations.retain(|v| v.0 != handle);
    }
}

fn run(shared: &Shared, params: AnimationParams) {
    let mut animations = Vec::new();
    let mut last = Instant::now();

    let lockstep = params.synchronization == Synchronization::Lockstep;

    while !shared.is_closed() {
        if lockstep {
            shared.wait_for_frame();
            if shared.is_closed() {
                break;
            }
        }

        merge(shared, &mut animations);

        if !lockstep && animations.is_empty() {
            thread::sleep(params.idle_sleep());
            last = Instant::now();
            continue;
        }

        let now = Instant::now();
        let elapsed = now - last;
        last = now;

        if !shared.paused.load(Ordering::Acquire) {
            let dt = elapsed.as_secs() as f64 * 1000.0 + f64::from(elapsed.subsec_nanos()) / 1e6;
            for (_, v) in &animations {
                let mut animation = v.lock().unwrap();
                if animation.use_animation() {
                    animation.animate(dt);
                }
            }
        }

        if lockstep {
            shared.finish_step();
        } else {
            let spent = Instant::now() - now;
            let interval = params.step_interval();
            if spent < interval {
                thread::sleep(interval - spent);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::animation::{shared, Animation};

    use std::sync::atomic::AtomicUsize;

    struct Counter(Arc<AtomicUsize>);

    impl Animation for Counter {
        fn animate(&mut self, _: f64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lockstep() -> AnimationParams {
        AnimationParams {
            synchronization: Synchronization::Lockstep,
            ..AnimationParams::default()
        }
    }

    #[test]
    fn lockstep_steps() {
        let manager = AnimationManager::new(lockstep()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        manager.add_animation(shared(Counter(count.clone())));

        for _ in 0..3 {
            manager.next_frame();
            manager.wait_for_step();
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn paused_skips_animate() {
        let manager = AnimationManager::new(lockstep()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = manager.add_animation(shared(Counter(count.clone())));

        manager.pause();
        assert!(manager.is_paused());
        manager.next_frame();
        manager.wait_for_step();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        manager.resume();
        manager.next_frame();
        manager.wait_for_step();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(manager.remove_animation(handle));
        assert!(!manager.remove_animation(handle));
        manager.next_frame();
        manager.wait_for_step();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_twice() {
        let mut manager = AnimationManager::new(AnimationParams::default()).unwrap();
        manager.close();
        manager.close();
        assert!(manager.is_closed());
        manager.wait_for_step();
    }
}
