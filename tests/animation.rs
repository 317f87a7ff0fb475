extern crate env_logger;
extern crate strata;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strata::prelude::*;

struct Ticker {
    ticks: Arc<AtomicUsize>,
    elapsed: f64,
}

impl Animation for Ticker {
    fn animate(&mut self, dt: f64) {
        self.elapsed += dt;
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fader {
    input: Arc<ShaderInput>,
    uploads: Arc<AtomicUsize>,
}

impl Animation for Fader {
    fn gl_animate(&mut self, _: &mut RenderState, dt: f64) -> Result<()> {
        let alpha: f32 = self.input.get()?;
        self.input.set(alpha + dt as f32)?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn use_animation(&self) -> bool {
        false
    }

    fn use_gl_animation(&self) -> bool {
        true
    }
}

fn ticker(ticks: &Arc<AtomicUsize>) -> SharedAnimation {
    shared(Ticker {
        ticks: ticks.clone(),
        elapsed: 0.0,
    })
}

#[test]
fn concurrent_registration() {
    let _ = env_logger::try_init();
    let params = AnimationParams {
        step_interval_ms: 1,
        idle_sleep_ms: 1,
        ..AnimationParams::default()
    };

    let manager = Arc::new(AnimationManager::new(params).unwrap());
    let ticks = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let ticks = ticks.clone();
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..50 {
                    let handle = manager.add_animation(ticker(&ticks));
                    if i % 2 == 0 {
                        assert!(manager.remove_animation(handle));
                    } else {
                        kept.push(handle);
                    }
                }

                kept
            })
        })
        .collect();

    let mut kept = Vec::new();
    for v in workers {
        kept.extend(v.join().unwrap());
    }

    assert_eq!(manager.len(), 100);
    assert!(kept.iter().all(|&v| manager.is_alive(v)));

    let start = ticks.load(Ordering::SeqCst);
    let mut waited = 0;
    while ticks.load(Ordering::SeqCst) == start && waited < 200 {
        thread::sleep(Duration::from_millis(5));
        waited += 1;
    }

    assert!(ticks.load(Ordering::SeqCst) > start);

    for v in kept {
        assert!(manager.remove_animation(v));
    }

    assert!(manager.is_empty());
}

#[test]
fn lockstep_runs_once_per_frame() {
    let params = AnimationParams {
        synchronization: Synchronization::Lockstep,
        ..AnimationParams::default()
    };

    let manager = AnimationManager::new(params).unwrap();
    let ticks = Arc::new(AtomicUsize::new(0));
    manager.add_animation(ticker(&ticks));
    manager.add_animation(ticker(&ticks));

    for frame in 1..=5 {
        manager.next_frame();
        manager.wait_for_step();
        assert_eq!(ticks.load(Ordering::SeqCst), frame * 2);
    }
}

#[test]
fn graphics_half_runs_on_caller() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let params = AnimationParams {
        start_paused: true,
        ..AnimationParams::default()
    };

    let manager = AnimationManager::new(params).unwrap();
    let uploads = Arc::new(AtomicUsize::new(0));
    let alpha = ShaderInput::uniform("alpha", 0.0f32);

    manager.add_animation(shared(Fader {
        input: alpha.clone(),
        uploads: uploads.clone(),
    }));

    manager.update_graphics(&mut rs, 0.25).unwrap();
    manager.update_graphics(&mut rs, 0.25).unwrap();

    assert_eq!(uploads.load(Ordering::SeqCst), 2);
    assert_eq!(alpha.get::<f32>().unwrap(), 0.5);
}
