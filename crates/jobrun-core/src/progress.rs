//! Lock-free aggregate progress value.
//!
//! The runner accumulates weighted progress from job completions and from
//! jobs publishing fractional progress mid-run; publication may race with
//! listener attachment, so the value lives outside the queue lock as an
//! f32 stored bit-for-bit in an `AtomicU32`.

use std::sync::atomic::{AtomicU32, Ordering};

/// Atomic f32 accumulator. `add` is the accumulation path; `set` is the
/// manual override surface (`Runner::set_progress`).
#[derive(Debug, Default)]
pub struct AtomicProgress(AtomicU32);

impl AtomicProgress {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Release);
    }

    /// Adds `delta` and returns the new value.
    pub fn add(&self, delta: f32) -> f32 {
        let mut cur = self.0.load(Ordering::Acquire);
        loop {
            let next = f32::from_bits(cur) + delta;
            match self.0.compare_exchange_weak(
                cur,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => cur = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn add_accumulates() {
        let p = AtomicProgress::default();
        assert_eq!(p.get(), 0.0);
        assert!((p.add(0.5) - 0.5).abs() < 1e-6);
        assert!((p.add(0.3) - 0.8).abs() < 1e-6);
        assert!((p.get() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn set_overrides() {
        let p = AtomicProgress::new(0.9);
        p.set(0.4);
        assert!((p.get() - 0.4).abs() < 1e-6);
        assert!((p.add(0.1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn concurrent_adds_do_not_lose_updates() {
        let p = Arc::new(AtomicProgress::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        p.add(0.001);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 8000 adds of 0.001; allow generous float tolerance.
        assert!((p.get() - 8.0).abs() < 0.01);
    }
}
