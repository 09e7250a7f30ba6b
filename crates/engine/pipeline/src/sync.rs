//! Counting semaphore.
//!
//! The frame pipeline's rendezvous protocol is expressed with classic
//! semaphores; none exists in std, so this is a minimal condvar-backed
//! one.

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    count: Mutex<u32>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self { count: Mutex::new(initial), cv: Condvar::new() }
    }

    /// Blocks until a permit is available, then takes it.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cv.wait(&mut count);
        }
        *count -= 1;
    }

    /// Adds a permit, waking one waiter.
    pub fn release(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn initial_permits_are_takable() {
        let s = Semaphore::new(2);
        s.acquire();
        s.acquire();
        s.release();
        s.acquire();
    }

    #[test]
    fn release_unblocks_a_waiter() {
        let s = Arc::new(Semaphore::new(0));
        let s2 = s.clone();
        let t = std::thread::spawn(move || {
            s2.acquire();
            7
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        s.release();
        assert_eq!(t.join().unwrap(), 7);
    }

    #[test]
    fn ping_pong_order() {
        let a = Arc::new(Semaphore::new(1));
        let b = Arc::new(Semaphore::new(0));
        let (a2, b2) = (a.clone(), b.clone());
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let c2 = counter.clone();
        let t = std::thread::spawn(move || {
            for _ in 0..100 {
                a2.acquire();
                c2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                b2.release();
            }
        });
        for _ in 0..100 {
            b.acquire();
            a.release();
        }
        t.join().unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 100);
    }
}
