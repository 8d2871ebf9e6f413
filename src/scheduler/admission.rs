//! Bounded admission of jobs into execution.

use std::sync::{Arc, Mutex, MutexGuard};

/// Counts running jobs against a fixed maximum.
///
/// Slots are handed out as [`AdmissionSlot`] guards; dropping the guard
/// releases the slot, so a slot is returned on every exit path of the task
/// that holds it, including panics and task aborts.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    running: Mutex<usize>,
    max: usize,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter is a plain integer, a poisoned value is still valid.
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AdmissionGate {
    /// Creates a gate admitting at most `max` jobs at once (minimum 1).
    pub fn new(max: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                running: Mutex::new(0),
                max: max.max(1),
            }),
        }
    }

    /// Takes a slot if one is free.
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        let mut running = self.inner.lock();
        if *running >= self.inner.max {
            return None;
        }
        *running += 1;
        Some(AdmissionSlot {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn running(&self) -> usize {
        *self.inner.lock()
    }

    pub fn max(&self) -> usize {
        self.inner.max
    }
}

/// A held execution slot. Released on drop.
#[derive(Debug)]
pub struct AdmissionSlot {
    inner: Arc<GateInner>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        let mut running = self.inner.lock();
        *running = running.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_bounds_concurrency() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_acquire();
        let b = gate.try_acquire();

        assert!(a.is_some() && b.is_some());
        assert!(gate.try_acquire().is_none());
        assert_eq!(gate.running(), 2);

        drop(a);
        assert_eq!(gate.running(), 1);
        assert!(gate.try_acquire().is_some());
        assert_eq!(gate.running(), 1);
    }

    #[test]
    fn test_zero_max_is_raised_to_one() {
        let gate = AdmissionGate::new(0);
        assert_eq!(gate.max(), 1);
        let _slot = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());
    }

    #[tokio::test]
    async fn test_slot_released_when_task_panics() {
        let gate = AdmissionGate::new(1);
        let slot = gate.try_acquire().unwrap();

        let handle = tokio::spawn(async move {
            let _slot = slot;
            panic!("boom");
        });
        assert!(handle.await.is_err());

        assert_eq!(gate.running(), 0);
    }
}
