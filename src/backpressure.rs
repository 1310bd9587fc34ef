//! Outbound backpressure.
//!
//! Callers reserve the byte length of each payload before it is queued, and
//! the send loop releases it once the bytes are on the wire. When the
//! reserved total would exceed the channel's send buffer size, callers wait
//! (up to the send timeout) for the send loop to catch up.
//!
//! A payload larger than the whole budget is still accepted once nothing
//! else is pending, so oversized sends never deadlock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ChannelError, Result};

/// Interval between backpressure checks.
const CHECK_INTERVAL: Duration = Duration::from_micros(100);

/// Byte-budget controller shared by senders and the send loop.
#[derive(Debug, Clone)]
pub(crate) struct BackpressureController {
    /// Bytes reserved but not yet written.
    pending: Arc<AtomicUsize>,
    /// Byte budget.
    max_pending: usize,
    /// How long `reserve` waits.
    timeout: Duration,
}

impl BackpressureController {
    pub fn new(max_pending: usize, timeout: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending,
            timeout,
        }
    }

    #[inline]
    fn fits(&self, current: usize, bytes: usize) -> bool {
        current == 0 || current.saturating_add(bytes) <= self.max_pending
    }

    /// Check if the budget is exhausted.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Bytes currently reserved.
    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Reserve `bytes` without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` if the budget is exhausted.
    pub fn try_reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            if !self.fits(current, bytes) {
                return Err(ChannelError::BackpressureTimeout);
            }
            match self.pending.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Reserve `bytes`, waiting for the send loop if necessary.
    ///
    /// Returns `Err(BackpressureTimeout)` if the timeout is reached.
    pub async fn reserve(&self, bytes: usize) -> Result<()> {
        // Fast path
        if self.try_reserve(bytes).is_ok() {
            return Ok(());
        }

        let start = Instant::now();
        loop {
            tokio::time::sleep(CHECK_INTERVAL).await;

            if self.try_reserve(bytes).is_ok() {
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(ChannelError::BackpressureTimeout);
            }
        }
    }

    /// Release bytes after they were written (or dropped).
    #[inline]
    pub fn release(&self, bytes: usize) {
        self.pending.fetch_sub(bytes, Ordering::Release);
    }
}

/// Releases a reservation on drop unless disarmed.
pub(crate) struct BackpressureGuard {
    controller: BackpressureController,
    bytes: usize,
    released: bool,
}

impl BackpressureGuard {
    pub fn new(controller: BackpressureController, bytes: usize) -> Self {
        Self {
            controller,
            bytes,
            released: false,
        }
    }

    /// Hand the reservation over to the send loop.
    pub fn disarm(&mut self) {
        self.released = true;
    }
}

impl Drop for BackpressureGuard {
    fn drop(&mut self) {
        if !self.released {
            self.controller.release(self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max: usize) -> BackpressureController {
        BackpressureController::new(max, Duration::from_secs(5))
    }

    #[test]
    fn test_controller_creation() {
        let ctrl = controller(100);
        assert_eq!(ctrl.pending_bytes(), 0);
        assert!(ctrl.try_reserve(100).is_ok());
        ctrl.release(100);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_try_reserve_within_budget() {
        let ctrl = controller(10);

        ctrl.try_reserve(4).unwrap();
        ctrl.try_reserve(6).unwrap();

        assert_eq!(ctrl.pending_bytes(), 10);
        assert!(ctrl.is_active());
        assert!(matches!(
            ctrl.try_reserve(1),
            Err(ChannelError::BackpressureTimeout)
        ));
    }

    #[test]
    fn test_oversized_payload_accepted_when_idle() {
        let ctrl = controller(10);

        ctrl.try_reserve(50).unwrap();
        assert_eq!(ctrl.pending_bytes(), 50);
        assert!(ctrl.try_reserve(1).is_err());

        ctrl.release(50);
        assert!(ctrl.try_reserve(50).is_ok());
    }

    #[test]
    fn test_release() {
        let ctrl = controller(10);
        ctrl.try_reserve(3).unwrap();
        ctrl.try_reserve(2).unwrap();

        ctrl.release(3);
        assert_eq!(ctrl.pending_bytes(), 2);

        ctrl.release(2);
        assert_eq!(ctrl.pending_bytes(), 0);
    }

    #[test]
    fn test_clone_shares_state() {
        let ctrl1 = controller(10);
        let ctrl2 = ctrl1.clone();

        ctrl1.try_reserve(4).unwrap();
        assert_eq!(ctrl2.pending_bytes(), 4);
    }

    #[tokio::test]
    async fn test_reserve_immediate() {
        let ctrl = controller(10);
        ctrl.reserve(5).await.unwrap();
        assert_eq!(ctrl.pending_bytes(), 5);
    }

    #[tokio::test]
    async fn test_reserve_timeout() {
        let ctrl = BackpressureController::new(1, Duration::from_millis(10));
        ctrl.try_reserve(1).unwrap();

        let start = Instant::now();
        let result = ctrl.reserve(1).await;

        assert!(matches!(result, Err(ChannelError::BackpressureTimeout)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_reserve_wait_success() {
        let ctrl = BackpressureController::new(8, Duration::from_secs(1));
        ctrl.try_reserve(8).unwrap();

        let releaser = ctrl.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            releaser.release(8);
        });

        ctrl.reserve(8).await.unwrap();
        assert_eq!(ctrl.pending_bytes(), 8);
    }

    #[test]
    fn test_guard_release_on_drop() {
        let ctrl = controller(10);
        ctrl.try_reserve(7).unwrap();

        {
            let _guard = BackpressureGuard::new(ctrl.clone(), 7);
        }

        assert_eq!(ctrl.pending_bytes(), 0);
    }

    #[test]
    fn test_guard_disarm() {
        let ctrl = controller(10);
        ctrl.try_reserve(7).unwrap();

        {
            let mut guard = BackpressureGuard::new(ctrl.clone(), 7);
            guard.disarm();
        }

        assert_eq!(ctrl.pending_bytes(), 7);
    }
}
