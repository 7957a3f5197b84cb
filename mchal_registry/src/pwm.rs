//! PWM slice/channel claims, the slice frequency-compatibility policy,
//! and cooperative ramp cancellation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::RegistryError;

/// A PWM slice's shared, cross-channel state: the frequency currently in
/// effect and how many channels are using it. Reset to "no frequency"
/// once the last user releases.
pub(crate) struct SliceState {
    pub frequency: Option<u32>,
    pub user_count: u32,
}

impl SliceState {
    pub(crate) fn new() -> Self {
        SliceState {
            frequency: None,
            user_count: 0,
        }
    }

    /// Apply the slice frequency-compatibility policy (§4.C): the first
    /// claimant sets the frequency; later claimants must match it; the
    /// sole remaining user may change it.
    pub(crate) fn claim(&mut self, slice: u32, requested_hz: u32) -> Result<(), RegistryError> {
        match self.frequency {
            None => {
                self.frequency = Some(requested_hz);
                self.user_count += 1;
                Ok(())
            }
            Some(active) if active == requested_hz => {
                self.user_count += 1;
                Ok(())
            }
            Some(_active) if self.user_count <= 1 => {
                self.frequency = Some(requested_hz);
                Ok(())
            }
            Some(active) => {
                warn!(slice, requested_hz, active, "pwm slice frequency conflict");
                Err(RegistryError::FrequencyConflict {
                    slice,
                    requested: requested_hz,
                    active,
                })
            }
        }
    }

    pub(crate) fn release(&mut self) {
        self.user_count = self.user_count.saturating_sub(1);
        if self.user_count == 0 {
            self.frequency = None;
        }
    }
}

/// Linear interpolation shape for [`PwmHandle::ramp`]. The contract
/// reserves room for future shapes; only `Linear` is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampMode {
    /// Equal-sized steps from the current level to the target.
    Linear,
}

/// A claimed PWM channel.
pub struct PwmHandle {
    pin: u32,
    slice: u32,
    channel: u8,
    active_low: bool,
    top: u32,
    level: Arc<AtomicU32>,
    slice_state: Arc<Mutex<SliceState>>,
    ramp: Mutex<Option<RampControl>>,
    configured: std::sync::atomic::AtomicBool,
}

struct RampControl {
    cancel: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PwmHandle {
    pub(crate) fn new(
        pin: u32,
        slice: u32,
        channel: u8,
        active_low: bool,
        top: u32,
        slice_state: Arc<Mutex<SliceState>>,
    ) -> Self {
        PwmHandle {
            pin,
            slice,
            channel,
            active_low,
            top,
            level: Arc::new(AtomicU32::new(0)),
            slice_state,
            ramp: Mutex::new(None),
            configured: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Join this channel onto its slice at `frequency_hz`, applying the
    /// slice frequency-compatibility policy: the first channel to
    /// configure a slice sets its frequency; later channels must match
    /// it unless this is the sole remaining user, which may reconfigure
    /// freely.
    pub fn configure_frequency(&self, frequency_hz: u32) -> Result<(), RegistryError> {
        self.slice_state.lock().claim(self.slice, frequency_hz)?;
        self.configured.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// The pin number.
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// The slice id this channel belongs to.
    pub fn slice(&self) -> u32 {
        self.slice
    }

    /// Maximum logical level (inclusive); levels are always published in
    /// logical space `[0, top]` regardless of `active_low`.
    pub fn top(&self) -> u32 {
        self.top
    }

    /// Current logical level.
    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    /// The physical duty that would be driven for the current logical
    /// level: `top - level` when the channel is active-low, `level`
    /// otherwise.
    pub fn physical_level(&self) -> u32 {
        if self.active_low {
            self.top - self.level()
        } else {
            self.level()
        }
    }

    /// Cancel any active ramp and set the level immediately.
    pub fn set_level(&self, level: u32) {
        self.cancel_ramp_sync();
        self.level.store(level.min(self.top), Ordering::Relaxed);
    }

    /// Start a cooperative linear ramp from the current level to
    /// `target_level` over `steps` equal-duration intervals totalling
    /// `duration_ms`. Fails with [`RegistryError::Busy`] if a ramp is
    /// already active.
    pub fn ramp(&self, target_level: u32, duration_ms: u64, steps: u32, mode: RampMode) -> Result<(), RegistryError> {
        let RampMode::Linear = mode;
        if steps == 0 {
            self.set_level(target_level);
            return Ok(());
        }
        let mut guard = self.ramp.lock();
        if guard.is_some() {
            warn!(pin = self.pin, "ramp rejected: already active on this channel");
            return Err(RegistryError::Busy);
        }
        let target = target_level.min(self.top);
        let start = self.level();
        let step_duration = Duration::from_millis(duration_ms / steps as u64);
        let level = self.level.clone();
        let cancel = Arc::new(Notify::new());
        let cancel_for_task = cancel.clone();

        let task = tokio::spawn(async move {
            for step in 1..=steps {
                let frac = step as i64 * 65536 / steps as i64;
                let delta = (target as i64 - start as i64) * frac / 65536;
                let next = (start as i64 + delta).clamp(0, u32::MAX as i64) as u32;
                tokio::select! {
                    _ = tokio::time::sleep(step_duration) => {
                        level.store(next, Ordering::Relaxed);
                    }
                    _ = cancel_for_task.notified() => {
                        return;
                    }
                }
            }
        });
        *guard = Some(RampControl { cancel, task });
        Ok(())
    }

    /// Cancel any active ramp; a no-op if none is active. The task exits
    /// within one step duration, per the concurrency contract.
    pub fn stop_ramp(&self) {
        self.cancel_ramp_sync();
    }

    fn cancel_ramp_sync(&self) {
        if let Some(ctrl) = self.ramp.lock().take() {
            ctrl.cancel.notify_one();
            ctrl.task.abort();
        }
    }

    pub(crate) fn release(&self) {
        self.cancel_ramp_sync();
        self.level.store(0, Ordering::Relaxed);
        if self.configured.swap(false, Ordering::Relaxed) {
            self.slice_state.lock().release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Property 9: two channels on the same slice may share a frequency;
    /// a third at a different frequency conflicts; the sole remaining
    /// channel may reconfigure.
    #[test]
    fn slice_frequency_policy() {
        let mut state = SliceState::new();
        assert!(state.claim(0, 1000).is_ok());
        assert!(state.claim(0, 1000).is_ok());
        assert_eq!(state.user_count, 2);

        state.release();
        assert_eq!(state.user_count, 1);
        // sole remaining user may reconfigure
        assert!(state.claim(0, 2000).is_ok());
    }

    #[test]
    fn slice_frequency_conflict() {
        let mut state = SliceState::new();
        state.claim(0, 1000).unwrap();
        state.claim(0, 1000).unwrap();
        assert!(matches!(
            state.claim(0, 500),
            Err(RegistryError::FrequencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn release_drives_duty_to_zero() {
        let slice_state = Arc::new(Mutex::new(SliceState::new()));
        let handle = PwmHandle::new(2, 0, 0, false, 4095, slice_state.clone());
        handle.configure_frequency(1000).unwrap();
        handle.set_level(2000);
        assert_eq!(handle.level(), 2000);
        handle.release();
        assert_eq!(handle.level(), 0);
        assert_eq!(slice_state.lock().user_count, 0);
    }

    /// Scenario S5: starting a ramp then issuing `set_level` partway
    /// through interrupts it before its natural end, with the final
    /// level equal to the `set_level` target.
    #[tokio::test]
    async fn set_level_cancels_active_ramp() {
        let slice_state = Arc::new(Mutex::new(SliceState::new()));
        slice_state.lock().claim(0, 1000).unwrap();
        let handle = Arc::new(PwmHandle::new(2, 0, 0, false, 4095, slice_state));
        handle.ramp(4095, 1000, 32, RampMode::Linear).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.set_level(0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.level(), 0);
    }

    #[test]
    fn starting_ramp_while_active_is_busy() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let slice_state = Arc::new(Mutex::new(SliceState::new()));
            slice_state.lock().claim(0, 1000).unwrap();
            let handle = PwmHandle::new(2, 0, 0, false, 4095, slice_state);
            handle.ramp(4095, 1000, 32, RampMode::Linear).unwrap();
            assert!(matches!(handle.ramp(0, 100, 4, RampMode::Linear), Err(RegistryError::Busy)));
        });
    }
}
