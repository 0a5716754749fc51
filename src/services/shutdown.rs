//! Termination handling
//!
//! A signal only flips the [`StopSignal`]; the loop notices at its next wait
//! (or as soon as the in-flight tick finishes) and the restore of automatic
//! fan control runs on the main thread after the loop has stopped. That way
//! no tick can re-assert manual control after the restore.

use crate::domain::DeviceHandle;
use crate::error::AppError;
use crate::gateway::DeviceGateway;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

/// Shared flag that wakes any waiter as soon as termination is requested
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination and wake every waiter
    pub fn request(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Whether termination has been requested
    pub fn is_requested(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `deadline` or until termination is requested
    ///
    /// Returns `true` if termination was requested.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *stopped
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `stop`
///
/// Can only be installed once per process.
pub fn install_signal_handler(stop: &StopSignal) -> Result<(), AppError> {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        stop.request();
    })
    .map_err(|e| AppError::Signal(e.to_string()))
}

/// Hands fan control back to the driver exactly once on the way out
pub struct ShutdownHandler<G> {
    gateway: G,
    stop: StopSignal,
    devices: Mutex<Vec<DeviceHandle>>,
    restored: AtomicBool,
}

impl<G: DeviceGateway> ShutdownHandler<G> {
    pub fn new(gateway: G, stop: StopSignal) -> Self {
        Self {
            gateway,
            stop,
            devices: Mutex::new(Vec::new()),
            restored: AtomicBool::new(false),
        }
    }

    /// Get a handle to the stop signal this handler raises
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Record the devices that need restoring at exit
    pub fn register_devices(&self, devices: &[DeviceHandle]) {
        let mut known = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        known.clear();
        known.extend_from_slice(devices);
    }

    /// Restore automatic fan control on every registered device
    ///
    /// Only the first call does anything; it returns how many devices were
    /// restored successfully. Devices are restored in parallel, so the total
    /// time is bounded by one command timeout.
    pub fn restore(&self) -> usize {
        if self.restored.swap(true, Ordering::SeqCst) {
            log::debug!("Automatic fan control already restored");
            return 0;
        }
        self.stop.request();

        let devices = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if devices.is_empty() {
            return 0;
        }

        log::info!("Restoring automatic fan control on {} GPU(s)", devices.len());
        let gateway = &self.gateway;
        thread::scope(|s| {
            let handles: Vec<_> = devices
                .iter()
                .map(|&device| s.spawn(move || gateway.set_auto_fan_control(device)))
                .collect();

            handles
                .into_iter()
                .zip(&devices)
                .map(|(handle, device)| match handle.join() {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        log::warn!("Failed to restore automatic fan control on {}: {}", device, e);
                        false
                    }
                    Err(_) => {
                        log::warn!("Restoring automatic fan control on {} panicked", device);
                        false
                    }
                })
                .filter(|restored| *restored)
                .count()
        })
    }
}
