//! Control loop
//!
//! Samples every device at a fixed rate, runs its controller, clamps the
//! result and applies it. Faults are scoped to one device and one tick.

use crate::domain::{ControlParameters, DeviceHandle, FanCommand, FanSpeed, Sample, Temperature};
use crate::error::{AppError, ControlError, GatewayError};
use crate::gateway::DeviceGateway;
use crate::services::pid::{ControllerState, PidController};
use crate::services::safety::SafetyClamp;
use crate::services::shutdown::StopSignal;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

/// Lifecycle of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Devices not yet enumerated
    Starting,
    /// Ticking
    Running,
    /// Termination requested; no further ticks
    Stopping,
    /// Terminal
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Starting => write!(f, "Starting"),
            LoopState::Running => write!(f, "Running"),
            LoopState::Stopping => write!(f, "Stopping"),
            LoopState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// What happened to one device during a tick
#[derive(Debug)]
pub enum DeviceOutcome {
    /// A new speed was sent to the device
    Applied {
        temperature: Temperature,
        speed: FanSpeed,
        overridden: bool,
    },
    /// The computed speed matched the last applied one; nothing was sent
    Unchanged {
        temperature: Temperature,
        speed: FanSpeed,
        overridden: bool,
    },
    /// Temperature read failed; controller state untouched
    SensorFault(GatewayError),
    /// Controller refused the sample; controller state untouched
    ControllerFault(ControlError),
    /// Controller state advanced but the device rejected the speed
    ActuationFault {
        temperature: Temperature,
        speed: FanSpeed,
        error: GatewayError,
    },
    /// The device's worker panicked; its last committed state is kept
    Panicked(String),
}

impl DeviceOutcome {
    /// The speed computed for this tick, if the controller got that far
    pub fn speed(&self) -> Option<FanSpeed> {
        match self {
            DeviceOutcome::Applied { speed, .. }
            | DeviceOutcome::Unchanged { speed, .. }
            | DeviceOutcome::ActuationFault { speed, .. } => Some(*speed),
            DeviceOutcome::SensorFault(_)
            | DeviceOutcome::ControllerFault(_)
            | DeviceOutcome::Panicked(_) => None,
        }
    }

    /// Whether the safety ceiling forced full speed
    pub fn is_override(&self) -> bool {
        matches!(
            self,
            DeviceOutcome::Applied {
                overridden: true,
                ..
            } | DeviceOutcome::Unchanged {
                overridden: true,
                ..
            }
        )
    }
}

/// Per-device result of a tick
#[derive(Debug)]
pub struct DeviceReport {
    pub device: DeviceHandle,
    pub outcome: DeviceOutcome,
}

/// Result of one tick across all devices, in device order
#[derive(Debug, Default)]
pub struct TickReport {
    pub devices: Vec<DeviceReport>,
}

impl TickReport {
    /// Outcome for a given device
    pub fn outcome(&self, device: DeviceHandle) -> Option<&DeviceOutcome> {
        self.devices
            .iter()
            .find(|r| r.device == device)
            .map(|r| &r.outcome)
    }

    /// Number of devices that hit any fault this tick
    pub fn fault_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    DeviceOutcome::SensorFault(_)
                        | DeviceOutcome::ControllerFault(_)
                        | DeviceOutcome::ActuationFault { .. }
                        | DeviceOutcome::Panicked(_)
                )
            })
            .count()
    }
}

/// One device's controller memory plus what was last sent to it
#[derive(Debug)]
struct DeviceSlot {
    device: DeviceHandle,
    state: ControllerState,
    last_applied: Option<FanSpeed>,
}

impl DeviceSlot {
    fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            state: ControllerState::default(),
            last_applied: None,
        }
    }
}

/// Everything a device needs during a tick, shared read-only across threads
struct TickContext<'a, G> {
    gateway: &'a G,
    pid: &'a PidController,
    clamp: &'a SafetyClamp,
    skip_unchanged: bool,
}

impl<G> Clone for TickContext<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for TickContext<'_, G> {}

impl<G: DeviceGateway> TickContext<'_, G> {
    fn process(&self, slot: &mut DeviceSlot, now: Instant) -> DeviceOutcome {
        let temperature = match self.gateway.read_temperature(slot.device) {
            Ok(temperature) => temperature,
            Err(e) => {
                log::warn!("Skipping {} this tick: {}", slot.device, e);
                return DeviceOutcome::SensorFault(e);
            }
        };
        let sample = Sample::new(slot.device, temperature, now);
        let celsius = sample.temperature.as_celsius();

        let (raw, next) = match self.pid.step(&slot.state, celsius, sample.taken_at) {
            Ok(step) => step,
            Err(e) => {
                log::warn!("Skipping {} this tick: {}", slot.device, e);
                return DeviceOutcome::ControllerFault(e);
            }
        };
        slot.state = next;

        let overridden = self.clamp.is_over_ceiling(celsius);
        let speed = self.clamp.clamp(raw, celsius);
        if overridden {
            log::warn!(
                "{} at {} reached the safety ceiling ({}°C), forcing fans to {}",
                slot.device,
                temperature,
                self.clamp.ceiling(),
                speed
            );
        }

        // The override is re-sent every tick in case manual control was lost
        if self.skip_unchanged && !overridden && slot.last_applied == Some(speed) {
            log::debug!(
                "{}: temp={}, raw={}, fan unchanged at {}",
                slot.device,
                temperature,
                raw,
                speed
            );
            return DeviceOutcome::Unchanged {
                temperature,
                speed,
                overridden,
            };
        }

        match self.gateway.set_fan_speed(FanCommand::new(slot.device, speed)) {
            Ok(()) => {
                log::info!(
                    "{}: temp={}, raw={}, fan set to {}",
                    slot.device,
                    temperature,
                    raw,
                    speed
                );
                slot.last_applied = Some(speed);
                DeviceOutcome::Applied {
                    temperature,
                    speed,
                    overridden,
                }
            }
            Err(error) => {
                log::warn!("{}", error);
                // Fan speed is now unknown; resend next tick
                slot.last_applied = None;
                DeviceOutcome::ActuationFault {
                    temperature,
                    speed,
                    error,
                }
            }
        }
    }
}

/// Fixed-rate closed-loop fan controller
pub struct ControlLoop<G> {
    gateway: G,
    params: ControlParameters,
    pid: PidController,
    clamp: SafetyClamp,
    selection: Vec<u32>,
    skip_unchanged: bool,
    slots: Vec<DeviceSlot>,
    state: LoopState,
    stop: StopSignal,
}

impl<G: DeviceGateway> ControlLoop<G> {
    /// Create a loop in the `Starting` state
    ///
    /// `params` are checked by [`ControlLoop::run`]; callers driving
    /// [`ControlLoop::tick`] directly should validate them first.
    pub fn new(gateway: G, params: ControlParameters, stop: StopSignal) -> Self {
        Self {
            pid: PidController::new(&params),
            clamp: SafetyClamp::new(&params),
            gateway,
            params,
            selection: Vec::new(),
            skip_unchanged: true,
            slots: Vec::new(),
            state: LoopState::Starting,
            stop,
        }
    }

    /// Builder: only control these GPU indices (empty means all)
    pub fn with_selection(mut self, indices: Vec<u32>) -> Self {
        self.selection = indices;
        self
    }

    /// Builder: whether to skip sending a speed equal to the last one applied
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Get the control parameters
    pub fn params(&self) -> &ControlParameters {
        &self.params
    }

    /// Devices under control, in index order
    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.slots.iter().map(|slot| slot.device).collect()
    }

    /// Controller memory of one device
    pub fn controller_state(&self, device: DeviceHandle) -> Option<ControllerState> {
        self.slots
            .iter()
            .find(|slot| slot.device == device)
            .map(|slot| slot.state)
    }

    /// Enumerate devices and move to `Running`
    ///
    /// Discovery failure is fatal: the loop moves straight to `Stopped`.
    pub fn start(&mut self) -> Result<(), GatewayError> {
        if self.state != LoopState::Starting {
            log::debug!("Control loop already started ({})", self.state);
            return Ok(());
        }

        match self.discover() {
            Ok(devices) => {
                log::info!(
                    "Controlling {} GPU(s): {:?}",
                    devices.len(),
                    devices.iter().map(DeviceHandle::index).collect::<Vec<_>>()
                );
                self.slots = devices.into_iter().map(DeviceSlot::new).collect();
                self.state = LoopState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = LoopState::Stopped;
                Err(e)
            }
        }
    }

    fn discover(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        let found = self.gateway.list_devices()?;
        if self.selection.is_empty() {
            return Ok(found);
        }

        let mut selected = self.selection.clone();
        selected.sort_unstable();
        selected.dedup();
        selected
            .into_iter()
            .map(|index| {
                let device = DeviceHandle::new(index);
                if found.contains(&device) {
                    Ok(device)
                } else {
                    Err(GatewayError::Discovery(format!(
                        "selected GPU {} not found (available: {:?})",
                        index,
                        found.iter().map(DeviceHandle::index).collect::<Vec<_>>()
                    )))
                }
            })
            .collect()
    }

    /// Run one tick for every device at time `now`
    ///
    /// Devices are processed in parallel; each thread owns exactly one
    /// device's controller state. A panic while processing a device is
    /// reported as that device's outcome. If termination was requested by
    /// the time the tick finishes, the loop moves to `Stopping`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let ctx = TickContext {
            gateway: &self.gateway,
            pid: &self.pid,
            clamp: &self.clamp,
            skip_unchanged: self.skip_unchanged,
        };

        let devices = if self.slots.len() <= 1 {
            self.slots
                .iter_mut()
                .map(|slot| {
                    let device = slot.device;
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.process(slot, now)))
                        .unwrap_or_else(|payload| panicked(device, payload));
                    DeviceReport { device, outcome }
                })
                .collect()
        } else {
            thread::scope(|s| {
                let handles: Vec<_> = self
                    .slots
                    .iter_mut()
                    .map(|slot| {
                        let device = slot.device;
                        (device, s.spawn(move || ctx.process(slot, now)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(device, handle)| DeviceReport {
                        device,
                        outcome: handle
                            .join()
                            .unwrap_or_else(|payload| panicked(device, payload)),
                    })
                    .collect()
            })
        };

        if self.state == LoopState::Running && self.stop.is_requested() {
            self.begin_stopping();
        }

        TickReport { devices }
    }

    fn begin_stopping(&mut self) {
        log::info!("Control loop stopping");
        self.state = LoopState::Stopping;
    }

    /// Start if needed, then tick until termination is requested
    ///
    /// Ticks are scheduled at a fixed rate. A tick that overruns the
    /// interval is followed immediately by the next one, without trying to
    /// catch up on missed ticks.
    ///
    /// # Errors
    /// Invalid parameters and discovery failures are returned before any
    /// device is touched.
    pub fn run(&mut self) -> Result<(), AppError> {
        self.params.validate()?;
        self.start()?;
        if self.state == LoopState::Stopped {
            return Ok(());
        }

        let interval = self.params.sample_interval;
        log::info!(
            "Control loop running: target={}°C, interval={:?}",
            self.params.target_temperature,
            interval
        );

        let mut next_tick = Instant::now();
        while self.state == LoopState::Running {
            if self.stop.is_requested() {
                self.begin_stopping();
                break;
            }

            let report = self.tick(Instant::now());
            if report.fault_count() > 0 {
                log::debug!(
                    "{} of {} GPU(s) faulted this tick",
                    report.fault_count(),
                    report.devices.len()
                );
            }
            if self.state != LoopState::Running {
                break;
            }

            next_tick += interval;
            let now = Instant::now();
            if next_tick <= now {
                log::warn!(
                    "Tick overran the {:?} interval by {:?}",
                    interval,
                    now - next_tick
                );
                next_tick = now;
            }

            if self.stop.wait_until(next_tick) {
                self.begin_stopping();
            }
        }

        self.state = LoopState::Stopped;
        Ok(())
    }
}

fn panicked(device: DeviceHandle, payload: Box<dyn Any + Send>) -> DeviceOutcome {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    log::error!("Processing {} panicked: {}", device, message);
    DeviceOutcome::Panicked(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn params() -> ControlParameters {
        ControlParameters {
            target_temperature: 60.0,
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
            sample_interval: Duration::from_secs(2),
            min_fan: FanSpeed::new(30).unwrap(),
            max_fan: FanSpeed::FULL,
            max_integral: 50.0,
            ceiling_margin: 15.0,
        }
    }

    fn started(gateway: Arc<MockGateway>) -> ControlLoop<Arc<MockGateway>> {
        let mut control = ControlLoop::new(gateway, params(), StopSignal::new());
        control.start().unwrap();
        control
    }

    #[test]
    fn test_start_discovers_devices() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 50.0), (1, 55.0)]));
        let control = started(gateway);
        assert_eq!(control.state(), LoopState::Running);
        assert_eq!(
            control.devices(),
            vec![DeviceHandle::new(0), DeviceHandle::new(1)]
        );
        assert_eq!(
            control.controller_state(DeviceHandle::new(0)),
            Some(ControllerState::default())
        );
    }

    #[test]
    fn test_discovery_failure_stops_loop() {
        let mut control =
            ControlLoop::new(Arc::new(MockGateway::new()), params(), StopSignal::new());
        assert!(matches!(control.start(), Err(GatewayError::Discovery(_))));
        assert_eq!(control.state(), LoopState::Stopped);
        assert!(matches!(
            control.run(),
            Ok(()) | Err(AppError::Gateway(GatewayError::Discovery(_)))
        ));
        assert_eq!(control.state(), LoopState::Stopped);
    }

    #[test]
    fn test_run_reports_discovery_failure() {
        let mut control =
            ControlLoop::new(Arc::new(MockGateway::new()), params(), StopSignal::new());
        assert!(matches!(
            control.run(),
            Err(AppError::Gateway(GatewayError::Discovery(_)))
        ));
        assert_eq!(control.state(), LoopState::Stopped);
    }

    #[test]
    fn test_selection_filters_devices() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[
            (0, 50.0),
            (1, 55.0),
            (2, 60.0),
        ]));
        let mut control = ControlLoop::new(gateway, params(), StopSignal::new())
            .with_selection(vec![2, 0, 2]);
        control.start().unwrap();
        assert_eq!(
            control.devices(),
            vec![DeviceHandle::new(0), DeviceHandle::new(2)]
        );
    }

    #[test]
    fn test_selection_of_missing_device_is_fatal() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 50.0)]));
        let mut control =
            ControlLoop::new(gateway, params(), StopSignal::new()).with_selection(vec![3]);
        let err = control.start().unwrap_err();
        assert!(err.to_string().contains("selected GPU 3"));
        assert_eq!(control.state(), LoopState::Stopped);
    }

    #[test]
    fn test_tick_applies_clamped_command() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 70.0)]));
        let mut control = started(Arc::clone(&gateway));

        // First step: 2 * (70 - 60) = 20, raised to the 30% floor
        let report = control.tick(Instant::now());
        let device = DeviceHandle::new(0);
        assert!(matches!(
            report.outcome(device),
            Some(DeviceOutcome::Applied {
                overridden: false,
                ..
            })
        ));
        assert_eq!(gateway.fan_speed(device), FanSpeed::new(30).ok());
    }

    #[test]
    fn test_tick_forces_full_speed_at_ceiling() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 75.0)]));
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        for i in 0..5u64 {
            let report = control.tick(t0 + Duration::from_secs(i * 2));
            let outcome = report.outcome(device).unwrap();
            assert_eq!(outcome.speed(), Some(FanSpeed::FULL));
            assert!(outcome.is_override());
        }
        assert_eq!(gateway.fan_speed(device), Some(FanSpeed::FULL));
    }

    #[test]
    fn test_override_is_sent_on_every_tick() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 80.0)]));
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        for i in 0..5u64 {
            let report = control.tick(t0 + Duration::from_secs(i * 2));
            assert!(matches!(
                report.outcome(device),
                Some(DeviceOutcome::Applied {
                    overridden: true,
                    ..
                })
            ));
        }
        let commands = gateway.fan_commands();
        assert_eq!(commands.len(), 5);
        assert!(commands.iter().all(|c| c.speed == FanSpeed::FULL));
    }

    #[test]
    fn test_dedupe_resumes_below_ceiling() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 80.0)]));
        let mut control = started(Arc::clone(&gateway));
        let t0 = Instant::now();

        control.tick(t0);
        control.tick(t0 + Duration::from_secs(2));
        assert_eq!(gateway.fan_commands().len(), 2);

        // Far below target the controller settles on the floor
        gateway.set_temperature(0, 20.0);
        for i in 2..6u64 {
            control.tick(t0 + Duration::from_secs(i * 2));
        }
        let floor = FanSpeed::new(30).unwrap();
        let at_floor = gateway
            .fan_commands()
            .iter()
            .filter(|c| c.speed == floor)
            .count();
        assert_eq!(at_floor, 1);
    }

    #[test]
    fn test_unchanged_speed_is_not_resent() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 40.0)]));
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        control.tick(t0);
        let report = control.tick(t0 + Duration::from_secs(2));
        assert!(matches!(
            report.outcome(device),
            Some(DeviceOutcome::Unchanged { .. })
        ));
        assert_eq!(gateway.fan_commands().len(), 1);
    }

    #[test]
    fn test_unchanged_speed_is_resent_when_skip_disabled() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 40.0)]));
        let mut control = ControlLoop::new(Arc::clone(&gateway), params(), StopSignal::new())
            .with_skip_unchanged(false);
        control.start().unwrap();
        let t0 = Instant::now();

        control.tick(t0);
        control.tick(t0 + Duration::from_secs(2));
        assert_eq!(gateway.fan_commands().len(), 2);
    }

    #[test]
    fn test_sensor_fault_is_isolated_to_one_device() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 68.0), (1, 68.0)]));
        let mut control = started(Arc::clone(&gateway));
        let (gpu0, gpu1) = (DeviceHandle::new(0), DeviceHandle::new(1));
        let t0 = Instant::now();

        control.tick(t0);
        let before0 = control.controller_state(gpu0).unwrap();
        let before1 = control.controller_state(gpu1).unwrap();

        gateway.fail_reads(0, true);
        gateway.set_temperature(1, 72.0);
        let report = control.tick(t0 + Duration::from_secs(2));

        assert!(matches!(
            report.outcome(gpu0),
            Some(DeviceOutcome::SensorFault(_))
        ));
        assert_eq!(control.controller_state(gpu0), Some(before0));

        let after1 = control.controller_state(gpu1).unwrap();
        assert_ne!(after1, before1);
        assert_eq!(after1.previous_error, 12.0);
        assert!(matches!(
            report.outcome(gpu1),
            Some(DeviceOutcome::Applied { .. })
        ));
    }

    #[test]
    fn test_persistent_sensor_fault_holds_last_speed() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 80.0)]));
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        control.tick(t0);
        assert_eq!(gateway.fan_speed(device), Some(FanSpeed::FULL));

        gateway.fail_reads(0, true);
        for i in 1..4u64 {
            control.tick(t0 + Duration::from_secs(i * 2));
        }
        assert_eq!(gateway.fan_speed(device), Some(FanSpeed::FULL));
        assert_eq!(gateway.fan_commands().len(), 1);
    }

    #[test]
    fn test_actuation_fault_still_advances_controller() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 70.0)]));
        gateway.fail_writes(0, true);
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        let report = control.tick(t0);
        assert!(matches!(
            report.outcome(device),
            Some(DeviceOutcome::ActuationFault { .. })
        ));
        assert_eq!(report.fault_count(), 1);
        let state = control.controller_state(device).unwrap();
        assert_eq!(state.previous_timestamp, Some(t0));

        // Retried on the next tick once the device accepts writes again
        gateway.fail_writes(0, false);
        let report = control.tick(t0 + Duration::from_secs(2));
        assert!(matches!(
            report.outcome(device),
            Some(DeviceOutcome::Applied { .. })
        ));
    }

    #[test]
    fn test_repeated_instant_is_a_controller_fault() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 70.0)]));
        let mut control = started(Arc::clone(&gateway));
        let device = DeviceHandle::new(0);
        let t0 = Instant::now();

        control.tick(t0);
        let before = control.controller_state(device);
        let report = control.tick(t0);
        assert!(matches!(
            report.outcome(device),
            Some(DeviceOutcome::ControllerFault(ControlError::NonMonotonicTick))
        ));
        assert_eq!(control.controller_state(device), before);
    }

    #[test]
    fn test_run_returns_once_stop_requested() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let gateway = Arc::new(
            MockGateway::with_temperatures(&[(0, 65.0)]).with_read_hook(move |_| remote.request()),
        );
        let mut control = ControlLoop::new(Arc::clone(&gateway), params(), stop);

        control.run().unwrap();
        assert_eq!(control.state(), LoopState::Stopped);
        // The in-flight tick was allowed to finish
        assert_eq!(gateway.reads(DeviceHandle::new(0)), 1);
        assert_eq!(gateway.fan_commands().len(), 1);
    }

    #[test]
    fn test_stop_during_tick_enters_stopping() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let gateway = Arc::new(
            MockGateway::with_temperatures(&[(0, 65.0), (1, 65.0)])
                .with_read_hook(move |_| remote.request()),
        );
        let mut control = ControlLoop::new(Arc::clone(&gateway), params(), stop);
        control.start().unwrap();

        let report = control.tick(Instant::now());
        assert_eq!(report.fault_count(), 0);
        assert_eq!(control.state(), LoopState::Stopping);

        // No further ticks once stopping
        control.run().unwrap();
        assert_eq!(control.state(), LoopState::Stopped);
        assert_eq!(gateway.reads(DeviceHandle::new(0)), 1);
    }

    #[test]
    fn test_panicking_device_is_isolated() {
        let gateway = Arc::new(
            MockGateway::with_temperatures(&[(0, 70.0), (1, 70.0)]).with_read_hook(|device| {
                if device.index() == 1 {
                    panic!("sensor driver crashed");
                }
            }),
        );
        let mut control = started(Arc::clone(&gateway));

        let report = control.tick(Instant::now());
        assert!(matches!(
            report.outcome(DeviceHandle::new(1)),
            Some(DeviceOutcome::Panicked(msg)) if msg.contains("sensor driver crashed")
        ));
        assert!(matches!(
            report.outcome(DeviceHandle::new(0)),
            Some(DeviceOutcome::Applied { .. })
        ));
        assert_eq!(report.fault_count(), 1);
        assert_eq!(
            control.controller_state(DeviceHandle::new(1)),
            Some(ControllerState::default())
        );
    }

    #[test]
    fn test_panicking_single_device_is_reported() {
        let gateway = Arc::new(
            MockGateway::with_temperatures(&[(0, 70.0)])
                .with_read_hook(|_| panic!("sensor driver crashed")),
        );
        let mut control = started(Arc::clone(&gateway));

        let report = control.tick(Instant::now());
        assert!(matches!(
            report.outcome(DeviceHandle::new(0)),
            Some(DeviceOutcome::Panicked(_))
        ));
        assert_eq!(control.state(), LoopState::Running);
    }

    #[test]
    fn test_run_rejects_invalid_params() {
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 70.0)]));
        let inverted = ControlParameters {
            min_fan: FanSpeed::FULL,
            max_fan: FanSpeed::new(40).unwrap(),
            ..params()
        };
        let mut control = ControlLoop::new(Arc::clone(&gateway), inverted, StopSignal::new());

        assert!(matches!(control.run(), Err(AppError::Config(_))));
        assert_eq!(gateway.reads(DeviceHandle::new(0)), 0);
        assert!(gateway.fan_commands().is_empty());
    }

    #[test]
    fn test_overrun_tick_is_followed_immediately_without_backlog() {
        let interval = Duration::from_millis(100);
        let stall = Duration::from_millis(250);
        let stop = StopSignal::new();
        let remote = stop.clone();
        let reads = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&reads);
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 65.0)]).with_read_hook(
            move |_| {
                let count = {
                    let mut log = log.lock().unwrap();
                    log.push(Instant::now());
                    log.len()
                };
                match count {
                    2 => thread::sleep(stall),
                    6 => remote.request(),
                    _ => {}
                }
            },
        ));
        let fast = ControlParameters {
            sample_interval: interval,
            ..params()
        };
        let mut control = ControlLoop::new(Arc::clone(&gateway), fast, stop);

        control.run().unwrap();

        let reads = reads.lock().unwrap();
        assert_eq!(reads.len(), 6);
        let gaps: Vec<Duration> = reads.windows(2).map(|w| w[1] - w[0]).collect();

        // Regular cadence before the stall
        assert!(gaps[0] >= interval - Duration::from_millis(5));
        // The overrunning tick is followed straight away, not a full interval later
        assert!(gaps[1] >= stall);
        assert!(gaps[1] < stall + interval - Duration::from_millis(20));
        // Missed ticks are not replayed back-to-back afterwards
        for gap in &gaps[2..] {
            assert!(*gap >= interval - Duration::from_millis(5), "gap {:?}", gap);
        }
    }

    #[test]
    fn test_run_wakes_promptly_between_ticks() {
        let stop = StopSignal::new();
        let gateway = Arc::new(MockGateway::with_temperatures(&[(0, 65.0)]));
        let slow = ControlParameters {
            sample_interval: Duration::from_secs(60),
            ..params()
        };
        let mut control = ControlLoop::new(Arc::clone(&gateway), slow, stop.clone());

        let begin = Instant::now();
        let remote = stop.clone();
        let requester = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.request();
        });
        control.run().unwrap();
        requester.join().unwrap();

        assert!(begin.elapsed() < Duration::from_secs(30));
        assert_eq!(gateway.reads(DeviceHandle::new(0)), 1);
    }
}
