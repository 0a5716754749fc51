//! PID controller
//!
//! Converts a die temperature into a raw fan-speed command. The controller
//! regulates an upper bound: a positive error (too hot) raises the output.
//!
//! The controller itself is stateless. Each device owns a [`ControllerState`]
//! that is threaded through [`PidController::step`], so devices never share
//! accumulated error.

use crate::domain::ControlParameters;
use crate::error::ControlError;

use std::time::Instant;

/// Per-device controller memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Integral accumulator, bounded by `max_integral`
    pub integral: f64,
    /// Error seen on the previous step
    pub previous_error: f64,
    /// When the previous step ran; `None` before the first one
    pub previous_timestamp: Option<Instant>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            integral: 0.0,
            previous_error: 0.0,
            previous_timestamp: None,
        }
    }
}

/// PID gains and limits taken from the control parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidController {
    pub target: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub max_integral: f64,
}

impl PidController {
    /// Take gains from `params`
    ///
    /// Expects parameters that passed [`ControlParameters::validate`].
    pub fn new(params: &ControlParameters) -> Self {
        Self {
            target: params.target_temperature,
            kp: params.kp,
            ki: params.ki,
            kd: params.kd,
            max_integral: params.max_integral,
        }
    }

    /// Compute the next raw command and the state that follows it
    ///
    /// The first step for a state only applies the proportional term.
    /// The returned command is not clamped.
    ///
    /// # Errors
    /// Returns `ControlError::NonMonotonicTick` when `now` is not after the
    /// previous step; the caller keeps its current state.
    pub fn step(
        &self,
        state: &ControllerState,
        temperature: f64,
        now: Instant,
    ) -> Result<(i64, ControllerState), ControlError> {
        let error = temperature - self.target;

        let Some(previous) = state.previous_timestamp else {
            let next = ControllerState {
                integral: 0.0,
                previous_error: error,
                previous_timestamp: Some(now),
            };
            return Ok((to_command(self.kp * error), next));
        };

        let dt = match now.checked_duration_since(previous) {
            Some(elapsed) if !elapsed.is_zero() => elapsed.as_secs_f64(),
            _ => return Err(ControlError::NonMonotonicTick),
        };

        // max/min rather than clamp: an unvalidated bound must not panic
        let integral = (state.integral + error * dt)
            .max(-self.max_integral)
            .min(self.max_integral);
        let derivative = (error - state.previous_error) / dt;
        let raw = self.kp * error + self.ki * integral + self.kd * derivative;

        let next = ControllerState {
            integral,
            previous_error: error,
            previous_timestamp: Some(now),
        };
        Ok((to_command(raw), next))
    }
}

// `as` saturates at the i64 bounds and maps NaN to 0
fn to_command(raw: f64) -> i64 {
    raw.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller(kp: f64, ki: f64, kd: f64, target: f64, max_integral: f64) -> PidController {
        PidController {
            target,
            kp,
            ki,
            kd,
            max_integral,
        }
    }

    #[test]
    fn test_first_step_is_proportional_only() {
        let pid = controller(2.0, 1.0, 1.0, 60.0, 50.0);
        let now = Instant::now();
        let (command, state) = pid.step(&ControllerState::default(), 70.0, now).unwrap();

        assert_eq!(command, 20);
        assert_eq!(state.integral, 0.0);
        assert_eq!(state.previous_error, 10.0);
        assert_eq!(state.previous_timestamp, Some(now));
    }

    #[test]
    fn test_second_step_uses_all_terms() {
        let pid = controller(2.0, 0.5, 1.0, 60.0, 50.0);
        let t0 = Instant::now();
        let (_, state) = pid.step(&ControllerState::default(), 70.0, t0).unwrap();

        // error 12, integral 24, derivative (12 - 10) / 2 = 1
        let (command, state) = pid
            .step(&state, 72.0, t0 + Duration::from_secs(2))
            .unwrap();
        assert_eq!(state.integral, 24.0);
        assert_eq!(command, 24 + 12 + 1);
    }

    #[test]
    fn test_cooler_than_target_drives_output_negative() {
        let pid = controller(2.0, 0.0, 0.0, 60.0, 50.0);
        let (command, _) = pid
            .step(&ControllerState::default(), 45.0, Instant::now())
            .unwrap();
        assert_eq!(command, -30);
    }

    #[test]
    fn test_command_is_rounded() {
        let pid = controller(0.25, 0.0, 0.0, 60.0, 50.0);
        let (command, _) = pid
            .step(&ControllerState::default(), 70.0, Instant::now())
            .unwrap();
        // 2.5 rounds away from zero
        assert_eq!(command, 3);
    }

    #[test]
    fn test_unvalidated_integral_bound_does_not_panic() {
        let t0 = Instant::now();
        for bound in [f64::NAN, -5.0] {
            let pid = controller(1.0, 1.0, 0.0, 60.0, bound);
            let (_, state) = pid.step(&ControllerState::default(), 70.0, t0).unwrap();
            assert!(pid.step(&state, 70.0, t0 + Duration::from_secs(1)).is_ok());
        }
    }

    #[test]
    fn test_integral_is_bounded() {
        let pid = controller(0.0, 1.0, 0.0, 60.0, 50.0);
        let t0 = Instant::now();
        let mut state = ControllerState::default();
        for i in 0..20u64 {
            let (_, next) = pid
                .step(&state, 95.0, t0 + Duration::from_secs(i * 2))
                .unwrap();
            state = next;
        }
        assert_eq!(state.integral, 50.0);
    }

    #[test]
    fn test_zero_dt_is_rejected() {
        let pid = controller(2.0, 1.0, 1.0, 60.0, 50.0);
        let t0 = Instant::now();
        let (_, state) = pid.step(&ControllerState::default(), 70.0, t0).unwrap();

        assert_eq!(
            pid.step(&state, 80.0, t0),
            Err(ControlError::NonMonotonicTick)
        );
    }

    #[test]
    fn test_backwards_clock_is_rejected() {
        let pid = controller(2.0, 1.0, 1.0, 60.0, 50.0);
        let t0 = Instant::now() + Duration::from_secs(10);
        let (_, state) = pid.step(&ControllerState::default(), 70.0, t0).unwrap();

        assert_eq!(
            pid.step(&state, 80.0, t0 - Duration::from_secs(1)),
            Err(ControlError::NonMonotonicTick)
        );
    }

    #[test]
    fn test_step_is_deterministic() {
        let pid = controller(2.0, 0.5, 0.1, 60.0, 50.0);
        let t0 = Instant::now();
        let (_, state) = pid.step(&ControllerState::default(), 66.0, t0).unwrap();
        let later = t0 + Duration::from_millis(1500);

        assert_eq!(pid.step(&state, 68.5, later), pid.step(&state, 68.5, later));
    }

    #[test]
    fn test_constant_temperature_at_target_settles() {
        let pid = controller(2.0, 0.5, 0.1, 60.0, 50.0);
        let t0 = Instant::now();
        let mut state = ControllerState::default();
        let mut commands = Vec::new();
        for i in 0..10u64 {
            let (command, next) = pid
                .step(&state, 60.0, t0 + Duration::from_secs(i * 2))
                .unwrap();
            commands.push(command);
            state = next;
        }
        assert!(commands.iter().all(|&c| c == 0));
        assert_eq!(state.integral, 0.0);
        assert_eq!(state.previous_error, 0.0);
    }

    #[test]
    fn test_constant_temperature_has_no_derivative_after_first_step() {
        // Derivative-only controller: any output would come from the d-term
        let pid = controller(0.0, 0.0, 5.0, 60.0, 50.0);
        let t0 = Instant::now();
        let (first, mut state) = pid.step(&ControllerState::default(), 67.0, t0).unwrap();
        assert_eq!(first, 0);
        for i in 1..5u64 {
            let (command, next) = pid
                .step(&state, 67.0, t0 + Duration::from_secs(i))
                .unwrap();
            assert_eq!(command, 0);
            state = next;
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integral_never_exceeds_bound(
                temps in prop::collection::vec(-50.0_f64..150.0_f64, 1..64),
                gaps_ms in prop::collection::vec(1_u64..10_000, 64),
                max_integral in 0.0_f64..200.0,
            ) {
                let pid = controller(2.0, 0.5, 0.1, 60.0, max_integral);
                let mut now = Instant::now();
                let mut state = ControllerState::default();
                for (temp, gap) in temps.iter().zip(gaps_ms.iter()) {
                    let (_, next) = pid.step(&state, *temp, now).unwrap();
                    prop_assert!(next.integral.abs() <= max_integral);
                    state = next;
                    now += Duration::from_millis(*gap);
                }
            }
        }
    }
}
