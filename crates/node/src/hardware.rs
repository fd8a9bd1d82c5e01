//! Hardware abstraction for the bioreactor rig.
//!
//! The HTTP layer never talks to drivers directly; everything goes through
//! the [`Hardware`] trait. [`SimulatedHardware`] is the default backend and
//! needs no device access; [`OfflineHardware`] stands in when real mode is
//! requested but no driver stack is present, reporting every actuator and
//! sensor as unavailable.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The hardware backend is not available on this node.
    #[error("Bioreactor hardware not available: {0}")]
    Unavailable(String),

    /// A driver-level fault while executing an operation.
    #[error("Hardware fault: {0}")]
    Fault(String),
}

/// Temperature readings from the vial block and the io board.
#[derive(Debug, Clone, Serialize)]
pub struct TemperatureReadings {
    pub vial_temperatures: Vec<f64>,
    pub io_temperatures: Vec<f64>,
}

/// One full sensor sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SensorSnapshot {
    pub photodiodes: Vec<f64>,
    pub vial_temperatures: Vec<f64>,
    pub io_temperatures: Vec<f64>,
    pub peltier_current: f64,
}

/// Actuator and sensor surface of one bioreactor rig.
#[async_trait]
pub trait Hardware: Send + Sync {
    /// Backend name reported by `/health`.
    fn mode(&self) -> &'static str;

    /// Whether actuator and sensor calls can be expected to succeed.
    fn available(&self) -> bool;

    /// Overall hardware status payload for `/api/status`.
    async fn status(&self) -> Result<Value, HardwareError>;

    async fn set_led(&self, on: bool) -> Result<(), HardwareError>;

    /// Set the ring light color, optionally addressing a single pixel.
    async fn set_ring_light(&self, color: [u8; 3], pixel: Option<u32>) -> Result<(), HardwareError>;

    /// Drive the peltier element at `power` percent, heating or cooling
    /// depending on `forward`.
    async fn set_peltier(&self, power: u8, forward: bool) -> Result<(), HardwareError>;

    async fn set_pump(&self, pump: &str, ml_per_sec: f64) -> Result<(), HardwareError>;

    async fn set_stirrer(&self, duty_cycle: u8) -> Result<(), HardwareError>;

    async fn read_photodiodes(&self) -> Result<Vec<f64>, HardwareError>;

    async fn read_temperatures(&self) -> Result<TemperatureReadings, HardwareError>;

    /// Peltier supply current in amperes.
    async fn read_current(&self) -> Result<f64, HardwareError>;

    async fn read_all(&self) -> Result<SensorSnapshot, HardwareError> {
        let photodiodes = self.read_photodiodes().await?;
        let temperatures = self.read_temperatures().await?;
        let peltier_current = self.read_current().await?;
        Ok(SensorSnapshot {
            photodiodes,
            vial_temperatures: temperatures.vial_temperatures,
            io_temperatures: temperatures.io_temperatures,
            peltier_current,
        })
    }
}

/// Actuator state tracked by the simulation.
#[derive(Debug, Default)]
struct SimState {
    led_on: bool,
    ring_color: [u8; 3],
    peltier_power: u8,
    peltier_forward: bool,
    pump_rates: HashMap<String, f64>,
    stirrer_duty: u8,
}

/// Deterministic in-memory rig.
///
/// Sensor readings are stable values nudged by the current actuator state,
/// enough for user scripts and integration tests to observe cause and
/// effect without a device.
#[derive(Default)]
pub struct SimulatedHardware {
    state: Mutex<SimState>,
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self::default()
    }
}

const VIAL_COUNT: usize = 4;
const AMBIENT_C: f64 = 25.0;

#[async_trait]
impl Hardware for SimulatedHardware {
    fn mode(&self) -> &'static str {
        "simulation"
    }

    fn available(&self) -> bool {
        true
    }

    async fn status(&self) -> Result<Value, HardwareError> {
        let state = self.state.lock().unwrap();
        Ok(json!({
            "status": "operational",
            "hardware_available": true,
            "initialized_components": {
                "led": true,
                "ring_light": true,
                "peltier": true,
                "pumps": true,
                "stirrer": true,
                "sensors": true,
            },
            "led_on": state.led_on,
            "stirrer_duty_cycle": state.stirrer_duty,
        }))
    }

    async fn set_led(&self, on: bool) -> Result<(), HardwareError> {
        self.state.lock().unwrap().led_on = on;
        Ok(())
    }

    async fn set_ring_light(&self, color: [u8; 3], pixel: Option<u32>) -> Result<(), HardwareError> {
        tracing::debug!(?color, ?pixel, "Simulated ring light update");
        self.state.lock().unwrap().ring_color = color;
        Ok(())
    }

    async fn set_peltier(&self, power: u8, forward: bool) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        state.peltier_power = power;
        state.peltier_forward = forward;
        Ok(())
    }

    async fn set_pump(&self, pump: &str, ml_per_sec: f64) -> Result<(), HardwareError> {
        self.state
            .lock()
            .unwrap()
            .pump_rates
            .insert(pump.to_string(), ml_per_sec);
        Ok(())
    }

    async fn set_stirrer(&self, duty_cycle: u8) -> Result<(), HardwareError> {
        self.state.lock().unwrap().stirrer_duty = duty_cycle;
        Ok(())
    }

    async fn read_photodiodes(&self) -> Result<Vec<f64>, HardwareError> {
        let state = self.state.lock().unwrap();
        // The LED dominates the photodiode signal.
        let base = if state.led_on { 0.82 } else { 0.04 };
        Ok((0..VIAL_COUNT).map(|i| base + i as f64 * 0.01).collect())
    }

    async fn read_temperatures(&self) -> Result<TemperatureReadings, HardwareError> {
        let state = self.state.lock().unwrap();
        let delta = state.peltier_power as f64 / 20.0;
        let vial = if state.peltier_forward {
            AMBIENT_C + delta
        } else {
            AMBIENT_C - delta
        };
        Ok(TemperatureReadings {
            vial_temperatures: vec![vial; VIAL_COUNT],
            io_temperatures: vec![AMBIENT_C + 2.5, AMBIENT_C + 3.1],
        })
    }

    async fn read_current(&self) -> Result<f64, HardwareError> {
        let state = self.state.lock().unwrap();
        Ok(state.peltier_power as f64 * 0.03)
    }
}

/// Backend used when `HARDWARE_MODE=real` but no driver stack was
/// initialized; every actuator and sensor call reports unavailability.
pub struct OfflineHardware;

impl OfflineHardware {
    fn unavailable<T>() -> Result<T, HardwareError> {
        Err(HardwareError::Unavailable(
            "hardware drivers not initialized".into(),
        ))
    }
}

#[async_trait]
impl Hardware for OfflineHardware {
    fn mode(&self) -> &'static str {
        "real"
    }

    fn available(&self) -> bool {
        false
    }

    async fn status(&self) -> Result<Value, HardwareError> {
        Ok(json!({
            "status": "unavailable",
            "hardware_available": false,
            "initialized_components": {},
        }))
    }

    async fn set_led(&self, _on: bool) -> Result<(), HardwareError> {
        Self::unavailable()
    }

    async fn set_ring_light(
        &self,
        _color: [u8; 3],
        _pixel: Option<u32>,
    ) -> Result<(), HardwareError> {
        Self::unavailable()
    }

    async fn set_peltier(&self, _power: u8, _forward: bool) -> Result<(), HardwareError> {
        Self::unavailable()
    }

    async fn set_pump(&self, _pump: &str, _ml_per_sec: f64) -> Result<(), HardwareError> {
        Self::unavailable()
    }

    async fn set_stirrer(&self, _duty_cycle: u8) -> Result<(), HardwareError> {
        Self::unavailable()
    }

    async fn read_photodiodes(&self) -> Result<Vec<f64>, HardwareError> {
        Self::unavailable()
    }

    async fn read_temperatures(&self) -> Result<TemperatureReadings, HardwareError> {
        Self::unavailable()
    }

    async fn read_current(&self) -> Result<f64, HardwareError> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn led_state_drives_photodiode_readings() {
        let hw = SimulatedHardware::new();

        let dark = hw.read_photodiodes().await.unwrap();
        hw.set_led(true).await.unwrap();
        let lit = hw.read_photodiodes().await.unwrap();

        assert_eq!(dark.len(), lit.len());
        assert!(lit[0] > dark[0]);
    }

    #[tokio::test]
    async fn peltier_direction_moves_vial_temperature() {
        let hw = SimulatedHardware::new();

        hw.set_peltier(60, true).await.unwrap();
        let heating = hw.read_temperatures().await.unwrap();
        hw.set_peltier(60, false).await.unwrap();
        let cooling = hw.read_temperatures().await.unwrap();

        assert!(heating.vial_temperatures[0] > AMBIENT_C);
        assert!(cooling.vial_temperatures[0] < AMBIENT_C);
    }

    #[tokio::test]
    async fn offline_hardware_reports_unavailable() {
        let hw = OfflineHardware;
        assert!(!hw.available());
        assert!(matches!(
            hw.set_led(true).await,
            Err(HardwareError::Unavailable(_)),
        ));
        // Status still answers so /api/status never 500s on a bare node.
        assert_eq!(hw.status().await.unwrap()["hardware_available"], false);
    }
}
