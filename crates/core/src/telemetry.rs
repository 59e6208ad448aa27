//! Vehicle telemetry domain types.

use serde::{Deserialize, Serialize};

/// One telemetry sample from a vehicle.
///
/// The eleven numeric signals are the fixed input the anomaly scorer was
/// trained on; their order matters and is defined by
/// [`TelemetryReading::signals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Sample timestamp, seconds since trip start
    pub time_s: i64,

    pub pack_voltage: f64,
    pub pack_current: f64,
    pub soc: f64,
    pub soh: f64,
    pub cell_temp_max: f64,
    pub cell_temp_min: f64,
    pub coolant_temp: f64,
    pub motor_rpm: f64,
    pub motor_torque: f64,
    pub inverter_temp: f64,
    pub speed_kph: f64,

    #[serde(default)]
    pub vehicle_id: Option<String>,

    /// Diagnostic trouble codes reported alongside the sample
    #[serde(default)]
    pub dtc_codes: Vec<String>,
}

impl TelemetryReading {
    /// The eleven signal values in canonical column order.
    pub fn signals(&self) -> [f64; 11] {
        [
            self.pack_voltage,
            self.pack_current,
            self.soc,
            self.soh,
            self.cell_temp_max,
            self.cell_temp_min,
            self.coolant_temp,
            self.motor_rpm,
            self.motor_torque,
            self.inverter_temp,
            self.speed_kph,
        ]
    }
}
