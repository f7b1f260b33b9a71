use parking_lot::Mutex;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::telemetry::TelemetryReport;

/// Per-team robot telemetry gauges backed by an owned registry.
///
/// Constructed once at startup and handed to collaborators by `Arc`;
/// nothing here is process-global. The stats listener is the only
/// writer, scrapes read concurrently through the registry.
pub struct RobotMetrics {
    registry: Registry,
    // Serializes observe/reset so a reset never interleaves with a
    // half-applied report across the gauge families.
    write_gate: Mutex<()>,

    rssi: GaugeVec,
    vbat: GaugeVec,
    power_board: GaugeVec,
    power_pico: GaugeVec,
    power_gpio: GaugeVec,
    power_bus_a: GaugeVec,
    power_bus_b: GaugeVec,
    watchdog_ok: GaugeVec,
    watchdog_remaining: GaugeVec,
}

fn team_gauge(name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help).namespace("robot"), &["team"])
}

impl RobotMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rssi = team_gauge("rssi", "WiFi signal strength as measured by the system processor.")?;
        let vbat = team_gauge("battery_voltage", "Robot battery voltage.")?;
        let power_board = team_gauge("power_board", "General logic power available.")?;
        let power_pico = team_gauge("power_pico", "Pico power supply available.")?;
        let power_gpio = team_gauge("power_gpio", "GPIO power supply available.")?;
        let power_bus_a = team_gauge("power_bus_a", "Motor bus A power available.")?;
        let power_bus_b = team_gauge("power_bus_b", "Motor bus B power available.")?;
        let watchdog_ok = team_gauge("watchdog_ok", "Watchdog has been fed and is alive.")?;
        let watchdog_remaining = team_gauge(
            "watchdog_remaining_milliseconds",
            "Watchdog lifetime remaining since last feed.",
        )?;

        for gauge in [
            &rssi,
            &vbat,
            &power_board,
            &power_pico,
            &power_gpio,
            &power_bus_a,
            &power_bus_b,
            &watchdog_ok,
            &watchdog_remaining,
        ] {
            registry.register(Box::new(gauge.clone()))?;
        }

        Ok(Self {
            registry,
            write_gate: Mutex::new(()),
            rssi,
            vbat,
            power_board,
            power_pico,
            power_gpio,
            power_bus_a,
            power_bus_b,
            watchdog_ok,
            watchdog_remaining,
        })
    }

    /// Upserts one value per gauge family for `team`. Last write wins.
    pub fn observe(&self, team: &str, stats: &TelemetryReport) {
        let _gate = self.write_gate.lock();
        self.rssi.with_label_values(&[team]).set(f64::from(stats.rssi));
        self.vbat.with_label_values(&[team]).set(f64::from(stats.vbat));
        self.watchdog_remaining
            .with_label_values(&[team])
            .set(f64::from(stats.watchdog_remaining));
        self.watchdog_ok.with_label_values(&[team]).set(fcast(stats.watchdog_ok));
        self.power_board.with_label_values(&[team]).set(fcast(stats.pwr_board));
        self.power_pico.with_label_values(&[team]).set(fcast(stats.pwr_pico));
        self.power_gpio.with_label_values(&[team]).set(fcast(stats.pwr_gpio));
        self.power_bus_a.with_label_values(&[team]).set(fcast(stats.pwr_main_a));
        self.power_bus_b.with_label_values(&[team]).set(fcast(stats.pwr_main_b));
    }

    /// Clears every team label from every gauge family. Used when the
    /// roster changes between sessions; stale series would otherwise
    /// keep reporting their last value forever.
    pub fn reset(&self) {
        let _gate = self.write_gate.lock();
        self.rssi.reset();
        self.vbat.reset();
        self.power_board.reset();
        self.power_pico.reset();
        self.power_gpio.reset();
        self.power_bus_a.reset();
        self.power_bus_b.reset();
        self.watchdog_ok.reset();
        self.watchdog_remaining.reset();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Read-only snapshot of every family; safe concurrent with writes.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Prometheus text exposition of the current snapshot.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

fn fcast(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
