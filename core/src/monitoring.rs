//! Resource gauges reported by the server and their display helpers.

use serde::Deserialize;
use serde::Serialize;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    pub used: f64,
    pub total: f64,
}

impl Gauge {
    pub fn percent(&self) -> f64 {
        percent(self.used, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    pub cpu: Gauge,
    pub memory: Gauge,
}

/// `used / total` as a percentage rounded to two decimals; 0 when the ratio
/// is undefined.
pub fn percent(used: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let value = (used / total * 100.0 * 100.0).round() / 100.0;
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteFormat {
    /// Maximum fraction digits; trailing zeros are stripped.
    pub precision: usize,
    /// 1024-based when true, 1000-based otherwise.
    pub binary: bool,
}

impl Default for ByteFormat {
    fn default() -> Self {
        Self {
            precision: 2,
            binary: true,
        }
    }
}

pub fn convert_bytes(bytes: f64, format: ByteFormat) -> String {
    if bytes == 0.0 || !bytes.is_finite() {
        return "0 B".to_string();
    }
    let divisor = if format.binary { 1024.0 } else { 1000.0 };
    let mut value = bytes.abs();
    let mut unit = 0;
    while value >= divisor && unit < UNITS.len() - 1 {
        value /= divisor;
        unit += 1;
    }
    let mut rendered = format!("{value:.prec$}", prec = format.precision);
    if rendered.contains('.') {
        let trimmed = rendered.trim_end_matches('0').trim_end_matches('.').len();
        rendered.truncate(trimmed);
    }
    format!("{rendered} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn percent_rounds_to_two_places() {
        assert_eq!(percent(1.0, 3.0), 33.33);
        assert_eq!(percent(2.0, 3.0), 66.67);
        assert_eq!(percent(512.0, 1024.0), 50.0);
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(5.0, 0.0), 0.0);
        assert_eq!(percent(0.0, 0.0), 0.0);
        assert_eq!(percent(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn bytes_pick_the_largest_fitting_unit() {
        let format = ByteFormat::default();
        assert_eq!(convert_bytes(0.0, format), "0 B");
        assert_eq!(convert_bytes(512.0, format), "512 B");
        assert_eq!(convert_bytes(1024.0, format), "1 KB");
        assert_eq!(convert_bytes(1536.0, format), "1.5 KB");
        assert_eq!(convert_bytes(1_073_741_824.0, format), "1 GB");
        assert_eq!(convert_bytes(-2048.0, format), "2 KB");
    }

    #[test]
    fn decimal_and_precision_options() {
        let decimal = ByteFormat {
            precision: 1,
            binary: false,
        };
        assert_eq!(convert_bytes(1500.0, decimal), "1.5 KB");
        assert_eq!(convert_bytes(1_234_567.0, decimal), "1.2 MB");
        let whole = ByteFormat {
            precision: 0,
            binary: true,
        };
        assert_eq!(convert_bytes(1536.0, whole), "2 KB");
    }

    #[test]
    fn petabytes_is_the_ceiling() {
        let huge = 1024f64.powi(6) * 3.0;
        assert_eq!(convert_bytes(huge, ByteFormat::default()), "3072 PB");
    }

    #[test]
    fn snapshot_parses_wire_shape() {
        let snapshot: MonitoringSnapshot = match serde_json::from_str(
            r#"{"cpu":{"used":12.5,"total":100},"memory":{"used":1024,"total":4096}}"#,
        ) {
            Ok(snapshot) => snapshot,
            Err(err) => panic!("parse failed: {err}"),
        };
        assert_eq!(snapshot.memory.percent(), 25.0);
        assert_eq!(snapshot.cpu.used, 12.5);
    }
}
