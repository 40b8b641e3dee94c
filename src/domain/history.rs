// Signal history summaries for the detail panel
use crate::domain::observation::Observation;
use serde::Serialize;

/// Most recent readings kept per signal.
pub const MAX_HISTORY_POINTS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub signal: String,
    pub unit: Option<&'static str>,
    pub average: f64,
    pub low: f64,
    pub high: f64,
    pub values: Vec<f64>,
}

fn unit_for(signal: &str) -> Option<&'static str> {
    let lower = signal.to_lowercase();
    if lower.contains("sound") || lower.contains("level") {
        Some("dB")
    } else if lower.contains("temp") {
        Some("°C")
    } else {
        None
    }
}

/// Summarises one signal's readings, oldest first. `None` when the signal has
/// no valued readings in the history.
pub fn summarize(observations: &[Observation], signal: &str) -> Option<SignalSummary> {
    let mut readings: Vec<_> = observations
        .iter()
        .filter(|o| o.signal_name.as_deref() == Some(signal))
        .filter_map(|o| o.value.map(|v| (o.time, v)))
        .collect();
    if readings.is_empty() {
        return None;
    }

    // Untimed readings sort first
    readings.sort_by_key(|(time, _)| *time);
    let skip = readings.len().saturating_sub(MAX_HISTORY_POINTS);
    let values: Vec<f64> = readings.into_iter().skip(skip).map(|(_, v)| v).collect();

    let average = values.iter().sum::<f64>() / values.len() as f64;
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(SignalSummary {
        signal: signal.to_string(),
        unit: unit_for(signal),
        average,
        low,
        high,
        values,
    })
}

/// One summary per distinct signal name, in first-seen order.
pub fn summarize_all(observations: &[Observation]) -> Vec<SignalSummary> {
    let mut names: Vec<&str> = Vec::new();
    for name in observations.iter().filter_map(|o| o.signal_name.as_deref()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
        .into_iter()
        .filter_map(|name| summarize(observations, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Coordinate;
    use crate::domain::observation::ThingId;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(signal: &str, minute: i64, value: Option<f64>) -> Observation {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Observation {
            thing_id: ThingId::from("1"),
            thing_name: None,
            signal_id: None,
            signal_name: Some(signal.to_string()),
            value,
            time: Some(base + Duration::minutes(minute)),
            coordinate: Coordinate::new(0.0, 0.0).unwrap(),
        }
    }

    #[test]
    fn test_summary_sorted_by_time() {
        let history = vec![
            reading("Sound", 3, Some(70.0)),
            reading("Sound", 1, Some(50.0)),
            reading("Sound", 2, None),
            reading("Temperature", 1, Some(30.0)),
            reading("Sound", 2, Some(60.0)),
        ];

        let summary = summarize(&history, "Sound").unwrap();
        assert_eq!(summary.values, vec![50.0, 60.0, 70.0]);
        assert_eq!(summary.average, 60.0);
        assert_eq!(summary.low, 50.0);
        assert_eq!(summary.high, 70.0);
        assert_eq!(summary.unit, Some("dB"));

        assert!(summarize(&history, "Wind").is_none());
    }

    #[test]
    fn test_keeps_most_recent_points() {
        let history: Vec<_> = (0..(MAX_HISTORY_POINTS as i64 + 20))
            .rev()
            .map(|m| reading("Temp", m, Some(m as f64)))
            .collect();

        let summary = summarize(&history, "Temp").unwrap();
        assert_eq!(summary.values.len(), MAX_HISTORY_POINTS);
        assert_eq!(summary.values[0], 20.0);
        assert_eq!(summary.unit, Some("°C"));
    }

    #[test]
    fn test_summarize_all_skips_empty_signals() {
        let history = vec![
            reading("Sound", 1, Some(50.0)),
            reading("Humidity", 1, None),
            reading("Temperature", 1, Some(30.0)),
        ];
        let names: Vec<_> = summarize_all(&history).into_iter().map(|s| s.signal).collect();
        assert_eq!(names, vec!["Sound", "Temperature"]);
    }
}
