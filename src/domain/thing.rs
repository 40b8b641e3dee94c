// Thing domain model - observations grouped into entities
use crate::domain::geometry::Coordinate;
use crate::domain::observation::{Observation, ThingId};
use crate::domain::staleness::{format_age, StalenessPolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: Option<String>,
    pub name: Option<String>,
    pub value: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl Signal {
    fn key(&self) -> Option<&str> {
        self.id.as_deref().or(self.name.as_deref())
    }

    fn name_contains(&self, fragment: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(fragment))
    }

    pub fn is_sound(&self) -> bool {
        self.name_contains("sound")
    }
}

/// One step of the primary-signal preference order.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalRule {
    /// Name contains any of these fragments (case-insensitive).
    NameContains(Vec<String>),
    /// Any signal carrying a value.
    HasValue,
}

impl SignalRule {
    pub fn matches(&self, signal: &Signal) -> bool {
        match self {
            SignalRule::NameContains(fragments) => fragments
                .iter()
                .any(|f| signal.name_contains(&f.to_lowercase())),
            SignalRule::HasValue => signal.value.is_some(),
        }
    }
}

/// Ordered rules; the first rule with a matching valued signal decides, and
/// within a rule the earliest signal in feed order wins. Valueless matches
/// are only chosen when no rule matches a valued signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPolicy {
    rules: Vec<SignalRule>,
}

impl SignalPolicy {
    pub fn new(rules: Vec<SignalRule>) -> Self {
        Self { rules }
    }

    /// Prefer signals named after any fragment, else the first with a value.
    pub fn preferring<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self::new(vec![
            SignalRule::NameContains(fragments.iter().map(|f| f.as_ref().to_string()).collect()),
            SignalRule::HasValue,
        ])
    }

    pub fn select<'a>(&self, signals: &'a [Signal]) -> Option<&'a Signal> {
        let first_match = |valued: bool| {
            self.rules.iter().find_map(|rule| {
                signals
                    .iter()
                    .find(|s| (!valued || s.value.is_some()) && rule.matches(s))
            })
        };
        first_match(true).or_else(|| first_match(false))
    }
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self::preferring(&["sound", "level"])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thing {
    pub id: ThingId,
    pub name: String,
    pub coordinate: Coordinate,
    pub location: String,
    pub signals: Vec<Signal>,
    pub primary_value: Option<f64>,
    pub primary_time: Option<DateTime<Utc>>,
    pub online: bool,
}

impl Thing {
    /// Detail text shown in the marker popup.
    pub fn popup_content(&self, now: DateTime<Utc>) -> String {
        let mut lines = vec![self.name.clone()];
        let readings: Vec<String> = self
            .signals
            .iter()
            .filter_map(|s| {
                let value = s.value?;
                let unit = if s.is_sound() { " dB" } else { "" };
                Some(format!("{}: {}{}", s.name.as_deref().unwrap_or("-"), value, unit))
            })
            .collect();

        if readings.is_empty() {
            lines.push("No data available".to_string());
        } else {
            lines.extend(readings);
        }
        lines.push(format_age(self.primary_time, now));
        lines.push(format!(
            "Status: {}",
            if self.online { "online" } else { "offline" }
        ));
        lines.join("\n")
    }
}

/// Groups flat observations into one [`Thing`] per entity id.
#[derive(Debug, Clone, Default)]
pub struct EntityAssembler {
    policy: SignalPolicy,
    staleness: StalenessPolicy,
}

struct ThingBuilder {
    id: ThingId,
    name: Option<String>,
    coordinate: Coordinate,
    signals: Vec<Signal>,
}

impl EntityAssembler {
    pub fn new(policy: SignalPolicy, staleness: StalenessPolicy) -> Self {
        Self { policy, staleness }
    }

    pub fn assemble(&self, observations: Vec<Observation>, now: DateTime<Utc>) -> Vec<Thing> {
        let mut order: Vec<ThingId> = Vec::new();
        let mut builders: HashMap<ThingId, ThingBuilder> = HashMap::new();

        for obs in observations {
            let builder = builders.entry(obs.thing_id.clone()).or_insert_with(|| {
                order.push(obs.thing_id.clone());
                ThingBuilder {
                    id: obs.thing_id.clone(),
                    name: None,
                    coordinate: obs.coordinate,
                    signals: Vec::new(),
                }
            });
            if builder.name.is_none() {
                builder.name = obs.thing_name.clone();
            }

            let signal = Signal {
                id: obs.signal_id,
                name: obs.signal_name,
                value: obs.value,
                time: obs.time,
            };
            // A repeated signal overwrites its earlier reading in place
            let existing = signal
                .key()
                .and_then(|key| builder.signals.iter_mut().find(|s| s.key() == Some(key)));
            match existing {
                Some(slot) => *slot = signal,
                None => builder.signals.push(signal),
            }
        }

        order
            .into_iter()
            .filter_map(|id| builders.remove(&id))
            .map(|b| self.finish(b, now))
            .collect()
    }

    fn finish(&self, builder: ThingBuilder, now: DateTime<Utc>) -> Thing {
        let primary = self.policy.select(&builder.signals);
        let primary_value = primary.and_then(|s| s.value);
        let primary_time = primary.and_then(|s| s.time);

        Thing {
            name: builder.name.unwrap_or_else(|| "Thing".to_string()),
            location: builder.coordinate.display(),
            coordinate: builder.coordinate,
            online: self.staleness.is_online(primary_time, now),
            primary_value,
            primary_time,
            signals: builder.signals,
            id: builder.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn obs(id: &str, signal: &str, value: Option<f64>, age_secs: i64) -> Observation {
        Observation {
            thing_id: ThingId::from(id),
            thing_name: Some(format!("Device {}", id)),
            signal_id: None,
            signal_name: Some(signal.to_string()),
            value,
            time: Some(now() - Duration::seconds(age_secs)),
            coordinate: Coordinate::new(13.75, 100.5).unwrap(),
        }
    }

    #[test]
    fn test_repeated_signal_keeps_latest_value() {
        let things = EntityAssembler::default().assemble(
            vec![obs("T1", "Sound", Some(60.0), 5), obs("T1", "Sound", Some(65.0), 1)],
            now(),
        );

        assert_eq!(things.len(), 1);
        assert_eq!(things[0].signals.len(), 1);
        assert_eq!(things[0].primary_value, Some(65.0));
        assert!(things[0].online);
    }

    #[test]
    fn test_sound_signal_preferred_over_earlier_signal() {
        let things = EntityAssembler::default().assemble(
            vec![
                obs("A", "Temperature", Some(31.0), 1),
                obs("A", "Noise Level", Some(72.0), 1),
                obs("A", "Sound Pressure", Some(80.0), 1),
            ],
            now(),
        );
        // Tie between two matching names goes to feed order
        assert_eq!(things[0].primary_value, Some(72.0));
    }

    #[test]
    fn test_falls_back_to_first_signal_with_value() {
        let things = EntityAssembler::default().assemble(
            vec![
                obs("A", "Humidity", None, 1),
                obs("A", "Temperature", Some(31.0), 100),
                obs("A", "Wind", Some(2.0), 1),
            ],
            now(),
        );
        assert_eq!(things[0].primary_value, Some(31.0));
        assert!(!things[0].online);
    }

    #[test]
    fn test_valueless_sound_signal_does_not_block_fallback() {
        let things = EntityAssembler::default().assemble(
            vec![obs("A", "Sound", None, 1), obs("A", "Temperature", Some(31.0), 2)],
            now(),
        );
        assert_eq!(things[0].primary_value, Some(31.0));
        assert_eq!(things[0].primary_time, Some(now() - Duration::seconds(2)));

        let policy = SignalPolicy::default();
        let silent = [Signal {
            id: None,
            name: Some("Sound".to_string()),
            value: None,
            time: Some(now()),
        }];
        assert_eq!(policy.select(&silent).and_then(|s| s.name.as_deref()), Some("Sound"));
    }

    #[test]
    fn test_groups_by_id() {
        let mut unnamed = obs("B", "Sound", None, 1);
        unnamed.thing_name = None;
        let things = EntityAssembler::default().assemble(
            vec![obs("A", "Sound", Some(50.0), 1), unnamed, obs("A", "Temp", Some(20.0), 1)],
            now(),
        );

        assert_eq!(things.len(), 2);
        assert_eq!(things[0].signals.len(), 2);
        assert_eq!(things[1].name, "Thing");
        assert_eq!(things[1].primary_value, None);
        assert_eq!(things[1].location, "13.7500, 100.5000");
    }

    #[test]
    fn test_custom_policy_order() {
        let policy = SignalPolicy::new(vec![
            SignalRule::NameContains(vec!["TEMP".to_string()]),
            SignalRule::HasValue,
        ]);
        let assembler = EntityAssembler::new(policy, StalenessPolicy::default());
        let things = assembler.assemble(
            vec![obs("A", "Sound", Some(50.0), 1), obs("A", "Temperature", Some(20.0), 1)],
            now(),
        );
        assert_eq!(things[0].primary_value, Some(20.0));
    }

    #[test]
    fn test_popup_content() {
        let things = EntityAssembler::default().assemble(
            vec![obs("A", "Sound", Some(50.0), 12), obs("A", "Temp", None, 1)],
            now(),
        );
        let text = things[0].popup_content(now());
        assert_eq!(text, "Device A\nSound: 50 dB\n12s ago\nStatus: online");
    }
}
