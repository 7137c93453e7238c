use serde::{Deserialize, Serialize};

/// How many lap durations the pace buffer retains, oldest first.
pub const PACE_BUFFER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrantStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "DNF")]
    Dnf,
    #[serde(rename = "DQ")]
    Dq,
}

impl EntrantStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(Self::Active),
            "DISABLED" => Some(Self::Disabled),
            "DNF" => Some(Self::Dnf),
            "DQ" => Some(Self::Dq),
            _ => None,
        }
    }
}

/// A roster entry plus everything the engine derives about it over the
/// course of one race. Owned exclusively by the Race Engine actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrant {
    pub entrant_id: i64,
    pub number: Option<String>,
    pub name: String,
    pub tag: Option<String>,
    pub enabled: bool,
    pub status: EntrantStatus,

    pub laps: u32,
    pub last_lap_s: Option<f64>,
    pub best_lap_s: Option<f64>,
    /// Ordered sequence of up to the last `PACE_BUFFER_LEN` lap durations, oldest first.
    pub pace_buffer: Vec<f64>,

    pub pit_count: u32,
    pub last_pit_s: Option<f64>,
    pub pit_open_at_ms: Option<i64>,

    /// Last track-source crossing time on the race clock. Unset until the
    /// entrant's first track pass (which only establishes a baseline).
    pub last_hit_ms: Option<i64>,

    /// Assigned strictly within the soft-end window; unset otherwise.
    pub finish_order: Option<u32>,
    pub soft_end_completed: bool,
}

impl Entrant {
    pub fn new(entrant_id: i64, number: Option<String>, name: String, tag: Option<String>) -> Self {
        Entrant {
            entrant_id,
            number,
            name,
            tag,
            enabled: true,
            status: EntrantStatus::Active,
            laps: 0,
            last_lap_s: None,
            best_lap_s: None,
            pace_buffer: Vec::new(),
            pit_count: 0,
            last_pit_s: None,
            pit_open_at_ms: None,
            last_hit_ms: None,
            finish_order: None,
            soft_end_completed: false,
        }
    }

    /// Record a credited lap of `delta_s` seconds, updating last/best and
    /// trimming the pace buffer to `PACE_BUFFER_LEN`.
    pub fn credit_lap(&mut self, delta_s: f64) {
        self.laps += 1;
        self.last_lap_s = Some(delta_s);
        self.best_lap_s = Some(match self.best_lap_s {
            Some(best) => best.min(delta_s),
            None => delta_s,
        });
        self.pace_buffer.push(delta_s);
        if self.pace_buffer.len() > PACE_BUFFER_LEN {
            let excess = self.pace_buffer.len() - PACE_BUFFER_LEN;
            self.pace_buffer.drain(0..excess);
        }
    }
}

/// A roster row as presented to `RaceEngine::load`, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrantInput {
    pub entrant_id: i64,
    pub number: Option<String>,
    pub name: String,
    pub tag: Option<String>,
    pub enabled: Option<bool>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_lap_updates_best_and_trims_pace_buffer() {
        let mut e = Entrant::new(1, Some("7".into()), "Driver 7".into(), Some("1234567".into()));
        for delta in [12.0, 11.5, 13.0, 11.0, 12.5, 10.9] {
            e.credit_lap(delta);
        }
        assert_eq!(e.laps, 6);
        assert_eq!(e.pace_buffer.len(), PACE_BUFFER_LEN);
        assert_eq!(e.pace_buffer, vec![11.5, 13.0, 11.0, 12.5, 10.9]);
        assert_eq!(e.best_lap_s, Some(10.9));
        assert_eq!(e.last_lap_s, Some(10.9));
    }

    #[test]
    fn entrant_status_parse_rejects_unknown() {
        assert!(EntrantStatus::parse("ACTIVE").is_some());
        assert!(EntrantStatus::parse("BOGUS").is_none());
    }
}
