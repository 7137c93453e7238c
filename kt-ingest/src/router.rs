use std::collections::HashSet;

use kt_contracts::{Pass, Source};

/// Maps `device_id → {track, pit_in, pit_out}` using a static binding
/// table. Pure: `route` has no side effects and no internal mutable state.
#[derive(Debug, Clone, Default)]
pub struct SourceRouter {
    pit_in_devices: HashSet<String>,
    pit_out_devices: HashSet<String>,
}

impl SourceRouter {
    pub fn new(pit_in_devices: impl IntoIterator<Item = String>, pit_out_devices: impl IntoIterator<Item = String>) -> Self {
        SourceRouter {
            pit_in_devices: pit_in_devices.into_iter().collect(),
            pit_out_devices: pit_out_devices.into_iter().collect(),
        }
    }

    /// Promote a pass to `pit_in`/`pit_out` if its device id is bound,
    /// otherwise tag it `track`. Unknown device ids are `track`.
    pub fn route(&self, mut pass: Pass) -> Pass {
        pass.source = match pass.device_id.as_deref() {
            Some(id) if self.pit_in_devices.contains(id) => Source::PitIn,
            Some(id) if self.pit_out_devices.contains(id) => Source::PitOut,
            _ => Source::Track,
        };
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(device_id: Option<&str>) -> Pass {
        Pass {
            tag: "1234567".into(),
            ts_recv_ms: 0,
            source: Source::Track,
            device_id: device_id.map(str::to_string),
            device_secs: None,
        }
    }

    #[test]
    fn routes_bound_devices_and_defaults_unknown_to_track() {
        let router = SourceRouter::new(["IN1".to_string()], ["OUT1".to_string()]);
        assert!(matches!(router.route(pass(Some("IN1"))).source, Source::PitIn));
        assert!(matches!(router.route(pass(Some("OUT1"))).source, Source::PitOut));
        assert!(matches!(router.route(pass(Some("OTHER"))).source, Source::Track));
        assert!(matches!(router.route(pass(None)).source, Source::Track));
    }
}
