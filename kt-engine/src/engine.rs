use std::collections::{BTreeMap, HashMap};

use serde_json::json;

use kt_contracts::{
    Checkpoint, Entrant, EntrantInput, EntrantStatus, EngineError, EngineResult, Flag,
    IngestOutcome, JournalRecord, JournalRecordType, ModeConfig, NoCreditReason, Pass, RaceLimit,
    RaceSnapshot, RaceState, Source,
};
use kt_ingest::SourceRouter;

use crate::processor;

/// Hard cap on synthesized "Unknown XXXX" entrants per race (§9 Design
/// Notes: contain pathological inputs).
pub const PROVISIONAL_CAP: u32 = 50;

/// Owns all race state exclusively. Every public method takes `now_ms`
/// (milliseconds since the Unix epoch) as the caller-supplied monotonic
/// sample; the engine never reads the system clock itself, which keeps it
/// a plain, deterministically testable state machine. The actor task
/// (`crate::actor`) is the only place real wall-clock time enters.
pub struct RaceEngine {
    state: RaceState,
    entrants: BTreeMap<i64, Entrant>,
    tag_index: HashMap<String, i64>,
    router: SourceRouter,
    features_pit_timing: bool,
    features_auto_provisional: bool,
    next_provisional_id: i64,
    provisional_count: u32,
    next_finish_order: u32,
    pending: Vec<JournalRecord>,
}

impl RaceEngine {
    pub fn new(router: SourceRouter, features_pit_timing: bool, features_auto_provisional: bool) -> Self {
        RaceEngine {
            state: RaceState::new(0, String::new()),
            entrants: BTreeMap::new(),
            tag_index: HashMap::new(),
            router,
            features_pit_timing,
            features_auto_provisional,
            next_provisional_id: 1,
            provisional_count: 0,
            next_finish_order: 1,
            pending: Vec::new(),
        }
    }

    pub fn race_id(&self) -> i64 {
        self.state.race_id
    }

    pub fn clock_ms(&self) -> i64 {
        self.state.clock_ms
    }

    pub fn drain_journal(&mut self) -> Vec<JournalRecord> {
        std::mem::take(&mut self.pending)
    }

    /// A full-state dump sufficient to reconstruct live standings, handed
    /// to the Journal for periodic checkpointing.
    pub fn checkpoint_blob(&self) -> serde_json::Value {
        json!({
            "state": self.state,
            "entrants": self.entrants,
        })
    }

    pub fn to_checkpoint(&self, wall_ms: i64) -> Checkpoint {
        Checkpoint {
            race_id: self.state.race_id,
            wall_ms,
            clock_ms: self.state.clock_ms,
            snapshot: self.checkpoint_blob(),
        }
    }

    pub fn reset(&mut self, race_id: i64, race_type: String) {
        self.state = RaceState::new(race_id, race_type);
        self.entrants.clear();
        self.tag_index.clear();
        self.next_provisional_id = 1;
        self.provisional_count = 0;
        self.next_finish_order = 1;
        self.pending.clear();
    }

    pub fn load(
        &mut self,
        race_id: i64,
        race_type: String,
        entrants: Vec<EntrantInput>,
        mode: ModeConfig,
        session_limit: Option<RaceLimit>,
        now_ms: i64,
    ) -> EngineResult<()> {
        self.reset(race_id, race_type);

        let mut roster = BTreeMap::new();
        for input in entrants {
            let status = match &input.status {
                Some(s) => EntrantStatus::parse(s)
                    .ok_or_else(|| EngineError::InvalidMode(format!("unknown status {s}")))?,
                None => EntrantStatus::Active,
            };
            let tag = input
                .tag
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            let mut e = Entrant::new(input.entrant_id, input.number, input.name, tag);
            e.enabled = input.enabled.unwrap_or(true);
            e.status = status;
            roster.insert(input.entrant_id, e);
        }

        let tag_index = build_tag_index(&roster)?;
        self.entrants = roster;
        self.tag_index = tag_index;

        self.state.min_lap_s = mode.min_lap_s;
        self.state.limit = mode.limit;
        if let Some(limit) = session_limit {
            self.state.limit = Some(limit);
        }

        self.emit_journal(JournalRecordType::FlagChange, json!({"flag": "pre"}), now_ms);
        Ok(())
    }

    pub fn set_flag(&mut self, flag_name: &str, now_ms: i64) -> EngineResult<()> {
        let flag = Flag::parse(flag_name)
            .ok_or_else(|| EngineError::InvalidFlag(flag_name.to_string()))?;
        self.tick(now_ms);
        if self.state.flag == Flag::Checkered && !self.state.running {
            return Err(EngineError::StateViolation("race has already finished".into()));
        }
        self.apply_flag_transition(flag, now_ms);
        Ok(())
    }

    pub fn update_entrant_enable(&mut self, entrant_id: i64, enabled: bool, now_ms: i64) -> EngineResult<()> {
        let tag = self
            .entrants
            .get(&entrant_id)
            .ok_or(EngineError::EntrantNotFound(entrant_id))?
            .tag
            .clone();
        if enabled {
            if let Some(tag) = &tag {
                self.check_no_conflict(tag, entrant_id)?;
            }
        }
        self.entrants.get_mut(&entrant_id).unwrap().enabled = enabled;
        self.rebuild_tag_index();
        self.emit_journal(
            JournalRecordType::EntrantEnable,
            json!({"entrant_id": entrant_id, "enabled": enabled}),
            now_ms,
        );
        Ok(())
    }

    pub fn update_entrant_status(&mut self, entrant_id: i64, status: &str, now_ms: i64) -> EngineResult<()> {
        let parsed = EntrantStatus::parse(status)
            .ok_or_else(|| EngineError::InvalidEntrant(format!("unknown status {status}")))?;
        let e = self
            .entrants
            .get_mut(&entrant_id)
            .ok_or(EngineError::EntrantNotFound(entrant_id))?;
        e.status = parsed;
        self.rebuild_tag_index();
        self.emit_journal(
            JournalRecordType::EntrantStatus,
            json!({"entrant_id": entrant_id, "status": status}),
            now_ms,
        );
        Ok(())
    }

    pub fn assign_tag(&mut self, entrant_id: i64, tag: Option<String>, now_ms: i64) -> EngineResult<()> {
        let enabled = self
            .entrants
            .get(&entrant_id)
            .ok_or(EngineError::EntrantNotFound(entrant_id))?
            .enabled;
        let norm_tag = tag.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);
        if enabled {
            if let Some(t) = &norm_tag {
                self.check_no_conflict(t, entrant_id)?;
            }
        }
        self.entrants.get_mut(&entrant_id).unwrap().tag = norm_tag.clone();
        self.rebuild_tag_index();
        self.emit_journal(
            JournalRecordType::AssignTag,
            json!({"entrant_id": entrant_id, "tag": norm_tag}),
            now_ms,
        );
        Ok(())
    }

    pub fn snapshot(&mut self, now_ms: i64) -> RaceSnapshot {
        self.tick(now_ms);
        let standings = processor::build_standings(&self.entrants);
        let limit = self.state.limit.map(|l| processor::limit_view(l, self.state.clock_ms));
        RaceSnapshot {
            race_id: self.state.race_id,
            race_type: self.state.race_type.clone(),
            flag: self.state.flag,
            clock_ms: self.state.clock_ms,
            running: self.state.running,
            standings,
            sim_active: self.state.sim_active,
            sim_label: self.state.sim_label.clone(),
            limit,
        }
    }

    pub fn ingest_pass(&mut self, mut pass: Pass, now_ms: i64) -> IngestOutcome {
        self.tick(now_ms);

        if pass.source == Source::Track && self.features_pit_timing {
            pass = self.router.route(pass);
        }

        let entrant_id = match self.tag_index.get(&pass.tag).copied() {
            Some(id) => id,
            None => {
                if self.features_auto_provisional && self.provisional_count < PROVISIONAL_CAP {
                    self.allocate_provisional(&pass.tag)
                } else {
                    return IngestOutcome {
                        entrant_id: None,
                        lap_added: false,
                        reason: Some(if self.features_auto_provisional {
                            NoCreditReason::ProvisionalCap
                        } else {
                            NoCreditReason::UnknownTag
                        }),
                    };
                }
            }
        };

        if !self.entrants.get(&entrant_id).map(|e| e.enabled).unwrap_or(false) {
            return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::Disabled) };
        }

        self.emit_journal(
            JournalRecordType::Pass,
            json!({"tag": pass.tag, "source": pass.source, "device_id": pass.device_id}),
            now_ms,
        );

        match pass.source {
            Source::PitIn => {
                let clock_ms = self.state.clock_ms;
                self.entrants.get_mut(&entrant_id).unwrap().pit_open_at_ms = Some(clock_ms);
                return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::PitEvent) };
            }
            Source::PitOut => {
                let clock_ms = self.state.clock_ms;
                let e = self.entrants.get_mut(&entrant_id).unwrap();
                if let Some(open_ms) = e.pit_open_at_ms.take() {
                    e.last_pit_s = Some((clock_ms - open_ms) as f64 / 1000.0);
                    e.pit_count += 1;
                }
                return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::PitEvent) };
            }
            Source::Track => {}
        }

        let in_soft_end = self.state.in_soft_end_window();
        if self.state.flag == Flag::Checkered && !in_soft_end {
            return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::CheckeredFreeze) };
        }
        if in_soft_end && self.entrants.get(&entrant_id).map(|e| e.soft_end_completed).unwrap_or(false) {
            return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::SoftEndCompleted) };
        }

        let clock_ms = self.state.clock_ms;
        let prev_ms = self.entrants.get(&entrant_id).and_then(|e| e.last_hit_ms);
        self.entrants.get_mut(&entrant_id).unwrap().last_hit_ms = Some(clock_ms);

        let prev_ms = match prev_ms {
            None => {
                return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::Baseline) };
            }
            Some(p) => p,
        };

        let delta_s = (clock_ms - prev_ms) as f64 / 1000.0;
        if delta_s < self.state.min_lap_dup_s {
            return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::Dup) };
        }
        if delta_s < self.state.min_lap_s {
            return IngestOutcome { entrant_id: Some(entrant_id), lap_added: false, reason: Some(NoCreditReason::MinLap) };
        }

        self.entrants.get_mut(&entrant_id).unwrap().credit_lap(delta_s);
        if in_soft_end {
            let order = self.next_finish_order;
            self.next_finish_order += 1;
            let e = self.entrants.get_mut(&entrant_id).unwrap();
            e.finish_order = Some(order);
            e.soft_end_completed = true;
        }

        if let Some(RaceLimit::Laps { value_laps, .. }) = self.state.limit {
            let laps = self.entrants.get(&entrant_id).unwrap().laps;
            if laps >= value_laps && self.state.flag != Flag::Checkered {
                self.state.limit_reached = true;
                self.apply_flag_transition(Flag::Checkered, now_ms);
            }
        }

        if let Some(RaceLimit::Laps { value_laps, .. }) = self.state.limit {
            if self.state.flag == Flag::Green && !self.state.white_set {
                let leader_laps = self.entrants.values().map(|e| e.laps).max().unwrap_or(0);
                if leader_laps + 1 >= value_laps {
                    self.state.white_window_begun = true;
                    self.apply_flag_transition(Flag::White, now_ms);
                }
            }
        }

        IngestOutcome { entrant_id: Some(entrant_id), lap_added: true, reason: None }
    }

    // --- internal helpers -------------------------------------------------

    fn tick(&mut self, now_ms: i64) {
        self.advance_clock(now_ms);
        self.apply_time_based_triggers(now_ms);
        self.maybe_finalize_soft_end();
    }

    fn advance_clock(&mut self, now_ms: i64) {
        if self.state.running {
            let delta = (now_ms - self.state.clock_start_monotonic_ms).max(0);
            self.state.clock_ms += delta;
        }
        self.state.clock_start_monotonic_ms = now_ms;
    }

    fn apply_time_based_triggers(&mut self, now_ms: i64) {
        let Some(RaceLimit::Time { value_s, soft_end, .. }) = self.state.limit else { return };

        if self.state.flag == Flag::Green && !soft_end && value_s >= 60.0 {
            let elapsed_s = self.state.clock_ms as f64 / 1000.0;
            if elapsed_s >= value_s - 60.0 {
                self.state.white_window_begun = true;
                if !self.state.white_set {
                    self.apply_flag_transition(Flag::White, now_ms);
                }
            }
        }

        if self.state.flag != Flag::Checkered && self.state.clock_ms as f64 >= value_s * 1000.0 {
            self.state.limit_reached = true;
            self.apply_flag_transition(Flag::Checkered, now_ms);
        }
    }

    fn maybe_finalize_soft_end(&mut self) {
        if self.state.flag != Flag::Checkered || !self.state.running {
            return;
        }
        let (Some(start), Some(limit)) = (self.state.checkered_flag_start_ms, self.state.limit) else { return };
        let (soft_end, timeout_s) = match limit {
            RaceLimit::Time { soft_end, soft_end_timeout_s, .. } => (soft_end, soft_end_timeout_s),
            RaceLimit::Laps { soft_end, soft_end_timeout_s, .. } => (soft_end, soft_end_timeout_s),
        };
        if soft_end && self.state.clock_ms - start >= (timeout_s * 1000.0) as i64 {
            self.state.running = false;
            self.state.clock_ms_frozen = Some(self.state.clock_ms);
        }
    }

    fn apply_flag_transition(&mut self, new_flag: Flag, now_ms: i64) {
        let prev = self.state.flag;

        if new_flag == Flag::Checkered {
            self.enter_checkered();
        } else if new_flag == Flag::Green && !self.state.running {
            self.state.clock_start_monotonic_ms = now_ms;
            self.state.running = true;
        }

        if prev == Flag::Green
            && new_flag != Flag::Green
            && self.state.white_window_begun
            && !self.state.white_set
        {
            self.state.white_set = true;
        }

        self.state.flag = new_flag;
        self.emit_journal(JournalRecordType::FlagChange, json!({"flag": new_flag}), now_ms);
    }

    fn enter_checkered(&mut self) {
        if self.state.checkered_flag_start_ms.is_none() {
            self.state.checkered_flag_start_ms = Some(self.state.clock_ms);
        }
        let soft_end = match self.state.limit {
            Some(RaceLimit::Time { soft_end, .. }) => soft_end,
            Some(RaceLimit::Laps { soft_end, .. }) => soft_end,
            None => false,
        };
        if !soft_end {
            self.state.running = false;
            self.state.clock_ms_frozen = Some(self.state.clock_ms);
        }
    }

    fn allocate_provisional(&mut self, tag: &str) -> i64 {
        let mut candidate = self.next_provisional_id;
        while self.entrants.contains_key(&candidate) {
            candidate += 1;
        }
        self.next_provisional_id = candidate + 1;

        let last4 = if tag.len() >= 4 { &tag[tag.len() - 4..] } else { tag };
        let name = format!("Unknown {last4:0>4}");
        let mut e = Entrant::new(candidate, None, name, Some(tag.to_string()));
        e.enabled = true;
        self.entrants.insert(candidate, e);
        self.tag_index.insert(tag.to_string(), candidate);
        self.provisional_count += 1;
        candidate
    }

    fn check_no_conflict(&self, tag: &str, exclude_id: i64) -> EngineResult<()> {
        if let Some(holder) = self
            .entrants
            .values()
            .find(|e| e.enabled && e.entrant_id != exclude_id && e.tag.as_deref() == Some(tag))
            .map(|e| e.entrant_id)
        {
            return Err(EngineError::TagConflict { tag: tag.to_string(), holder });
        }
        Ok(())
    }

    fn rebuild_tag_index(&mut self) {
        let mut index = HashMap::new();
        for e in self.entrants.values() {
            if e.enabled {
                if let Some(tag) = &e.tag {
                    index.insert(tag.clone(), e.entrant_id);
                }
            }
        }
        self.tag_index = index;
    }

    fn emit_journal(&mut self, kind: JournalRecordType, payload: serde_json::Value, wall_ms: i64) {
        self.pending.push(JournalRecord {
            id: None,
            race_id: self.state.race_id,
            wall_ms,
            clock_ms: self.state.clock_ms,
            kind,
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt_contracts::Source;

    fn track_pass(tag: &str) -> Pass {
        Pass { tag: tag.to_string(), ts_recv_ms: 0, source: Source::Track, device_id: None, device_secs: None }
    }

    fn loaded_engine() -> RaceEngine {
        let mut eng = RaceEngine::new(SourceRouter::default(), false, false);
        let entrants = vec![EntrantInput {
            entrant_id: 1,
            number: Some("7".into()),
            name: "Driver 7".into(),
            tag: Some("1234567".into()),
            enabled: Some(true),
            status: None,
        }];
        let mode = ModeConfig { limit: Some(RaceLimit::Laps { value_laps: 3, soft_end: true, soft_end_timeout_s: 30.0 }), min_lap_s: 5.0 };
        eng.load(1, "sprint".into(), entrants, mode, None, 0).unwrap();
        eng
    }

    #[test]
    fn first_pass_establishes_baseline_without_crediting() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        let outcome = eng.ingest_pass(track_pass("1234567"), 0);
        assert!(!outcome.lap_added);
        assert_eq!(outcome.reason, Some(NoCreditReason::Baseline));
    }

    #[test]
    fn second_pass_after_min_lap_credits_a_lap() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        eng.ingest_pass(track_pass("1234567"), 0);
        let outcome = eng.ingest_pass(track_pass("1234567"), 6_000);
        assert!(outcome.lap_added);
        assert_eq!(eng.entrants.get(&1).unwrap().laps, 1);
    }

    #[test]
    fn pass_inside_min_lap_dup_window_is_rejected() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        eng.ingest_pass(track_pass("1234567"), 0);
        let outcome = eng.ingest_pass(track_pass("1234567"), 500);
        assert!(!outcome.lap_added);
        assert_eq!(outcome.reason, Some(NoCreditReason::Dup));
    }

    #[test]
    fn unknown_tag_without_auto_provisional_is_unknown() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        let outcome = eng.ingest_pass(track_pass("9999999"), 0);
        assert_eq!(outcome.entrant_id, None);
        assert_eq!(outcome.reason, Some(NoCreditReason::UnknownTag));
    }

    #[test]
    fn reaching_lap_limit_sets_checkered_and_soft_end_still_credits_one_more() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        eng.ingest_pass(track_pass("1234567"), 0);
        eng.ingest_pass(track_pass("1234567"), 6_000);
        eng.ingest_pass(track_pass("1234567"), 12_000);
        eng.ingest_pass(track_pass("1234567"), 18_000);
        assert_eq!(eng.entrants.get(&1).unwrap().laps, 3);
        assert_eq!(eng.state.flag, Flag::Checkered);
        assert!(eng.state.running);

        let outcome = eng.ingest_pass(track_pass("1234567"), 24_000);
        assert!(outcome.lap_added);
        assert_eq!(eng.entrants.get(&1).unwrap().finish_order, Some(1));

        let outcome2 = eng.ingest_pass(track_pass("1234567"), 30_000);
        assert!(!outcome2.lap_added);
        assert_eq!(outcome2.reason, Some(NoCreditReason::SoftEndCompleted));
    }

    #[test]
    fn soft_end_freezes_clock_after_timeout() {
        let mut eng = loaded_engine();
        eng.set_flag("green", 0).unwrap();
        eng.ingest_pass(track_pass("1234567"), 0);
        eng.ingest_pass(track_pass("1234567"), 6_000);
        eng.ingest_pass(track_pass("1234567"), 12_000);
        eng.ingest_pass(track_pass("1234567"), 18_000); // limit reached -> checkered
        assert!(eng.state.running);

        eng.snapshot(18_000 + 31_000);
        assert!(!eng.state.running);
        assert!(eng.state.clock_ms_frozen.is_some());
    }

    #[test]
    fn tag_conflict_is_rejected_on_enable() {
        let mut eng = loaded_engine();
        let second = EntrantInput {
            entrant_id: 2,
            number: Some("8".into()),
            name: "Driver 8".into(),
            tag: Some("1234567".into()),
            enabled: Some(false),
            status: None,
        };
        eng.entrants.insert(2, {
            let mut e = Entrant::new(2, second.number, second.name, second.tag);
            e.enabled = false;
            e
        });
        let err = eng.update_entrant_enable(2, true, 0).unwrap_err();
        assert_eq!(err, EngineError::TagConflict { tag: "1234567".into(), holder: 1 });
    }

    #[test]
    fn pit_in_then_out_records_stint_duration() {
        let mut eng = RaceEngine::new(SourceRouter::new(["IN1".to_string()], ["OUT1".to_string()]), true, false);
        let entrants = vec![EntrantInput {
            entrant_id: 1,
            number: None,
            name: "Driver 7".into(),
            tag: Some("1234567".into()),
            enabled: Some(true),
            status: None,
        }];
        eng.load(1, "enduro".into(), entrants, ModeConfig::default(), None, 0).unwrap();
        eng.set_flag("green", 0).unwrap();

        let mut pit_in = track_pass("1234567");
        pit_in.device_id = Some("IN1".into());
        eng.ingest_pass(pit_in, 10_000);

        let mut pit_out = track_pass("1234567");
        pit_out.device_id = Some("OUT1".into());
        let outcome = eng.ingest_pass(pit_out, 40_000);
        assert_eq!(outcome.reason, Some(NoCreditReason::PitEvent));
        let e = eng.entrants.get(&1).unwrap();
        assert_eq!(e.pit_count, 1);
        assert_eq!(e.last_pit_s, Some(30.0));
    }
}

/// Builds a `tag → entrant_id` index restricted to enabled entrants,
/// failing closed on a conflict instead of silently shadowing (resolves
/// Open Question (b): see SPEC_FULL.md §9).
fn build_tag_index(roster: &BTreeMap<i64, Entrant>) -> EngineResult<HashMap<String, i64>> {
    let mut index = HashMap::new();
    for e in roster.values() {
        if e.enabled {
            if let Some(tag) = &e.tag {
                if let Some(&existing) = index.get(tag) {
                    return Err(EngineError::TagConflict { tag: tag.clone(), holder: existing });
                }
                index.insert(tag.clone(), e.entrant_id);
            }
        }
    }
    Ok(index)
}
