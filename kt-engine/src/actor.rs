//! The single global actor that owns a `RaceEngine`. All access goes
//! through a bounded command channel; the actor task is the only place
//! that ever calls a `&mut RaceEngine` method, which is what lets the rest
//! of the process treat `EngineHandle` as cheaply cloneable and `Send`.

use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use kt_contracts::{
    Checkpoint, EngineResult, EntrantInput, IngestOutcome, JournalRecord, ModeConfig, Pass,
    RaceLimit, RaceSnapshot,
};

use crate::engine::RaceEngine;

/// How often, in milliseconds of wall-clock time, the actor emits a
/// checkpoint while a race is loaded. Chosen to bound replay work after an
/// unclean shutdown to at most a few seconds of journal records.
pub const CHECKPOINT_INTERVAL_MS: i64 = 15_000;

enum Command {
    Load {
        race_id: i64,
        race_type: String,
        entrants: Vec<EntrantInput>,
        mode: ModeConfig,
        session_limit: Option<RaceLimit>,
        now_ms: i64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    SetFlag {
        flag: String,
        now_ms: i64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    UpdateEntrantEnable {
        entrant_id: i64,
        enabled: bool,
        now_ms: i64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    UpdateEntrantStatus {
        entrant_id: i64,
        status: String,
        now_ms: i64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    AssignTag {
        entrant_id: i64,
        tag: Option<String>,
        now_ms: i64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    IngestPass {
        pass: Pass,
        now_ms: i64,
        reply: oneshot::Sender<IngestOutcome>,
    },
    Snapshot {
        now_ms: i64,
        reply: oneshot::Sender<RaceSnapshot>,
    },
}

/// A cheap, cloneable front door onto the race engine actor. Every method
/// sends a command and awaits its reply; callers never see a `RaceEngine`
/// directly.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub async fn load(
        &self,
        race_id: i64,
        race_type: String,
        entrants: Vec<EntrantInput>,
        mode: ModeConfig,
        session_limit: Option<RaceLimit>,
        now_ms: i64,
    ) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Load { race_id, race_type, entrants, mode, session_limit, now_ms, reply })
            .await;
        recv(rx).await
    }

    pub async fn set_flag(&self, flag: impl Into<String>, now_ms: i64) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetFlag { flag: flag.into(), now_ms, reply }).await;
        recv(rx).await
    }

    pub async fn update_entrant_enable(&self, entrant_id: i64, enabled: bool, now_ms: i64) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UpdateEntrantEnable { entrant_id, enabled, now_ms, reply }).await;
        recv(rx).await
    }

    pub async fn update_entrant_status(&self, entrant_id: i64, status: impl Into<String>, now_ms: i64) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UpdateEntrantStatus { entrant_id, status: status.into(), now_ms, reply }).await;
        recv(rx).await
    }

    pub async fn assign_tag(&self, entrant_id: i64, tag: Option<String>, now_ms: i64) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AssignTag { entrant_id, tag, now_ms, reply }).await;
        recv(rx).await
    }

    pub async fn ingest_pass(&self, pass: Pass, now_ms: i64) -> IngestOutcome {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IngestPass { pass, now_ms, reply }).await;
        rx.await.unwrap_or(IngestOutcome { entrant_id: None, lap_added: false, reason: None })
    }

    pub async fn snapshot(&self, now_ms: i64) -> RaceSnapshot {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { now_ms, reply }).await;
        rx.await.expect("engine actor task dropped without replying")
    }

    async fn send(&self, cmd: Command) {
        if self.tx.send(cmd).await.is_err() {
            error!("engine actor task is gone; command dropped");
        }
    }
}

async fn recv<T>(rx: oneshot::Receiver<EngineResult<T>>) -> EngineResult<T> {
    rx.await.expect("engine actor task dropped without replying")
}

/// Spawns the actor task and returns a handle to it, along with unbounded
/// receivers the caller wires into `kt-storage`'s Journal and Checkpoint
/// writers. Decoupling via channels keeps this crate free of any direct
/// dependency on the persistence stack.
pub fn spawn(
    engine: RaceEngine,
    command_buffer: usize,
) -> (EngineHandle, mpsc::UnboundedReceiver<JournalRecord>, mpsc::UnboundedReceiver<Checkpoint>) {
    let (tx, rx) = mpsc::channel(command_buffer);
    let (journal_tx, journal_rx) = mpsc::unbounded_channel();
    let (checkpoint_tx, checkpoint_rx) = mpsc::unbounded_channel();

    tokio::spawn(run(engine, rx, journal_tx, checkpoint_tx));

    (EngineHandle { tx }, journal_rx, checkpoint_rx)
}

async fn run(
    mut engine: RaceEngine,
    mut rx: mpsc::Receiver<Command>,
    journal_tx: mpsc::UnboundedSender<JournalRecord>,
    checkpoint_tx: mpsc::UnboundedSender<Checkpoint>,
) {
    let mut last_checkpoint_ms: Option<i64> = None;

    while let Some(cmd) = rx.recv().await {
        let now_ms = command_now_ms(&cmd);

        match cmd {
            Command::Load { race_id, race_type, entrants, mode, session_limit, now_ms, reply } => {
                let result = engine.load(race_id, race_type, entrants, mode, session_limit, now_ms);
                last_checkpoint_ms = None;
                let _ = reply.send(result);
            }
            Command::SetFlag { flag, now_ms, reply } => {
                let _ = reply.send(engine.set_flag(&flag, now_ms));
            }
            Command::UpdateEntrantEnable { entrant_id, enabled, now_ms, reply } => {
                let _ = reply.send(engine.update_entrant_enable(entrant_id, enabled, now_ms));
            }
            Command::UpdateEntrantStatus { entrant_id, status, now_ms, reply } => {
                let _ = reply.send(engine.update_entrant_status(entrant_id, &status, now_ms));
            }
            Command::AssignTag { entrant_id, tag, now_ms, reply } => {
                let _ = reply.send(engine.assign_tag(entrant_id, tag, now_ms));
            }
            Command::IngestPass { pass, now_ms, reply } => {
                let outcome = engine.ingest_pass(pass, now_ms);
                let _ = reply.send(outcome);
            }
            Command::Snapshot { now_ms, reply } => {
                let _ = reply.send(engine.snapshot(now_ms));
            }
        }

        for record in engine.drain_journal() {
            if journal_tx.send(record).is_err() {
                warn!("journal sink gone; dropping race event");
                break;
            }
        }

        let due = match last_checkpoint_ms {
            Some(prev) => now_ms - prev >= CHECKPOINT_INTERVAL_MS,
            None => true,
        };
        if due && engine.race_id() != 0 {
            last_checkpoint_ms = Some(now_ms);
            let checkpoint = engine.to_checkpoint(now_ms);
            if checkpoint_tx.send(checkpoint).is_err() {
                warn!("checkpoint sink gone; dropping checkpoint");
            }
        }
    }
}

fn command_now_ms(cmd: &Command) -> i64 {
    match cmd {
        Command::Load { now_ms, .. }
        | Command::SetFlag { now_ms, .. }
        | Command::UpdateEntrantEnable { now_ms, .. }
        | Command::UpdateEntrantStatus { now_ms, .. }
        | Command::AssignTag { now_ms, .. }
        | Command::IngestPass { now_ms, .. }
        | Command::Snapshot { now_ms, .. } => *now_ms,
    }
}
