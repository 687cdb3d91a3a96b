use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::state::{Board, Placement};
use crate::errors::{BoardError, ErrorKind, GatewayError};
use crate::gateway::{Gateway, GatewayExt};
use crate::models::{Task, TaskStatus};

/// Observable phase of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BoardPhase {
    /// Buckets reflect the last known server state plus settled moves.
    Idle,
    /// A card is picked up; nothing has been sent.
    Dragging { task_id: i64 },
    /// At least one status update is in flight.
    Committing { in_flight: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved to another bucket; a commit is now expected.
    Moved { origin: Placement },
    /// Reordered inside its own bucket. Local only.
    Reordered,
    /// Task was not in the source bucket (stale drag) or the board is
    /// detached. Nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The backend accepted the new status.
    Committed,
    /// No status change to persist; the gateway was not called.
    LocalOnly,
    /// The board was detached or reloaded while the request was in flight;
    /// the result was not applied.
    Discarded,
}

/// Notifications for whatever renders the board.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    Loaded {
        tasks: usize,
    },
    TaskMoved {
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
        index: usize,
    },
    CommitSucceeded {
        task_id: i64,
        status: TaskStatus,
    },
    CommitFailed {
        task_id: i64,
        kind: ErrorKind,
        message: String,
    },
    RolledBack {
        task_id: i64,
        to: Placement,
    },
}

/// A cross-bucket move awaiting its commit. `origin` is where the task goes
/// back to if the commit fails; `to` is the status the commit must carry.
#[derive(Debug, Clone, Copy)]
struct PendingMove {
    origin: Placement,
    to: TaskStatus,
}

#[derive(Debug, Default)]
struct CommitSlot {
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Callers holding or waiting on `lock`. The slot is removed at zero.
    users: usize,
}

type CommitLocks = Mutex<HashMap<i64, CommitSlot>>;

/// Registration on a task's commit lock, released on drop.
struct CommitTicket<'a> {
    locks: &'a CommitLocks,
    task_id: i64,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for CommitTicket<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = locks.get_mut(&self.task_id) {
            slot.users -= 1;
            if slot.users == 0 {
                locks.remove(&self.task_id);
            }
        }
    }
}

/// One commit counted in `in_flight`.
///
/// Dropped without [`InFlight::finish`] means the commit future was
/// cancelled mid-request: the slot is released and the move is unwound like
/// a failed commit.
struct InFlight<'a> {
    manager: &'a BoardManager,
    task_id: i64,
    generation: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    /// Release the slot. Returns the locked state when the result still
    /// applies to this board.
    fn finish(mut self) -> Option<MutexGuard<'a, BoardInner>> {
        self.armed = false;
        let manager = self.manager;
        let mut state = manager.state();
        state.in_flight -= 1;
        (manager.is_alive() && state.generation == self.generation).then_some(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let rolled_back = {
            let mut state = self.manager.state();
            state.in_flight -= 1;
            if !self.manager.is_alive() || state.generation != self.generation {
                return;
            }
            BoardManager::unwind(&mut state, self.task_id).flatten()
        };
        warn!(task_id = self.task_id, "move commit abandoned before the backend answered");
        if let Some(to) = rolled_back {
            self.manager.emit(BoardEvent::RolledBack {
                task_id: self.task_id,
                to,
            });
        }
    }
}

#[derive(Debug, Default)]
struct BoardInner {
    board: Board,
    dragging: Option<i64>,
    pending: HashMap<i64, VecDeque<PendingMove>>,
    in_flight: usize,
    /// Bumped by every `load`; commits started under an older generation
    /// are discarded.
    generation: u64,
}

/// Optimistic Kanban board for one project.
///
/// Cheap to clone: clones share the same buckets, so a commit can be
/// awaited on a spawned task while the UI keeps issuing moves.
///
/// Commits of the same task are serialized in call order. When a commit
/// fails while a later move of the same task is still queued, the failed
/// move's origin becomes the rollback target of the queued one and the task
/// stays put; the task only jumps back once nothing newer is pending.
#[derive(Clone)]
pub struct BoardManager {
    gateway: Arc<dyn Gateway>,
    inner: Arc<Mutex<BoardInner>>,
    commit_locks: Arc<CommitLocks>,
    alive: Arc<AtomicBool>,
    events: broadcast::Sender<BoardEvent>,
}

impl BoardManager {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            gateway,
            inner: Arc::new(Mutex::new(BoardInner::default())),
            commit_locks: Arc::new(Mutex::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(true)),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Replace the board with a fresh server list. Pending bookkeeping is
    /// dropped and in-flight commits will be discarded.
    pub fn load(&self, tasks: Vec<Task>) {
        let count = tasks.len();
        {
            let mut state = self.state();
            state.board = Board::from_tasks(tasks);
            state.dragging = None;
            state.pending.clear();
            state.generation += 1;
        }
        debug!(tasks = count, "board loaded");
        self.emit(BoardEvent::Loaded { tasks: count });
    }

    /// Snapshot of the buckets.
    pub fn board(&self) -> Board {
        self.state().board.clone()
    }

    pub fn bucket(&self, status: TaskStatus) -> Vec<Task> {
        self.state().board.bucket(status).to_vec()
    }

    /// All buckets in column order.
    pub fn buckets(&self) -> Vec<(TaskStatus, Vec<Task>)> {
        let state = self.state();
        state
            .board
            .buckets()
            .map(|(status, tasks)| (status, tasks.to_vec()))
            .collect()
    }

    pub fn bucket_ids(&self, status: TaskStatus) -> Vec<i64> {
        self.state().board.ids(status)
    }

    pub fn phase(&self) -> BoardPhase {
        let state = self.state();
        if state.in_flight > 0 {
            BoardPhase::Committing {
                in_flight: state.in_flight,
            }
        } else if let Some(task_id) = state.dragging {
            BoardPhase::Dragging { task_id }
        } else {
            BoardPhase::Idle
        }
    }

    /// Cross-bucket moves whose commit has not resolved yet.
    pub fn pending_moves(&self) -> usize {
        self.state().pending.values().map(VecDeque::len).sum()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop applying late results. Used when the view owning the board goes
    /// away.
    pub fn detach(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Enter the dragging phase. Returns `false` if the task is not on the
    /// board.
    pub fn pick_up(&self, task_id: i64) -> bool {
        let mut state = self.state();
        if state.board.task(task_id).is_none() {
            return false;
        }
        state.dragging = Some(task_id);
        true
    }

    pub fn cancel_drag(&self) {
        self.state().dragging = None;
    }

    /// Apply a drop locally and immediately.
    pub fn begin_move(
        &self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
        to_index: usize,
    ) -> MoveOutcome {
        if !self.is_alive() {
            return MoveOutcome::Ignored;
        }
        let (outcome, index) = {
            let mut state = self.state();
            let Some(origin) = state.board.move_task(task_id, from, to, to_index) else {
                debug!(task_id, %from, "ignoring drop of task not in source bucket");
                return MoveOutcome::Ignored;
            };
            state.dragging = None;
            let index = state
                .board
                .placement_of(task_id)
                .map(|p| p.index)
                .unwrap_or(to_index);
            if from == to {
                (MoveOutcome::Reordered, index)
            } else {
                state
                    .pending
                    .entry(task_id)
                    .or_default()
                    .push_back(PendingMove { origin, to });
                (MoveOutcome::Moved { origin }, index)
            }
        };
        self.emit(BoardEvent::TaskMoved {
            task_id,
            from,
            to,
            index,
        });
        outcome
    }

    fn commit_ticket(&self, task_id: i64) -> CommitTicket<'_> {
        let mut locks = self
            .commit_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = locks.entry(task_id).or_default();
        slot.users += 1;
        CommitTicket {
            locks: &self.commit_locks,
            task_id,
            lock: slot.lock.clone(),
        }
    }

    /// Persist the oldest pending move of `task_id` as `new_status`.
    ///
    /// `new_status` must be the bucket that move dropped the task into.
    /// On failure the move is rolled back, one `CommitFailed` event is
    /// emitted and the classified error is returned. Dropping the returned
    /// future before it resolves rolls the move back as well.
    pub async fn commit_move(
        &self,
        task_id: i64,
        new_status: TaskStatus,
    ) -> Result<CommitOutcome, BoardError> {
        let ticket = self.commit_ticket(task_id);
        let _serial = ticket.lock.clone().lock_owned().await;
        self.commit_serialized(task_id, new_status).await
    }

    async fn commit_serialized(
        &self,
        task_id: i64,
        new_status: TaskStatus,
    ) -> Result<CommitOutcome, BoardError> {
        let in_flight = {
            let mut state = self.state();
            let Some(front) = state.pending.get(&task_id).and_then(|q| q.front()).copied() else {
                return Ok(CommitOutcome::LocalOnly);
            };
            if front.to != new_status {
                return Err(BoardError::StatusMismatch {
                    task_id,
                    expected: front.to,
                    requested: new_status,
                });
            }
            if front.origin.status == new_status {
                // Dropped back into the status the server already has.
                Self::pop_pending(&mut state, task_id);
                return Ok(CommitOutcome::LocalOnly);
            }
            state.in_flight += 1;
            InFlight {
                manager: self,
                task_id,
                generation: state.generation,
                armed: true,
            }
        };

        debug!(task_id, status = %new_status, "committing move");
        let result = self.gateway.update_task_status(task_id, new_status).await;

        let Some(mut state) = in_flight.finish() else {
            debug!(task_id, "discarding commit result for stale board");
            return Ok(CommitOutcome::Discarded);
        };

        match result {
            Ok(_) => {
                if Self::pop_pending(&mut state, task_id).is_none() {
                    return Ok(CommitOutcome::Discarded);
                }
                drop(state);
                self.emit(BoardEvent::CommitSucceeded {
                    task_id,
                    status: new_status,
                });
                Ok(CommitOutcome::Committed)
            }
            Err(source) => {
                let Some(rolled_back) = Self::unwind(&mut state, task_id) else {
                    return Ok(CommitOutcome::Discarded);
                };
                drop(state);
                Err(self.report_failure(task_id, rolled_back, source))
            }
        }
    }

    fn pop_pending(state: &mut BoardInner, task_id: i64) -> Option<PendingMove> {
        let queue = state.pending.get_mut(&task_id)?;
        let front = queue.pop_front();
        if queue.is_empty() {
            state.pending.remove(&task_id);
        }
        front
    }

    /// Settle the oldest pending move of `task_id` as not persisted.
    ///
    /// `None` when nothing was pending. Otherwise the inner value is the
    /// placement the task was restored to, or `None` when a queued move
    /// inherits the origin and the task stays put.
    fn unwind(state: &mut BoardInner, task_id: i64) -> Option<Option<Placement>> {
        let settled = Self::pop_pending(state, task_id)?;
        let inner = &mut *state;
        let rolled_back = match inner.pending.get_mut(&task_id).and_then(|q| q.front_mut()) {
            Some(next) => {
                // The failed move never reached the server; the queued
                // move must fall back to where this one started.
                next.origin = settled.origin;
                None
            }
            None => inner
                .board
                .restore(task_id, settled.origin)
                .then_some(settled.origin),
        };
        Some(rolled_back)
    }

    fn report_failure(
        &self,
        task_id: i64,
        rolled_back: Option<Placement>,
        source: GatewayError,
    ) -> BoardError {
        warn!(task_id, error = %source, "move commit failed");
        if let Some(to) = rolled_back {
            self.emit(BoardEvent::RolledBack { task_id, to });
        }
        self.emit(BoardEvent::CommitFailed {
            task_id,
            kind: source.kind(),
            message: source.to_string(),
        });
        BoardError::CommitFailed { task_id, source }
    }

    /// Drop and commit in one step.
    pub async fn move_task(
        &self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
        to_index: usize,
    ) -> Result<CommitOutcome, BoardError> {
        match self.begin_move(task_id, from, to, to_index) {
            MoveOutcome::Moved { .. } => self.commit_move(task_id, to).await,
            MoveOutcome::Reordered => Ok(CommitOutcome::LocalOnly),
            MoveOutcome::Ignored => Err(BoardError::UnknownTask { task_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ListFilter;
    use crate::models::{EntityKind, Priority};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Gateway fake that records status updates and answers from a script.
    /// With a gate, every update waits for a permit before answering.
    #[derive(Default)]
    struct FakeGateway {
        updates: Mutex<Vec<(i64, Value)>>,
        script: Mutex<VecDeque<Result<(), GatewayError>>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeGateway {
        fn scripted(results: Vec<Result<(), GatewayError>>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                ..Default::default()
            }
        }

        fn gated(results: Vec<Result<(), GatewayError>>, gate: Arc<Semaphore>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn list(&self, _: EntityKind, _: &ListFilter) -> Result<Vec<Value>, GatewayError> {
            Ok(Vec::new())
        }

        async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, GatewayError> {
            Err(GatewayError::from_status(404, kind.as_str(), &id.to_string(), String::new()))
        }

        async fn create(&self, _: EntityKind, payload: Value) -> Result<Value, GatewayError> {
            Ok(payload)
        }

        async fn update(
            &self,
            _: EntityKind,
            id: i64,
            payload: Value,
        ) -> Result<Value, GatewayError> {
            self.updates.lock().unwrap().push((id, payload.clone()));
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
            next.map(|_| payload)
        }

        async fn delete(&self, _: EntityKind, _: i64) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn add_member(&self, _: i64, _: i64) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn remove_member(&self, _: i64, _: i64) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn task(id: i64, status: TaskStatus) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: None,
            status,
            priority: Priority::Medium,
            due_date: None,
            project_id: 1,
            assignee_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn scenario_tasks() -> Vec<Task> {
        use TaskStatus::*;
        vec![task(1, Pending), task(2, Pending), task(3, Completed)]
    }

    fn manager(gateway: FakeGateway) -> (BoardManager, Arc<FakeGateway>) {
        let gateway = Arc::new(gateway);
        let manager = BoardManager::new(gateway.clone());
        (manager, gateway)
    }

    fn sorted_ids(board: &Board) -> Vec<i64> {
        let mut ids = board.all_ids();
        ids.sort_unstable();
        ids
    }

    fn drain(rx: &mut broadcast::Receiver<BoardEvent>) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn conflict() -> GatewayError {
        GatewayError::Conflict {
            message: "task changed on server".into(),
        }
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_and_reports_once() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::scripted(vec![Err(
            GatewayError::transport("connection reset"),
        )]));
        board.load(scenario_tasks());
        let mut rx = board.subscribe();

        assert!(matches!(
            board.begin_move(1, Pending, Completed, 0),
            MoveOutcome::Moved { .. }
        ));
        assert_eq!(board.bucket_ids(Pending), vec![2]);
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);

        let err = board.commit_move(1, Completed).await.unwrap_err();
        assert!(matches!(err, BoardError::CommitFailed { task_id: 1, .. }));
        assert_eq!(board.bucket_ids(Pending), vec![1, 2]);
        assert_eq!(board.bucket_ids(Completed), vec![3]);
        assert_eq!(gateway.update_count(), 1);

        let failures = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, BoardEvent::CommitFailed { .. }))
            .count();
        assert_eq!(failures, 1);
        assert_eq!(board.phase(), BoardPhase::Idle);
    }

    #[tokio::test]
    async fn rollback_restores_exact_prior_board() {
        use TaskStatus::*;
        let (board, _) = manager(FakeGateway::scripted(vec![Err(conflict())]));
        board.load(vec![
            task(1, InProgress),
            task(2, InProgress),
            task(3, InProgress),
            task(4, Pending),
            task(5, Completed),
        ]);
        let before = board.board();

        board.begin_move(2, InProgress, Pending, 1);
        let err = board.commit_move(2, Pending).await.unwrap_err();

        assert_eq!(board.board(), before);
        assert_eq!(
            err.gateway_error().map(GatewayError::kind),
            Some(ErrorKind::Conflict)
        );
    }

    #[tokio::test]
    async fn successful_commit_keeps_optimistic_state() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::default());
        board.load(scenario_tasks());

        let outcome = board.move_task(1, Pending, InProgress, 0).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(board.bucket_ids(InProgress), vec![1]);
        assert_eq!(board.board().task(1).map(|t| t.status), Some(InProgress));
        assert_eq!(
            gateway.updates.lock().unwrap().as_slice(),
            &[(1, json!({"status": "in_progress"}))]
        );
        assert_eq!(board.pending_moves(), 0);
    }

    #[tokio::test]
    async fn same_bucket_reorder_never_calls_gateway() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::default());
        board.load(scenario_tasks());

        assert_eq!(board.begin_move(1, Pending, Pending, 1), MoveOutcome::Reordered);
        assert_eq!(board.bucket_ids(Pending), vec![2, 1]);
        assert_eq!(
            board.commit_move(1, Pending).await.unwrap(),
            CommitOutcome::LocalOnly
        );
        assert_eq!(
            board.move_task(2, Pending, Pending, 5).await.unwrap(),
            CommitOutcome::LocalOnly
        );
        assert_eq!(gateway.update_count(), 0);
    }

    #[tokio::test]
    async fn stale_drop_is_ignored() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::default());
        board.load(scenario_tasks());
        let before = board.board();

        assert_eq!(board.begin_move(3, Pending, InProgress, 0), MoveOutcome::Ignored);
        assert_eq!(board.board(), before);
        assert!(matches!(
            board.move_task(99, Pending, Completed, 0).await,
            Err(BoardError::UnknownTask { task_id: 99 })
        ));
        assert_eq!(gateway.update_count(), 0);
    }

    #[tokio::test]
    async fn moving_back_to_confirmed_status_skips_the_gateway() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::scripted(vec![Err(conflict())]));
        board.load(scenario_tasks());

        board.begin_move(1, Pending, Completed, 0);
        board.begin_move(1, Completed, Pending, 0);
        assert_eq!(board.bucket_ids(Pending), vec![1, 2]);

        // The first move never lands, so the server still has Pending.
        assert!(board.commit_move(1, Completed).await.is_err());
        assert_eq!(board.bucket_ids(Pending), vec![1, 2]);

        let outcome = board.commit_move(1, Pending).await.unwrap();
        assert_eq!(outcome, CommitOutcome::LocalOnly);
        assert_eq!(gateway.update_count(), 1);
        assert_eq!(board.pending_moves(), 0);
        assert_eq!(board.bucket_ids(Pending), vec![1, 2]);
        assert_eq!(board.bucket_ids(Completed), vec![3]);
    }

    #[tokio::test]
    async fn commit_must_carry_the_dropped_status() {
        use TaskStatus::*;
        let (board, gateway) = manager(FakeGateway::default());
        board.load(scenario_tasks());
        board.begin_move(1, Pending, Completed, 0);

        for wrong in [InProgress, Pending] {
            let err = board.commit_move(1, wrong).await.unwrap_err();
            assert!(matches!(
                err,
                BoardError::StatusMismatch { task_id: 1, expected: Completed, requested } if requested == wrong
            ));
        }
        assert_eq!(gateway.update_count(), 0);
        assert_eq!(board.pending_moves(), 1);
        assert_eq!(board.phase(), BoardPhase::Idle);

        assert_eq!(
            board.commit_move(1, Completed).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            gateway.updates.lock().unwrap().as_slice(),
            &[(1, json!({"status": "completed"}))]
        );
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);
    }

    #[tokio::test]
    async fn cancelled_commit_returns_to_idle_and_rolls_back() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, gateway) = manager(FakeGateway::gated(vec![Ok(())], gate.clone()));
        board.load(scenario_tasks());
        let before = board.board();
        let mut rx = board.subscribe();

        board.begin_move(1, Pending, Completed, 0);
        let handle = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, Completed).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(board.phase(), BoardPhase::Committing { in_flight: 1 });

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(board.phase(), BoardPhase::Idle);
        assert_eq!(board.pending_moves(), 0);
        assert_eq!(board.board(), before);
        assert!(board.commit_locks.lock().unwrap().is_empty());
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, BoardEvent::RolledBack { task_id: 1, .. }))
        );

        // Nothing stale is left queued for the next move of the same task.
        gate.add_permits(1);
        assert_eq!(
            board.move_task(1, Pending, InProgress, 0).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(gateway.update_count(), 2);
        assert_eq!(board.bucket_ids(InProgress), vec![1]);
    }

    #[tokio::test]
    async fn cancelled_commit_hands_its_origin_to_the_queued_move() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, _) = manager(FakeGateway::gated(
            vec![Err(GatewayError::transport("down"))],
            gate.clone(),
        ));
        board.load(scenario_tasks());
        let before = board.board();

        board.begin_move(1, Pending, InProgress, 0);
        let first = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, InProgress).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        board.begin_move(1, InProgress, Completed, 0);

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        // The later move is still pending, so the card stays where it is.
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);
        assert_eq!(board.pending_moves(), 1);

        gate.add_permits(1);
        assert!(board.commit_move(1, Completed).await.is_err());
        assert_eq!(board.board(), before);
    }

    #[tokio::test]
    async fn ids_survive_any_mix_of_failed_and_successful_commits() {
        use TaskStatus::*;
        let (board, _) = manager(FakeGateway::scripted(vec![
            Err(conflict()),
            Ok(()),
            Err(GatewayError::transport("timeout")),
            Ok(()),
        ]));
        let tasks: Vec<Task> = (1..=8).map(|i| task(i, TaskStatus::ALL[i as usize % 3])).collect();
        board.load(tasks.clone());
        let expected = sorted_ids(&board.board());

        let moves = [
            (1, InProgress, Completed),
            (2, Completed, Pending),
            (3, Pending, InProgress),
            (4, InProgress, Pending),
        ];
        for (id, from, to) in moves {
            let _ = board.move_task(id, from, to, 0).await;
            assert_eq!(sorted_ids(&board.board()), expected);
            assert_eq!(board.board().len(), tasks.len());
        }
        assert!(board.bucket_ids(InProgress).contains(&1));
        assert!(board.bucket_ids(Pending).contains(&2));
    }

    #[tokio::test]
    async fn same_task_commits_are_serialized() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, gateway) = manager(FakeGateway::gated(
            vec![Err(conflict()), Ok(())],
            gate.clone(),
        ));
        board.load(scenario_tasks());

        board.begin_move(1, Pending, InProgress, 0);
        let first = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, InProgress).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        board.begin_move(1, InProgress, Completed, 0);
        let second = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, Completed).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Second commit waits behind the first.
        assert_eq!(gateway.update_count(), 1);
        assert_eq!(board.phase(), BoardPhase::Committing { in_flight: 1 });

        gate.add_permits(2);
        assert!(first.await.unwrap().is_err());
        assert_eq!(second.await.unwrap().unwrap(), CommitOutcome::Committed);

        // The failed first move is superseded; the task stays where the
        // second move put it.
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);
        assert_eq!(board.bucket_ids(Pending), vec![2]);
        assert_eq!(gateway.update_count(), 2);
        assert_eq!(board.phase(), BoardPhase::Idle);
        assert!(board.commit_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queued_failures_fall_back_to_first_origin() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, _) = manager(FakeGateway::gated(
            vec![Err(conflict()), Err(GatewayError::transport("down"))],
            gate.clone(),
        ));
        board.load(scenario_tasks());
        let before = board.board();

        board.begin_move(1, Pending, InProgress, 0);
        let first = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, InProgress).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        board.begin_move(1, InProgress, Completed, 1);
        let second = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, Completed).await }
        });

        gate.add_permits(2);
        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().is_err());
        assert_eq!(board.board(), before);
    }

    #[tokio::test]
    async fn detached_board_ignores_late_results() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, _) = manager(FakeGateway::gated(vec![Err(conflict())], gate.clone()));
        board.load(scenario_tasks());
        let mut rx = board.subscribe();

        board.begin_move(1, Pending, Completed, 0);
        let pending = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, Completed).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        board.detach();
        gate.add_permits(1);

        assert_eq!(pending.await.unwrap().unwrap(), CommitOutcome::Discarded);
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, BoardEvent::CommitFailed { .. } | BoardEvent::RolledBack { .. }))
        );
        assert_eq!(board.begin_move(2, Pending, Completed, 0), MoveOutcome::Ignored);
    }

    #[tokio::test]
    async fn reload_discards_in_flight_results() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, _) = manager(FakeGateway::gated(vec![Err(conflict())], gate.clone()));
        board.load(scenario_tasks());

        board.begin_move(1, Pending, Completed, 0);
        let pending = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, Completed).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        board.load(vec![task(1, Completed), task(2, Pending), task(3, Completed)]);
        gate.add_permits(1);

        assert_eq!(pending.await.unwrap().unwrap(), CommitOutcome::Discarded);
        assert_eq!(board.bucket_ids(Completed), vec![1, 3]);
        assert_eq!(board.phase(), BoardPhase::Idle);
    }

    #[tokio::test]
    async fn phases_follow_the_drag_lifecycle() {
        use TaskStatus::*;
        let gate = Arc::new(Semaphore::new(0));
        let (board, _) = manager(FakeGateway::gated(vec![Ok(())], gate.clone()));
        board.load(scenario_tasks());
        assert_eq!(board.phase(), BoardPhase::Idle);

        assert!(!board.pick_up(42));
        assert!(board.pick_up(1));
        assert_eq!(board.phase(), BoardPhase::Dragging { task_id: 1 });
        board.cancel_drag();
        assert_eq!(board.phase(), BoardPhase::Idle);

        board.pick_up(1);
        board.begin_move(1, Pending, InProgress, 0);
        let pending = tokio::spawn({
            let board = board.clone();
            async move { board.commit_move(1, InProgress).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(board.phase(), BoardPhase::Committing { in_flight: 1 });

        gate.add_permits(1);
        assert_eq!(pending.await.unwrap().unwrap(), CommitOutcome::Committed);
        assert_eq!(board.phase(), BoardPhase::Idle);
    }

    #[tokio::test]
    async fn moves_are_announced_to_subscribers() {
        use TaskStatus::*;
        let (board, _) = manager(FakeGateway::default());
        let mut rx = board.subscribe();
        board.load(scenario_tasks());
        board.move_task(2, Pending, Completed, 1).await.unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events[0], BoardEvent::Loaded { tasks: 3 }));
        assert!(matches!(
            events[1],
            BoardEvent::TaskMoved { task_id: 2, from: Pending, to: Completed, index: 1 }
        ));
        assert!(matches!(
            events[2],
            BoardEvent::CommitSucceeded { task_id: 2, status: Completed }
        ));
    }
}
