use crate::store::ExecutionStore;
use ledgercore::{ExecutionId, ExecutionStatus, Result, WorkflowExecution, WorkflowId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Shared handle on one live run.
///
/// The engine is the only writer of the record; readers get snapshots.
#[derive(Clone)]
pub struct RunHandle {
    id: ExecutionId,
    record: Arc<RwLock<WorkflowExecution>>,
    cancel: CancellationToken,
    done: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    pub fn new(execution: WorkflowExecution) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: execution.id,
            record: Arc::new(RwLock::new(execution)),
            cancel: CancellationToken::new(),
            done: Arc::new(done),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub async fn snapshot(&self) -> WorkflowExecution {
        self.record.read().await.clone()
    }

    pub async fn status(&self) -> ExecutionStatus {
        self.record.read().await.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move a running execution to `cancelled` and stop further scheduling.
    /// Returns false when the run had already reached a terminal state.
    pub async fn cancel(&self) -> bool {
        let mut record = self.record.write().await;
        if !record.finish(ExecutionStatus::Cancelled, None) {
            return false;
        }
        drop(record);
        self.cancel.cancel();
        tracing::info!("Execution {} cancelled", self.id);
        true
    }

    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut WorkflowExecution) -> R) -> R {
        let mut record = self.record.write().await;
        f(&mut record)
    }

    pub(crate) fn mark_done(&self) {
        self.done.send_replace(true);
    }

    /// Resolves once the run has been finished and persisted
    pub async fn wait(&self) {
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Live runs keyed by execution id, backed by a store for finished ones
pub struct ExecutionRegistry {
    live: RwLock<HashMap<ExecutionId, RunHandle>>,
    store: Arc<dyn ExecutionStore>,
}

impl ExecutionRegistry {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            live: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Track a freshly created run
    pub async fn register(&self, execution: WorkflowExecution) -> Result<RunHandle> {
        self.store.put(execution.clone()).await?;
        let handle = RunHandle::new(execution);
        self.live.write().await.insert(handle.id(), handle.clone());
        Ok(handle)
    }

    /// Persist the final record and release waiters
    pub async fn complete(&self, handle: &RunHandle) -> Result<()> {
        let result = self.store.put(handle.snapshot().await).await;
        self.live.write().await.remove(&handle.id());
        handle.mark_done();
        result
    }

    pub async fn get(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        let handle = self.live.read().await.get(&id).cloned();
        match handle {
            Some(handle) => Ok(Some(handle.snapshot().await)),
            None => self.store.get(id).await,
        }
    }

    pub async fn cancel(&self, id: ExecutionId) -> bool {
        let handle = self.live.read().await.get(&id).cloned();
        match handle {
            Some(handle) => handle.cancel().await,
            None => false,
        }
    }

    /// Wait for a run to finish and return its final record
    pub async fn wait(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        let handle = self.live.read().await.get(&id).cloned();
        if let Some(handle) = handle {
            handle.wait().await;
        }
        self.store.get(id).await
    }

    /// Every known run, oldest first. Live runs report their current state.
    pub async fn history(&self, workflow_id: Option<WorkflowId>) -> Result<Vec<WorkflowExecution>> {
        let mut executions = self.store.list(workflow_id).await?;
        let live: Vec<RunHandle> = self.live.read().await.values().cloned().collect();
        for handle in live {
            if let Some(slot) = executions.iter_mut().find(|e| e.id == handle.id()) {
                *slot = handle.snapshot().await;
            }
        }
        Ok(executions)
    }

    pub async fn running_count(&self) -> usize {
        self.live.read().await.len()
    }
}

/// Observability summary over stored workflows and their runs
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStats {
    pub workflow_count: usize,
    pub active_workflow_count: usize,
    pub execution_count: usize,
    pub executions_by_status: BTreeMap<ExecutionStatus, usize>,
    /// Mean wall time of completed runs; 0 when there are none
    pub average_duration_ms: f64,
}

impl WorkflowStats {
    pub(crate) fn from_runs(
        workflow_count: usize,
        active_workflow_count: usize,
        executions: &[WorkflowExecution],
    ) -> Self {
        let mut executions_by_status: BTreeMap<ExecutionStatus, usize> =
            ExecutionStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for execution in executions {
            *executions_by_status.entry(execution.status).or_default() += 1;
        }

        let durations: Vec<u64> = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .filter_map(WorkflowExecution::duration_ms)
            .collect();
        let average_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        Self {
            workflow_count,
            active_workflow_count,
            execution_count: executions.len(),
            executions_by_status,
            average_duration_ms,
        }
    }
}
