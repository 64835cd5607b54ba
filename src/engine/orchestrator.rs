// ============================================================================
// Bulk Orchestrator
// Batched validate -> calculate -> persist pipeline with per-item isolation
// ============================================================================

use super::calculation_engine::CalculationEngine;
use super::recorder::FieldCalculator;
use crate::domain::bulk::{BulkError, BulkItemError, BulkOperation, BulkOptions, BulkResult};
use crate::domain::config::{EngineConfig, PrecisionContext, DEFAULT_BATCH_SIZE};
use crate::domain::ValidationError;
use crate::interfaces::{
    BulkEvent, BulkRecord, EventHandler, NoOpEventHandler, PersistenceError, RecordFilter,
    StoragePort, WriteOperation, WriteOutcome,
};
use crate::numeric::CalculationError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An item that survived validation, tagged with its index in the input.
type Staged<T> = (usize, T);

/// Applies bulk create / update / upsert calls through a storage port.
///
/// Items are processed in sequential batches. Within a batch every item is
/// validated and calculated independently, so one bad item never blocks the
/// others; the survivors are persisted with a single port call.
pub struct BulkOrchestrator<T: BulkRecord> {
    engine: Arc<CalculationEngine>,
    storage: Arc<dyn StoragePort<T>>,
    event_handler: Arc<dyn EventHandler>,
    batch_size: usize,
    workers: usize,
}

impl<T: BulkRecord> BulkOrchestrator<T> {
    pub fn new(engine: Arc<CalculationEngine>, storage: Arc<dyn StoragePort<T>>) -> Self {
        Self {
            engine,
            storage,
            event_handler: Arc::new(NoOpEventHandler),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 1,
        }
    }

    /// Orchestrator with batch size and worker count taken from `config`
    pub fn from_config(
        engine: Arc<CalculationEngine>,
        storage: Arc<dyn StoragePort<T>>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(engine, storage)
            .with_batch_size(config.batch_size)
            .with_workers(config.calculation_workers)
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Calculation threads per batch; 1 calculates inline
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn engine(&self) -> &CalculationEngine {
        &self.engine
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn bulk_create(
        &self,
        items: Vec<T>,
        options: &BulkOptions,
    ) -> Result<BulkResult<T>, BulkError<T>> {
        self.execute(BulkOperation::Create, items, options)
    }

    /// Replace existing records; items with no match fail with `NotFound`
    pub fn bulk_update(
        &self,
        items: Vec<T>,
        options: &BulkOptions,
    ) -> Result<BulkResult<T>, BulkError<T>> {
        self.execute(BulkOperation::Update, items, options)
    }

    /// Insert or replace by id, falling back to the natural key
    pub fn bulk_upsert(
        &self,
        items: Vec<T>,
        options: &BulkOptions,
    ) -> Result<BulkResult<T>, BulkError<T>> {
        self.execute(BulkOperation::Upsert, items, options)
    }

    /// Run one bulk call.
    ///
    /// Item-level problems are reported in the returned `BulkResult`; `Err`
    /// is reserved for hard aborts, configuration errors and worker panics.
    pub fn execute(
        &self,
        operation: BulkOperation,
        items: Vec<T>,
        options: &BulkOptions,
    ) -> Result<BulkResult<T>, BulkError<T>> {
        let batch_size = options.batch_size.unwrap_or(self.batch_size).max(1);
        let total = items.len();
        let mut result = BulkResult::new(operation, self.engine.version_str());

        debug!(
            entity = T::ENTITY,
            %operation,
            total,
            batch_size,
            version = self.engine.version_str(),
            "starting bulk operation"
        );

        let mut remaining = items.into_iter();
        let mut batch_index = 0;

        loop {
            let batch: Vec<T> = remaining.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let start_index = batch_index * batch_size;
            let next_index = start_index + batch.len();
            let failures_before = result.failed.len();

            self.process_batch(operation, batch_index, start_index, batch, options, &mut result)?;
            result.batches_processed += 1;
            batch_index += 1;

            if options.stop_on_error && result.failed.len() > failures_before {
                for (offset, item) in remaining.by_ref().enumerate() {
                    result.push_failure(
                        next_index + offset,
                        BulkItemError::NotProcessed,
                        options.return_failed_records.then_some(item),
                    );
                }
                result.stopped_early = next_index < total;
                result.sort_failures();

                warn!(
                    entity = T::ENTITY,
                    %operation,
                    batch_index = batch_index - 1,
                    not_processed = total - next_index,
                    "stopping bulk operation after failed batch"
                );

                if options.hard_abort {
                    self.emit_completed(&result);
                    return Err(BulkError::Aborted {
                        result: Box::new(result),
                    });
                }
                break;
            }
        }

        result.sort_failures();
        self.emit_completed(&result);
        Ok(result)
    }

    fn process_batch(
        &self,
        operation: BulkOperation,
        batch_index: usize,
        start_index: usize,
        batch: Vec<T>,
        options: &BulkOptions,
        result: &mut BulkResult<T>,
    ) -> Result<(), BulkError<T>> {
        debug!(
            entity = T::ENTITY,
            batch_index,
            start_index,
            size = batch.len(),
            "processing batch"
        );
        self.event_handler.on_event(BulkEvent::BatchStarted {
            operation,
            batch_index,
            start_index,
            size: batch.len(),
            timestamp: Utc::now(),
        });

        // Validation: collect every issue per item
        let mut staged: Vec<Staged<T>> = Vec::with_capacity(batch.len());
        for (local, item) in batch.into_iter().enumerate() {
            let index = start_index + local;
            let mut issues = if options.validate_all {
                item.validate()
            } else {
                Vec::new()
            };
            if operation != BulkOperation::Create && item.identity_filter().is_none() {
                issues.push(ValidationError::MissingIdentity);
            }

            if issues.is_empty() {
                staged.push((index, item));
            } else {
                self.reject(result, index, BulkItemError::Validation(issues), item, options);
            }
        }

        // Stored audit state flows into replacements
        if operation != BulkOperation::Create && !staged.is_empty() {
            staged = match self.carry_forward_stored(batch_index, staged, options, result) {
                Some(staged) => staged,
                None => return Ok(()),
            };
        }

        // Calculation
        if options.apply_calculations && !staged.is_empty() {
            let outcomes = self.calculate_batch(batch_index, &mut staged)?;
            let mut survivors = Vec::with_capacity(staged.len());
            for ((index, item), outcome) in staged.into_iter().zip(outcomes) {
                match outcome {
                    Ok(()) => survivors.push((index, item)),
                    Err(err) if err.is_configuration_error() => {
                        error!(
                            entity = T::ENTITY,
                            batch_index,
                            error = %err,
                            "calculation misconfigured"
                        );
                        return Err(BulkError::Configuration(err));
                    }
                    Err(err) => {
                        self.reject(result, index, BulkItemError::Calculation(err), item, options)
                    }
                }
            }
            staged = survivors;
        }

        if staged.is_empty() {
            debug!(entity = T::ENTITY, batch_index, "nothing to persist in batch");
            return Ok(());
        }

        // Persistence
        match operation {
            BulkOperation::Create => self.persist_inserts(batch_index, staged, options, result),
            BulkOperation::Update => {
                self.persist_writes(batch_index, staged, false, options, result)
            }
            BulkOperation::Upsert => {
                self.persist_writes(batch_index, staged, true, options, result)
            }
        }

        Ok(())
    }

    /// Load the stored copy of every staged item and carry its derived state
    /// forward. Returns `None` when the lookup failed and the batch with it.
    fn carry_forward_stored(
        &self,
        batch_index: usize,
        mut staged: Vec<Staged<T>>,
        options: &BulkOptions,
        result: &mut BulkResult<T>,
    ) -> Option<Vec<Staged<T>>> {
        let filters: Vec<RecordFilter> = staged
            .iter()
            .filter_map(|(_, item)| item.identity_filter())
            .collect();
        if filters.len() != staged.len() {
            // identity is checked during validation
            return Some(staged);
        }

        match self.storage.find_many(&filters) {
            Ok(found) => {
                for ((_, item), stored) in staged.iter_mut().zip(found) {
                    if let Some(stored) = stored {
                        item.carry_forward(&stored);
                    }
                }
                Some(staged)
            }
            Err(err) => {
                self.fail_batch(batch_index, staged, err, options, result);
                None
            }
        }
    }

    /// Calculate staged items in place, one outcome per item in order.
    ///
    /// Each item is calculated on a copy so a failed item keeps its submitted
    /// values.
    fn calculate_batch(
        &self,
        batch_index: usize,
        staged: &mut [Staged<T>],
    ) -> Result<Vec<Result<(), CalculationError>>, BulkError<T>> {
        let engine: &CalculationEngine = &self.engine;

        if self.workers <= 1 || staged.len() < 2 {
            return Ok(staged
                .iter_mut()
                .map(|(_, item)| calculate_one(engine, item))
                .collect());
        }

        let chunk_size = staged.len().div_ceil(self.workers);
        let joined = crossbeam::scope(|scope| {
            let handles: Vec<_> = staged
                .chunks_mut(chunk_size)
                .map(|chunk| {
                    scope.spawn(move |_| {
                        chunk
                            .iter_mut()
                            .map(|(_, item)| calculate_one(engine, item))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Result<Vec<_>, _>>()
        });

        match joined {
            Ok(Ok(chunks)) => Ok(chunks.into_iter().flatten().collect()),
            _ => {
                error!(entity = T::ENTITY, batch_index, "calculation worker panicked");
                Err(BulkError::WorkerPanicked { batch_index })
            }
        }
    }

    fn persist_inserts(
        &self,
        batch_index: usize,
        staged: Vec<Staged<T>>,
        options: &BulkOptions,
        result: &mut BulkResult<T>,
    ) {
        let docs: Vec<T> = staged.iter().map(|(_, item)| item.clone()).collect();

        let outcome = match self.storage.insert_many(docs) {
            Ok(outcome) => outcome,
            Err(err) => return self.fail_batch(batch_index, staged, err, options, result),
        };

        let mut errors: Vec<Option<PersistenceError>> = vec![None; staged.len()];
        for write_error in outcome.write_errors {
            if let Some(slot) = errors.get_mut(write_error.index) {
                *slot = Some(write_error.error);
            }
        }

        let (mut inserted, mut failed) = (0, 0);
        for ((index, item), write_error) in staged.into_iter().zip(errors) {
            match write_error {
                None => inserted += 1,
                Some(err) => {
                    failed += 1;
                    self.reject(result, index, BulkItemError::Persistence(err), item, options);
                }
            }
        }

        if inserted != outcome.inserted_count {
            warn!(
                entity = T::ENTITY,
                batch_index,
                reported = outcome.inserted_count,
                derived = inserted,
                "storage insert count disagrees with write errors"
            );
        }

        result.inserted += inserted;
        self.batch_persisted(batch_index, inserted, 0, failed);
    }

    fn persist_writes(
        &self,
        batch_index: usize,
        staged: Vec<Staged<T>>,
        upsert: bool,
        options: &BulkOptions,
        result: &mut BulkResult<T>,
    ) {
        let mut writable = Vec::with_capacity(staged.len());
        for (index, item) in staged {
            match item.identity_filter() {
                Some(filter) => writable.push((index, item, filter)),
                None => self.reject(
                    result,
                    index,
                    BulkItemError::Validation(vec![ValidationError::MissingIdentity]),
                    item,
                    options,
                ),
            }
        }
        if writable.is_empty() {
            return;
        }

        let ops = writable
            .iter()
            .map(|(_, item, filter)| WriteOperation::UpdateOne {
                filter: filter.clone(),
                replacement: item.clone(),
                upsert,
            })
            .collect();

        let outcome = match self.storage.bulk_write(ops) {
            Ok(outcome) => outcome,
            Err(err) => {
                let staged = writable
                    .into_iter()
                    .map(|(index, item, _)| (index, item))
                    .collect();
                return self.fail_batch(batch_index, staged, err, options, result);
            }
        };

        let mut outcomes = outcome.outcomes.into_iter();
        let (mut inserted, mut updated, mut failed) = (0, 0, 0);
        for (index, item, filter) in writable {
            let error = match outcomes.next() {
                Some(WriteOutcome::Inserted) => {
                    inserted += 1;
                    continue;
                }
                Some(WriteOutcome::Modified) => {
                    updated += 1;
                    continue;
                }
                Some(WriteOutcome::Unmatched) => BulkItemError::NotFound(filter.to_string()),
                Some(WriteOutcome::Failed(PersistenceError::DuplicateKey { key })) => {
                    warn!(
                        entity = T::ENTITY,
                        index,
                        %filter,
                        natural_key = %key,
                        "natural key belongs to another record"
                    );
                    BulkItemError::IdentityConflict { natural_key: key }
                }
                Some(WriteOutcome::Failed(err)) => BulkItemError::Persistence(err),
                None => BulkItemError::Persistence(PersistenceError::Backend(
                    "storage reported no outcome for this write".to_string(),
                )),
            };
            failed += 1;
            self.reject(result, index, error, item, options);
        }

        result.inserted += inserted;
        result.updated += updated;
        self.batch_persisted(batch_index, inserted, updated, failed);
    }

    /// The port call itself failed: every staged item fails with its message.
    fn fail_batch(
        &self,
        batch_index: usize,
        staged: Vec<Staged<T>>,
        err: PersistenceError,
        options: &BulkOptions,
        result: &mut BulkResult<T>,
    ) {
        let start_index = staged.first().map(|(index, _)| *index).unwrap_or_default();
        error!(
            entity = T::ENTITY,
            batch_index,
            start_index,
            items = staged.len(),
            error = %err,
            "batch persistence failed"
        );
        self.event_handler.on_event(BulkEvent::BatchFailed {
            batch_index,
            start_index,
            error: err.to_string(),
            timestamp: Utc::now(),
        });

        for (index, item) in staged {
            result.push_failure(
                index,
                BulkItemError::Persistence(err.clone()),
                options.return_failed_records.then_some(item),
            );
        }
    }

    fn reject(
        &self,
        result: &mut BulkResult<T>,
        index: usize,
        error: BulkItemError,
        item: T,
        options: &BulkOptions,
    ) {
        warn!(entity = T::ENTITY, index, error = %error, "item failed");
        self.event_handler.on_event(BulkEvent::ItemRejected {
            index,
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
        result.push_failure(index, error, options.return_failed_records.then_some(item));
    }

    fn batch_persisted(&self, batch_index: usize, inserted: usize, updated: usize, failed: usize) {
        debug!(entity = T::ENTITY, batch_index, inserted, updated, failed, "batch persisted");
        self.event_handler.on_event(BulkEvent::BatchPersisted {
            batch_index,
            inserted,
            updated,
            failed,
            timestamp: Utc::now(),
        });
    }

    fn emit_completed(&self, result: &BulkResult<T>) {
        info!(
            entity = T::ENTITY,
            operation = %result.operation,
            inserted = result.inserted,
            updated = result.updated,
            failed = result.failed.len(),
            batches = result.batches_processed,
            version = %result.calculation_version,
            "bulk operation completed"
        );
        self.event_handler.on_event(BulkEvent::Completed {
            operation: result.operation,
            inserted: result.inserted,
            updated: result.updated,
            failed: result.failed.len(),
            calculation_version: result.calculation_version.clone(),
            timestamp: Utc::now(),
        });
    }
}

fn calculate_one<T: BulkRecord>(
    engine: &CalculationEngine,
    item: &mut T,
) -> Result<(), CalculationError> {
    let qualifier = item.precision_qualifier();
    let calculator = FieldCalculator::new(engine, PrecisionContext::Storage)
        .with_qualifier(qualifier.as_deref());
    let mut updated = item.clone();
    updated.apply_calculations(&calculator)?;
    *item = updated;
    Ok(())
}
