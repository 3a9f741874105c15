//! Submission pipeline against fake bus providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chain_plugin::submission::{BatchItem, BatchItemResult, MAX_BATCH_SIZE};
use chain_plugin::test_utils::{make_chain, make_genesis_block, make_packed_transaction};
use chain_plugin::{EmergencyShutdown, SubmissionPipeline, SubmitError};
use parking_lot::Mutex;
use shared_bus::interfaces::{BlockSync, TransactionSync};
use shared_bus::{MethodError, NodeBus, ProviderHandle};
use shared_types::{LedgerError, PackedTransaction, SignedBlock, TransactionTrace};

fn trace_for(trx: &PackedTransaction) -> Arc<TransactionTrace> {
    Arc::new(TransactionTrace {
        id: trx.id(),
        block_num: 2,
        elapsed_us: 0,
        action_traces: Vec::new(),
        except: None,
    })
}

fn out_of_memory() -> LedgerError {
    LedgerError::OutOfMemory {
        detail: "reversible block database is full".to_string(),
    }
}

/// Transaction provider that applies everything and counts calls.
fn counting_provider(bus: &NodeBus, calls: Arc<AtomicUsize>) -> ProviderHandle {
    bus.method::<TransactionSync>().bind(move |(trx, _unconditional)| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(trace_for(&trx))
    })
}

fn pipeline(bus: &Arc<NodeBus>) -> (SubmissionPipeline, EmergencyShutdown) {
    let shutdown = EmergencyShutdown::new();
    (
        SubmissionPipeline::new(Arc::clone(bus), shutdown.clone()),
        shutdown,
    )
}

fn block() -> Arc<SignedBlock> {
    Arc::new(make_chain(&make_genesis_block(), 1).remove(0))
}

#[test]
fn test_oversized_batch_rejected_before_any_call() {
    let bus = Arc::new(NodeBus::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let _provider = counting_provider(&bus, Arc::clone(&calls));
    let (pipeline, _) = pipeline(&bus);

    let items: Vec<BatchItem> = (0..=MAX_BATCH_SIZE)
        .map(|n| Ok(Arc::new(make_packed_transaction((n % 256) as u8, &[]))))
        .collect();

    assert_eq!(
        pipeline.submit_transaction_batch(items),
        Err(SubmitError::BatchTooLarge {
            size: 1001,
            max: MAX_BATCH_SIZE
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_full_batch_accepted() {
    let bus = Arc::new(NodeBus::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let _provider = counting_provider(&bus, Arc::clone(&calls));
    let (pipeline, _) = pipeline(&bus);

    let trx = Arc::new(make_packed_transaction(1, &[]));
    let items: Vec<BatchItem> = (0..MAX_BATCH_SIZE).map(|_| Ok(Arc::clone(&trx))).collect();

    let results = pipeline.submit_transaction_batch(items).unwrap();
    assert_eq!(results.len(), MAX_BATCH_SIZE);
    assert_eq!(calls.load(Ordering::SeqCst), MAX_BATCH_SIZE);
}

#[test]
fn test_batch_isolates_bad_entries() {
    let bus = Arc::new(NodeBus::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let _provider = counting_provider(&bus, Arc::clone(&calls));
    let (pipeline, shutdown) = pipeline(&bus);

    let first = Arc::new(make_packed_transaction(1, &[]));
    let third = Arc::new(make_packed_transaction(3, &[]));
    let items: Vec<BatchItem> = vec![
        Ok(Arc::clone(&first)),
        Err("malformed entry".to_string()),
        Ok(Arc::clone(&third)),
    ];

    let results = pipeline.submit_transaction_batch(items).unwrap();

    assert_eq!(
        results,
        vec![
            BatchItemResult::Applied(trace_for(&first)),
            BatchItemResult::Failed {
                detail: "malformed entry".to_string()
            },
            BatchItemResult::Applied(trace_for(&third)),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!shutdown.is_requested());
}

#[test]
fn test_ledger_rejection_is_per_entry() {
    let bus = Arc::new(NodeBus::new());
    let _provider = bus.method::<TransactionSync>().bind(|(trx, _)| {
        if trx.signatures == ["SIG_2"] {
            Err(LedgerError::DuplicateTransaction { id: trx.id() })
        } else {
            Ok(trace_for(&trx))
        }
    });
    let (pipeline, _) = pipeline(&bus);

    let items: Vec<BatchItem> = (1..=3)
        .map(|n| Ok(Arc::new(make_packed_transaction(n, &[]))))
        .collect();
    let results = pipeline.submit_transaction_batch(items).unwrap();

    let applied: Vec<bool> = results.iter().map(BatchItemResult::is_applied).collect();
    assert_eq!(applied, vec![true, false, true]);
}

#[test]
fn test_transactions_are_submitted_conditionally() {
    let bus = Arc::new(NodeBus::new());
    let flags = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&flags);
    let _provider = bus.method::<TransactionSync>().bind(move |(trx, unconditional)| {
        seen.lock().push(unconditional);
        Ok(trace_for(&trx))
    });
    let (pipeline, _) = pipeline(&bus);

    pipeline
        .submit_transaction(Arc::new(make_packed_transaction(1, &[])))
        .unwrap();

    assert_eq!(*flags.lock(), vec![false]);
}

#[test]
fn test_block_oom_requests_shutdown_once() {
    let bus = Arc::new(NodeBus::new());
    let _provider = bus.method::<BlockSync>().bind(|_| Err(out_of_memory()));
    let (pipeline, shutdown) = pipeline(&bus);

    let first = pipeline.submit_block(block());
    assert!(matches!(first, Err(SubmitError::ShutdownRequested { .. })));
    assert!(shutdown.is_requested());
    assert_eq!(shutdown.requests_issued(), 1);

    let second = pipeline.submit_block(block());
    assert!(matches!(second, Err(SubmitError::ShutdownRequested { .. })));
    assert_eq!(shutdown.requests_issued(), 1);
    assert_eq!(
        shutdown.reason().as_deref(),
        Some(out_of_memory().to_string().as_str())
    );
}

#[test]
fn test_batch_aborts_on_oom() {
    let bus = Arc::new(NodeBus::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _provider = bus.method::<TransactionSync>().bind(move |(trx, _)| {
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
            Err(out_of_memory())
        } else {
            Ok(trace_for(&trx))
        }
    });
    let (pipeline, shutdown) = pipeline(&bus);

    let items: Vec<BatchItem> = (1..=4)
        .map(|n| Ok(Arc::new(make_packed_transaction(n, &[]))))
        .collect();

    assert!(matches!(
        pipeline.submit_transaction_batch(items),
        Err(SubmitError::ShutdownRequested { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(shutdown.requests_issued(), 1);
}

#[test]
fn test_other_ledger_errors_pass_through() {
    let bus = Arc::new(NodeBus::new());
    let _provider = bus
        .method::<BlockSync>()
        .bind(|block| Err(LedgerError::InvalidBlock(format!("bad block {}", block.block_num()))));
    let (pipeline, shutdown) = pipeline(&bus);

    assert_eq!(
        pipeline.submit_block(block()),
        Err(SubmitError::Ledger(LedgerError::InvalidBlock(
            "bad block 2".to_string()
        )))
    );
    assert!(!shutdown.is_requested());
}

#[test]
fn test_unbound_slot_reports_method_error() {
    let bus = Arc::new(NodeBus::new());
    let (pipeline, _) = pipeline(&bus);

    assert_eq!(
        pipeline.submit_block(block()),
        Err(SubmitError::Method(MethodError::NoProviderBound {
            method: "block_sync"
        }))
    );
}
