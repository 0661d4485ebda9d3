mod common;
use crate::common::{eventually, init_tracing, wait_for_log, with_timeout};

use runwire_test_utils::RecordingSink;
use tokio::sync::oneshot;

use runwire::engine::ExecutionController;
use runwire::transport::{InboundMessage, ObserverCursor, OutboundMessage, Transport};
use runwire::types::RunStatus;

#[tokio::test]
async fn second_poll_returns_only_the_delta() {
    init_tracing();
    let controller = ExecutionController::default();
    let sink = RecordingSink::new();
    let transport = Transport::new(controller.clone(), sink.clone());

    let (gate1_tx, gate1_rx) = oneshot::channel::<()>();
    let (gate2_tx, gate2_rx) = oneshot::channel::<()>();
    assert!(controller.start(move |ctx| async move {
        ctx.logger().plain("first line");
        let _ = gate1_rx.await;
        ctx.logger().plain("second line");
        let _ = gate2_rx.await;
        Ok(true)
    }));
    let log = controller.current_run().unwrap().log;

    with_timeout(wait_for_log(&log, "first line")).await;
    let first = transport.poll(0).unwrap();
    assert_eq!(first.status, RunStatus::Running);
    assert_eq!(first.content, log.slice(0).unwrap());
    assert!(first.content.contains("first line"));
    assert_eq!(first.next_offset, first.content.len());

    gate1_tx.send(()).unwrap();
    with_timeout(wait_for_log(&log, "second line")).await;

    let second = transport.poll(first.next_offset).unwrap();
    assert_eq!(second.offset, first.next_offset);
    assert!(!second.content.contains("first line"));
    assert!(second.content.contains("second line"));
    assert_eq!(format!("{}{}", first.content, second.content), log.contents());

    // Past the end: empty, not an error.
    let beyond = transport.poll(log.len() + 10).unwrap();
    assert!(beyond.content.is_empty());

    gate2_tx.send(()).unwrap();
    with_timeout(controller.wait_until_settled()).await;

    let last = transport.poll(0).unwrap();
    assert_eq!(last.status, RunStatus::Finished);
    assert_eq!(last.content, log.contents());
}

#[tokio::test]
async fn pump_pushes_contiguous_slices_and_finalizes_once() {
    init_tracing();
    let controller = ExecutionController::default();
    let sink = RecordingSink::new();
    let transport = Transport::new(controller.clone(), sink.clone());
    let pump = transport.spawn_pump();

    let (gate_tx, gate_rx) = oneshot::channel::<()>();
    assert!(controller.start(move |ctx| async move {
        let _ = gate_rx.await;
        ctx.progress().declare(["Load", "Report"]);
        for i in 0..20 {
            ctx.logger().plain(&format!("line {i}"));
            tokio::task::yield_now().await;
        }
        ctx.progress().enter("Load").complete();
        Ok(true)
    }));
    let log = controller.current_run().unwrap().log;

    // Let the pump attach before any output.
    with_timeout(eventually(|| {
        sink.messages()
            .iter()
            .any(|m| matches!(m, OutboundMessage::Progress { .. }))
    }))
    .await;
    gate_tx.send(()).unwrap();

    with_timeout(eventually(|| !sink.finished().is_empty())).await;
    pump.abort();

    let full = log.contents();
    let mut expected_offset = None;
    for msg in sink.messages() {
        if let OutboundMessage::LogPush(push) = msg {
            assert_eq!(push.run_id, 1);
            assert_eq!(&full[push.offset..push.offset + push.content.len()], push.content);
            if let Some(expected) = expected_offset {
                assert_eq!(push.offset, expected, "pushes must be contiguous");
            }
            expected_offset = Some(push.offset + push.content.len());
        }
    }
    assert!(expected_offset.is_some(), "expected at least one push");

    let finished = sink.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].logs, full);
    assert_eq!(finished[0].status, RunStatus::Finished);
    assert_eq!(finished[0].status_message, "Completed successfully");

    assert!(sink.messages().iter().any(|m| matches!(
        m,
        OutboundMessage::Progress { progress, .. } if progress.total == 2
    )));
}

#[tokio::test]
async fn cursor_reconstructs_log_from_pushes_and_gap_polls() {
    init_tracing();
    let controller = ExecutionController::default();
    let sink = RecordingSink::new();
    let transport = Transport::new(controller.clone(), sink.clone());
    let pump = transport.spawn_pump();

    assert!(controller.start(|ctx| async move {
        for i in 0..50 {
            ctx.logger().info(&format!("tick {i}"));
        }
        Ok(true)
    }));
    with_timeout(eventually(|| !sink.finished().is_empty())).await;
    pump.abort();

    // Replay everything except run_finished, polling on every gap.
    let mut cursor = ObserverCursor::new();
    for msg in sink.messages() {
        if matches!(msg, OutboundMessage::RunFinished(_)) {
            continue;
        }
        if let runwire::transport::CursorUpdate::Gap { from } = cursor.apply(&msg) {
            let resp = transport.poll(from).unwrap();
            cursor.apply(&OutboundMessage::PollResponse(resp));
        }
    }
    let resp = transport.poll(cursor.consumed()).unwrap();
    cursor.apply(&OutboundMessage::PollResponse(resp));

    let log = controller.current_run().unwrap().log;
    assert_eq!(cursor.text(), log.contents());
}

#[tokio::test]
async fn run_request_while_running_is_rejected() {
    init_tracing();
    let controller = ExecutionController::default();
    let sink = RecordingSink::new();

    let (gate_tx, gate_rx) = oneshot::channel::<()>();
    assert!(controller.start(move |ctx| async move {
        let _ = gate_rx.await;
        Ok(!ctx.is_cancelled())
    }));

    let pipeline = std::sync::Arc::new(runwire::pipeline::CommandPipeline::new(
        runwire_test_utils::builders::PipelineConfigBuilder::new()
            .with_step(runwire::config::StepConfig::new("noop", "true"))
            .build(),
    ));
    let transport = Transport::new(controller.clone(), sink.clone()).with_pipeline(pipeline);

    transport.handle(InboundMessage::RunRequest).unwrap();
    match sink.messages().last() {
        Some(OutboundMessage::Rejected { reason }) => assert!(reason.contains("already active")),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(controller.current_run().unwrap().run_id, 1);

    transport.handle(InboundMessage::CancelRequest).unwrap();
    gate_tx.send(()).unwrap();
    assert_eq!(
        with_timeout(controller.wait_until_settled()).await,
        RunStatus::Aborted
    );
}

#[tokio::test]
async fn poll_request_replies_through_sink() {
    init_tracing();
    let controller = ExecutionController::default();
    let sink = RecordingSink::new();
    let transport = Transport::new(controller.clone(), sink.clone());

    assert!(controller.start(|ctx| async move {
        ctx.logger().plain("héllo");
        Ok(true)
    }));
    with_timeout(controller.wait_until_settled()).await;
    let log = controller.current_run().unwrap().log;

    transport
        .handle(InboundMessage::PollRequest { offset: 0 })
        .unwrap();
    match sink.messages().last() {
        Some(OutboundMessage::PollResponse(resp)) => {
            assert_eq!(resp.content, log.contents());
            assert_eq!(resp.next_offset, log.len());
            assert_eq!(resp.run_id, Some(1));
        }
        other => panic!("expected poll_response, got {other:?}"),
    }

    // Offset inside the two-byte 'é'.
    let full = log.contents();
    let inside = full.find('é').unwrap() + 1;
    transport
        .handle(InboundMessage::PollRequest { offset: inside })
        .unwrap();
    assert!(matches!(
        sink.messages().last(),
        Some(OutboundMessage::Rejected { .. })
    ));
    assert!(transport.poll(inside).unwrap_err().is_validation());
    assert_eq!(controller.status(), RunStatus::Finished);
}
