// Reconciliation under arbitrary push loss, duplication and reordering.

use proptest::prelude::*;

use runwire::log::LogBuffer;
use runwire::transport::{CursorUpdate, LogPush, ObserverCursor, OutboundMessage, PollResponse};
use runwire::types::RunStatus;

fn push_of(run_id: u64, offset: usize, content: &str) -> OutboundMessage {
    OutboundMessage::LogPush(LogPush {
        run_id,
        offset,
        content: content.to_string(),
        status: RunStatus::Running,
    })
}

fn poll_of(buffer: &LogBuffer, run_id: u64, offset: usize) -> OutboundMessage {
    let content = buffer.slice(offset).unwrap();
    OutboundMessage::PollResponse(PollResponse {
        run_id: Some(run_id),
        offset,
        next_offset: offset + content.len(),
        content,
        status: RunStatus::Running,
    })
}

/// What happens to each push on the way to the observer.
#[derive(Debug, Clone, Copy)]
enum Delivery {
    Deliver,
    Drop,
    Duplicate,
    /// Delivered again after the next one.
    Late,
}

fn delivery() -> impl Strategy<Value = Delivery> {
    prop_oneof![
        4 => Just(Delivery::Deliver),
        2 => Just(Delivery::Drop),
        1 => Just(Delivery::Duplicate),
        1 => Just(Delivery::Late),
    ]
}

fn chunk() -> impl Strategy<Value = String> {
    // Mix in multi-byte characters so offsets are exercised at byte level.
    "[a-zé✓ \n]{1,12}"
}

proptest! {
    #[test]
    fn cursor_matches_buffer_whatever_the_delivery(
        chunks in proptest::collection::vec((chunk(), delivery()), 1..40),
        poll_every in 1usize..8,
    ) {
        let buffer = LogBuffer::new();
        let mut cursor = ObserverCursor::new();
        let mut late: Option<OutboundMessage> = None;
        let mut rendered = String::new();

        for (i, (text, fate)) in chunks.iter().enumerate() {
            let offset = buffer.len();
            buffer.append(text);
            let msg = push_of(1, offset, text);

            let mut deliveries = Vec::new();
            match fate {
                Delivery::Deliver => deliveries.push(msg),
                Delivery::Drop => {}
                Delivery::Duplicate => {
                    deliveries.push(msg.clone());
                    deliveries.push(msg);
                }
                Delivery::Late => {
                    if let Some(prev) = late.replace(msg) {
                        deliveries.push(prev);
                    }
                }
            }
            if i % poll_every == 0 {
                deliveries.push(poll_of(&buffer, 1, cursor.consumed()));
            }

            for d in deliveries {
                let mut update = cursor.apply(&d);
                while let CursorUpdate::Gap { from } = update {
                    update = cursor.apply(&poll_of(&buffer, 1, from));
                }
                match update {
                    CursorUpdate::Appended(s) => rendered.push_str(&s),
                    CursorUpdate::Replaced(_) => prop_assert!(false, "no finalize was sent"),
                    _ => {}
                }
                // Never ahead of the buffer, never diverging from it.
                prop_assert!(buffer.contents().starts_with(cursor.text()));
            }
        }

        if let Some(prev) = late.take() {
            if let CursorUpdate::Appended(s) = cursor.apply(&prev) {
                rendered.push_str(&s);
            }
        }

        // Final catch-up poll.
        if let CursorUpdate::Appended(s) = cursor.apply(&poll_of(&buffer, 1, cursor.consumed())) {
            rendered.push_str(&s);
        }

        prop_assert_eq!(cursor.text(), buffer.contents());
        prop_assert_eq!(rendered, buffer.contents());
    }

    #[test]
    fn poll_content_is_exactly_the_slice(
        chunks in proptest::collection::vec(chunk(), 0..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let buffer = LogBuffer::new();
        let mut boundaries = vec![0];
        for c in &chunks {
            buffer.append(c);
            boundaries.push(buffer.len());
        }
        let offset = boundaries[pick.index(boundaries.len())];
        let all = buffer.contents();
        prop_assert_eq!(buffer.slice(offset).unwrap(), &all[offset..]);
    }
}
