//! Integration tests for the conversation controller.
//!
//! These tests drive the controller against a scripted document service and
//! tokio's paused clock, so reveal timing is checked without real waits.

use std::sync::Arc;
use std::time::Duration;

use docchat_session::{
    Attachment, CapturedCall, ChatConfig, ChatError, ConversationController, ScriptedDocumentService,
    Sender, SessionId, SubmitOutcome,
};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

const TICK: Duration = Duration::from_millis(10);

fn controller(service: &ScriptedDocumentService) -> ConversationController {
    let config = ChatConfig {
        reveal_interval_ms: TICK.as_millis() as u64,
        ..ChatConfig::default()
    };
    ConversationController::new(config, Arc::new(service.clone()))
}

fn pdf(name: &str) -> Option<Attachment> {
    Some(Attachment::new(name, b"%PDF-1.7 test".to_vec()))
}

/// Sleep until `n` more reveal ticks have fired, landing between ticks.
async fn wait_ticks(n: u32) {
    tokio::time::sleep(TICK * n + TICK / 2).await;
}

async fn wait_until_idle(controller: &ConversationController) {
    let mut changes = controller.subscribe();
    while controller.is_revealing() {
        changes.changed().await.unwrap();
    }
}

fn answered(outcome: SubmitOutcome) -> (docchat_session::MessageId, docchat_session::MessageId) {
    match outcome {
        SubmitOutcome::Answered {
            user_message,
            assistant_message,
        } => (user_message, assistant_message),
        SubmitOutcome::Discarded => panic!("submit was discarded"),
    }
}

/// Test the first exchange of a conversation end to end.
#[tokio::test(start_paused = true)]
async fn test_first_submit_reveals_answer() {
    let service = ScriptedDocumentService::new()
        .with_session("s-1")
        .with_answer("It is about caching.");
    let controller = controller(&service);

    let outcome = assert_ok!(controller.submit("summarize", pdf("doc.pdf")).await);
    let (user_id, assistant_id) = answered(outcome);

    let snapshot = controller.snapshot();
    let users: Vec<_> = snapshot.messages.iter().filter(|m| m.sender == Sender::User).collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, user_id);
    assert_eq!(users[0].text, "summarize");
    assert_eq!(users[0].attachment_name.as_deref(), Some("doc.pdf"));
    assert_eq!(snapshot.title.as_deref(), Some("doc.pdf"));

    wait_until_idle(&controller).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.message(assistant_id).unwrap().text, "It is about caching.");
    assert_eq!(
        service.calls(),
        vec![
            CapturedCall::Upload {
                file_name: "doc.pdf".to_string(),
                size: 13
            },
            CapturedCall::Ask {
                session: SessionId::new("s-1"),
                question: "summarize".to_string()
            },
        ]
    );
}

/// Test that the answer grows by exactly one character per tick.
#[tokio::test(start_paused = true)]
async fn test_reveal_is_character_by_character() {
    let answer = "Grüße, world";
    let service = ScriptedDocumentService::new().with_answer(answer);
    let controller = controller(&service);

    let (_, assistant_id) = answered(controller.submit("hi", pdf("doc.pdf")).await.unwrap());
    let total = answer.chars().count();

    tokio::time::sleep(TICK / 2).await;
    for revealed in 1..=total {
        tokio::time::sleep(TICK).await;
        let text = controller.snapshot().message(assistant_id).unwrap().text.clone();
        let expected: String = answer.chars().take(revealed).collect();
        assert_eq!(text, expected);
        assert_eq!(controller.is_revealing(), revealed < total);
    }
}

/// Test that empty input never touches the conversation.
#[tokio::test]
async fn test_empty_input_never_mutates_store() {
    let service = ScriptedDocumentService::new();
    let controller = controller(&service);

    for text in ["", "   ", "\n\t"] {
        let err = assert_err!(controller.submit(text, None).await);
        assert!(matches!(err, ChatError::EmptyInput));
    }

    assert!(controller.snapshot().is_empty());
    assert!(service.calls().is_empty());
}

/// Test that a conversation cannot start without a document.
#[tokio::test]
async fn test_first_submit_without_attachment() {
    let service = ScriptedDocumentService::new();
    let controller = controller(&service);

    let err = assert_err!(controller.submit("what is this?", None).await);
    assert!(matches!(err, ChatError::MissingAttachment));

    let snapshot = controller.snapshot();
    assert!(snapshot.is_empty());
    assert!(snapshot.session_id.is_none());
    assert!(!snapshot.error.unwrap_or_default().is_empty());
    assert!(service.calls().is_empty());
}

/// Test that ids strictly increase and display order follows call order.
#[tokio::test(start_paused = true)]
async fn test_message_order_over_many_turns() {
    let service = ScriptedDocumentService::new()
        .with_answer("one")
        .fail_answer("rate limited")
        .with_answer("three")
        .with_answer("four");
    let controller = controller(&service);

    controller.submit("q1", pdf("doc.pdf")).await.unwrap();
    wait_until_idle(&controller).await;
    let _ = controller.submit("q2", None).await;
    controller.submit("q3", None).await.unwrap();
    wait_until_idle(&controller).await;
    controller.submit("q4", pdf("other.pdf")).await.unwrap();
    wait_until_idle(&controller).await;

    let snapshot = controller.snapshot();
    let ids: Vec<_> = snapshot.messages.iter().map(|m| m.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let texts: Vec<_> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["q1", "one", "q3", "three", "q4", "four"]);

    // The session is created once; later attachments do not re-upload.
    assert_eq!(service.upload_count(), 1);
    assert_eq!(snapshot.title.as_deref(), Some("doc.pdf"));
}

/// Test that cancelling mid-reveal keeps a strict prefix of the answer.
#[tokio::test(start_paused = true)]
async fn test_cancel_reveal_keeps_prefix() {
    let answer = "The contract ends in March.";
    let service = ScriptedDocumentService::new().with_answer(answer);
    let controller = controller(&service);

    let (_, assistant_id) = answered(controller.submit("when?", pdf("contract.pdf")).await.unwrap());
    wait_ticks(7).await;
    controller.cancel_reveal();
    assert!(!controller.is_revealing());

    let partial = controller.snapshot().message(assistant_id).unwrap().text.clone();
    assert_eq!(partial, "The con");

    wait_ticks(50).await;
    let after = controller.snapshot().message(assistant_id).unwrap().text.clone();
    assert_eq!(after, partial);
    assert!(answer.starts_with(&after) && after.len() < answer.len());

    controller.cancel_reveal();
    assert!(!controller.is_revealing());
}

/// Test that a new submit stops the reveal still running for the previous answer.
#[tokio::test(start_paused = true)]
async fn test_new_submit_cancels_running_reveal() {
    let service = ScriptedDocumentService::new()
        .with_answer("aaaaaaaaaaaaaaaaaaaa")
        .with_answer("bbb");
    let controller = controller(&service);

    let (_, first) = answered(controller.submit("q1", pdf("doc.pdf")).await.unwrap());
    wait_ticks(3).await;
    let (_, second) = answered(controller.submit("q2", None).await.unwrap());

    wait_ticks(30).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.message(first).unwrap().text, "aaa");
    assert_eq!(snapshot.message(second).unwrap().text, "bbb");
    assert!(!snapshot.revealing);
}

/// Test that a rejected follow-up still stops the running reveal.
#[tokio::test(start_paused = true)]
async fn test_rejected_submit_cancels_running_reveal() {
    let service = ScriptedDocumentService::new().with_answer("aaaaaaaaaaaaaaaaaaaa");
    let controller = controller(&service);

    let (_, first) = answered(controller.submit("q1", pdf("doc.pdf")).await.unwrap());
    wait_ticks(4).await;

    let err = assert_err!(controller.submit("q2", pdf("photo.png")).await);
    assert!(matches!(err, ChatError::UnsupportedAttachment { .. }));
    assert!(!controller.is_revealing());

    wait_ticks(30).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.message(first).unwrap().text, "aaaa");
    assert!(snapshot.error.is_some());
    assert_eq!(service.ask_count(), 1);
}

/// Test that a new chat during a reveal resets everything.
#[tokio::test(start_paused = true)]
async fn test_start_new_session_during_reveal() {
    let service = ScriptedDocumentService::new()
        .with_session("s-1")
        .with_answer("A long answer that is still being revealed.");
    let controller = controller(&service);

    controller.submit("explain", pdf("doc.pdf")).await.unwrap();
    wait_ticks(5).await;
    assert!(controller.is_revealing());

    controller.start_new_session();

    let snapshot = controller.snapshot();
    assert!(!snapshot.revealing);
    assert!(snapshot.is_empty());
    assert!(snapshot.session_id.is_none());
    assert!(snapshot.title.is_none());

    wait_ticks(10).await;
    assert!(controller.snapshot().is_empty());

    let err = assert_err!(controller.submit("and now?", None).await);
    assert!(matches!(err, ChatError::MissingAttachment));
    assert!(controller.snapshot().is_empty());
}

/// Test that a failed question only rolls back its own turn.
#[tokio::test(start_paused = true)]
async fn test_failed_chat_after_upload_keeps_session() {
    let service = ScriptedDocumentService::new()
        .with_session("s-7")
        .fail_answer("Session expired, please re-upload");
    let controller = controller(&service);

    let err = assert_err!(controller.submit("summarize", pdf("doc.pdf")).await);
    assert!(matches!(err, ChatError::ChatRequestFailed(_)));

    let snapshot = controller.snapshot();
    assert!(snapshot.is_empty());
    assert!(snapshot.title.is_none());
    assert_eq!(snapshot.session_id, Some(SessionId::new("s-7")));
    assert_eq!(snapshot.error.as_deref(), Some("Session expired, please re-upload"));
    assert!(!snapshot.awaiting_response);
}

/// Test rollback of a later turn leaves earlier turns alone.
#[tokio::test(start_paused = true)]
async fn test_failed_follow_up_rolls_back_only_that_turn() {
    let service = ScriptedDocumentService::new()
        .with_session("s-2")
        .with_answer("ok")
        .fail_answer("Failed to get an answer");
    let controller = controller(&service);

    controller.submit("first", pdf("doc.pdf")).await.unwrap();
    wait_until_idle(&controller).await;

    let err = assert_err!(controller.submit("second", None).await);
    assert!(err.is_request_failure());

    let snapshot = controller.snapshot();
    let texts: Vec<_> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "ok"]);
    assert_eq!(snapshot.title.as_deref(), Some("doc.pdf"));
    assert_eq!(snapshot.session_id, Some(SessionId::new("s-2")));
    assert!(!snapshot.error.unwrap().is_empty());

    // The next successful submit clears the error.
    let outcome = controller.submit("third", None).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
    assert!(controller.snapshot().error.is_none());
}

/// Test that an answer arriving after a new chat started is ignored.
#[tokio::test]
async fn test_stale_answer_is_discarded() {
    let gate = Arc::new(Notify::new());
    let service = ScriptedDocumentService::new()
        .with_answer("too late")
        .hold_answers(Arc::clone(&gate));
    let controller = Arc::new(controller(&service));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("summarize", pdf("doc.pdf")).await }
    });

    while service.ask_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(controller.snapshot().awaiting_response);

    controller.start_new_session();
    gate.notify_one();

    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome, SubmitOutcome::Discarded);

    let snapshot = controller.snapshot();
    assert!(snapshot.is_empty());
    assert!(snapshot.session_id.is_none());
    assert!(!snapshot.awaiting_response);
    assert!(!snapshot.revealing);
}

/// Test that a session issued for a discarded chat is not adopted.
#[tokio::test]
async fn test_stale_upload_is_discarded() {
    let gate = Arc::new(Notify::new());
    let service = ScriptedDocumentService::new()
        .with_session("s-old")
        .hold_uploads(Arc::clone(&gate));
    let controller = Arc::new(controller(&service));

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("summarize", pdf("doc.pdf")).await }
    });

    while service.upload_count() == 0 {
        tokio::task::yield_now().await;
    }
    controller.start_new_session();
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), SubmitOutcome::Discarded);
    assert!(controller.session_id().is_none());
    assert_eq!(service.ask_count(), 0);
}

/// Test that observers are notified as characters appear.
#[tokio::test(start_paused = true)]
async fn test_subscribers_see_each_character() {
    let service = ScriptedDocumentService::new().with_answer("abcd");
    let controller = controller(&service);
    let (_, assistant_id) = answered(controller.submit("go", pdf("doc.pdf")).await.unwrap());

    let mut changes = controller.subscribe();
    let mut seen = Vec::new();
    while controller.is_revealing() {
        changes.changed().await.unwrap();
        let text = controller.snapshot().message(assistant_id).unwrap().text.clone();
        if seen.last() != Some(&text) {
            seen.push(text);
        }
    }

    assert_eq!(seen, vec!["a", "ab", "abc", "abcd"]);
}

/// Test the configured accept filter.
#[tokio::test]
async fn test_attachment_policy_is_configurable() {
    let service = ScriptedDocumentService::new().with_answer("fine");
    let config = ChatConfig {
        attachments: docchat_session::AttachmentPolicy::documents(),
        ..ChatConfig::default()
    };
    let controller = ConversationController::new(config, Arc::new(service.clone()));

    let outcome = controller
        .submit("", Some(Attachment::new("notes.txt", b"plain".to_vec())))
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
    assert_eq!(service.upload_count(), 1);

    let err = assert_err!(
        controller
            .submit("and this", Some(Attachment::new("photo.png", Vec::new())))
            .await
    );
    assert!(matches!(err, ChatError::UnsupportedAttachment { .. }));
    assert_eq!(controller.snapshot().messages.len(), 2);
}
