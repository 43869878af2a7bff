//! End-to-end dispatch through the runtime with the test doubles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use botty::prelude::*;
use botty::runtime::RunStats;
use botty_framework::testing::{ClientCall, MemoryDatabase, MemorySession, RecordingClient};
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// Fixtures
// =============================================================================

struct Greeting(String);

async fn greeting(update: Arc<Update>) -> Result<Greeting, BoxError> {
    let name = update
        .effective_user_id()
        .map(|id| format!("user {id}"))
        .unwrap_or_else(|| "stranger".to_string());
    Ok(Greeting(format!("Hello, {name}!")))
}

async fn start(_: Arc<Update>, _: Arc<Context>, greeting: Inject<Greeting>, out: Answers) {
    out.send(Answer::text(greeting.0.0.clone()).key("welcome")).await;
    out.send("Type /help for commands").await;
}

async fn rename(_: Arc<Update>, _: Arc<Context>) -> Answer {
    Answer::edit("Welcome back!").key("welcome")
}

struct Unbound;

async fn needs_unbound(_: Arc<Update>, _: Arc<Context>, _: Inject<Unbound>, out: Answers) {
    out.send("unreachable").await;
}

async fn broken(_: Arc<Update>, _: Arc<Context>) -> Result<Answer, BoxError> {
    Err("storage offline".into())
}

struct Notes {
    session: Arc<dyn Session>,
}

impl Repository for Notes {
    fn from_session(session: Arc<dyn Session>) -> Self {
        Self { session }
    }
}

impl Notes {
    fn add(&self, note: &str) {
        if let Some(session) = self.session.as_any().downcast_ref::<MemorySession>() {
            session.insert(note);
        }
    }
}

async fn note(update: Arc<Update>, _: Arc<Context>, notes: Repo<Notes>) -> Answer {
    notes.add(update.text().unwrap_or_default());
    Answer::text("Saved")
}

fn container() -> DependencyContainer {
    DependencyContainer::builder()
        .provide(Depends::new(greeting))
        .build()
}

fn app(client: Arc<RecordingClient>) -> AppBuilder {
    AppBuilder::from_config(BottyConfig::default())
        .client(client)
        .container(container())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_answers_are_sent_in_order() {
    let client = Arc::new(RecordingClient::new());
    let app = assert_ok!(app(client.clone()).route(on_command("start").handler(start)).build());

    assert!(assert_ok!(
        app.router()
            .handle(Update::text_message(1, 42, 1, "/start"))
            .await
    ));

    assert_eq!(
        client.texts(),
        vec!["Hello, stranger!", "Type /help for commands"]
    );
    let record = app.app().registry().get_by_key(42, "welcome");
    assert_eq!(record.map(|r| r.message_id), Some(1000));
}

#[tokio::test]
async fn test_keyed_edit_targets_earlier_message() {
    let client = Arc::new(RecordingClient::new());
    let app = assert_ok!(
        app(client.clone())
            .route(on_command("start").handler(start))
            .route(on_command("rename").handler(rename))
            .build()
    );

    assert_ok!(app.router().handle(Update::text_message(1, 42, 1, "/start")).await);
    assert_ok!(app.router().handle(Update::text_message(2, 42, 2, "/rename")).await);

    let calls = client.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(client.edit_count(), 1);
    match &calls[2] {
        ClientCall::Edit {
            chat_id,
            message_id,
            answer,
        } => {
            assert_eq!(*chat_id, 42);
            assert_eq!(*message_id, 1000);
            assert_eq!(
                answer.payload().and_then(|p| p.text()),
                Some("Welcome back!")
            );
        }
        other => panic!("expected an edit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_binding_fails_before_any_send() {
    let client = Arc::new(RecordingClient::new());
    let app = assert_ok!(app(client.clone()).route(on_any().handler(needs_unbound)).build());

    let err = assert_err!(app.router().handle(Update::text_message(1, 42, 1, "hi")).await);
    assert!(err.to_string().contains("Unbound"), "{err}");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_handler_error_is_returned() {
    let client = Arc::new(RecordingClient::new());
    let app = assert_ok!(app(client.clone()).route(on_any().handler(broken)).build());

    let err = assert_err!(app.router().handle(Update::text_message(1, 42, 1, "hi")).await);
    assert!(err.to_string().contains("storage offline"), "{err}");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_repository_session_is_committed_and_closed() {
    let client = Arc::new(RecordingClient::new());
    let db = Arc::new(MemoryDatabase::new());
    let app = assert_ok!(
        app(client.clone())
            .database(db.clone())
            .route(on_message().handler(note))
            .build()
    );

    let updates = futures::stream::iter(vec![
        Update::text_message(1, 42, 1, "buy milk"),
        Update::text_message(2, 43, 2, "call mom"),
    ]);
    let stats = assert_ok!(app.run(updates).await);

    assert_eq!(stats.handled, 2);
    assert_eq!(db.opened(), 2);
    assert_eq!(db.commits(), 2);
    assert_eq!(db.closes(), 2);
    assert_eq!(client.texts(), vec!["Saved", "Saved"]);
}

#[tokio::test]
async fn test_failed_update_does_not_stop_the_stream() {
    let client = Arc::new(RecordingClient::new());
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let app = assert_ok!(
        app(client.clone())
            .route(on_command("fail").handler(broken))
            .route(on_any().handler(
                move |_: Arc<Update>, _: Arc<Context>, out: Answers| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        out.send("ok").await;
                    }
                }
            ))
            .build()
    );

    let updates = futures::stream::iter(vec![
        Update::text_message(1, 42, 1, "/fail"),
        Update::text_message(2, 42, 2, "hello"),
    ]);
    let stats = assert_ok!(app.run(updates).await);

    assert_eq!(
        stats,
        RunStats {
            received: 2,
            handled: 1,
            unmatched: 0,
            failed: 1,
            aborted: 0,
        }
    );
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(client.texts(), vec!["ok"]);
}
