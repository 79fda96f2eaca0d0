//! Shared fakes for lifecycle tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::notify::{Notify, NotifyError};
use crate::types::{ChatId, PrincipalId};
use crate::worker::{
    Dispatch, DispatchOutcome, Session, SessionError, SessionFactory, Update,
};

/// How a scripted session's `initialize` behaves.
#[derive(Debug, Clone)]
pub enum InitBehavior {
    Succeed,
    Fail(String),
    /// Never completes; only cancellation ends it.
    Hang,
}

/// Builds a text update from `caller` in their private chat.
pub fn update(update_id: i64, caller: i64, text: &str) -> Update {
    Update {
        update_id,
        caller: PrincipalId(caller),
        chat: ChatId(caller),
        text: text.to_string(),
    }
}

/// Counters and call log shared by every session a factory creates.
#[derive(Debug, Default)]
pub struct SessionLog {
    calls: Mutex<Vec<String>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl SessionLog {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Every call made on any session, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Sessions initialized and not yet shut down.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// The most sessions that were ever live at once.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    fn went_live(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
    }

    fn went_dead(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A session fed from a channel, recording every call.
pub struct ScriptedSession {
    log: Arc<SessionLog>,
    init: InitBehavior,
    input: mpsc::UnboundedReceiver<Result<Update, SessionError>>,
    teardown_delay: Option<Duration>,
    initialized: bool,
}

impl ScriptedSession {
    pub fn new(
        log: Arc<SessionLog>,
        init: InitBehavior,
        input: mpsc::UnboundedReceiver<Result<Update, SessionError>>,
    ) -> Self {
        ScriptedSession {
            log,
            init,
            input,
            teardown_delay: None,
            initialized: false,
        }
    }

    /// Makes `shutdown` take `delay`, ignoring cancellation.
    pub fn with_teardown_delay(mut self, delay: Option<Duration>) -> Self {
        self.teardown_delay = delay;
        self
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn initialize(&mut self) -> Result<(), SessionError> {
        self.log.record("initialize");
        match &self.init {
            InitBehavior::Succeed => {
                self.initialized = true;
                self.log.went_live();
                Ok(())
            }
            InitBehavior::Fail(reason) => Err(SessionError::Init(reason.clone())),
            InitBehavior::Hang => std::future::pending().await,
        }
    }

    async fn next_update(&mut self) -> Result<Option<Update>, SessionError> {
        match self.input.recv().await {
            Some(Ok(update)) => Ok(Some(update)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn send(&mut self, chat: ChatId, text: &str) -> Result<(), SessionError> {
        self.log.record(format!("send:{}:{}", chat, text));
        Ok(())
    }

    async fn stop_intake(&mut self) -> Result<(), SessionError> {
        self.log.record("stop_intake");
        self.input.close();
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SessionError> {
        self.log.record("flush");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), SessionError> {
        if let Some(delay) = self.teardown_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.record("shutdown");
        if self.initialized {
            self.initialized = false;
            self.log.went_dead();
        }
        Ok(())
    }
}

/// Creates [`ScriptedSession`]s and keeps a sender to the newest one.
#[derive(Default)]
pub struct ScriptedFactory {
    log: Arc<SessionLog>,
    created: AtomicUsize,
    init_script: Mutex<VecDeque<InitBehavior>>,
    teardown_delay: Mutex<Option<Duration>>,
    current: Mutex<Option<mpsc::UnboundedSender<Result<Update, SessionError>>>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Arc<SessionLog> {
        Arc::clone(&self.log)
    }

    /// Number of sessions created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Queues init behaviors for the next sessions; later ones succeed.
    pub fn script_init(&self, behaviors: impl IntoIterator<Item = InitBehavior>) {
        self.init_script.lock().unwrap().extend(behaviors);
    }

    /// Makes every subsequently created session slow to shut down.
    pub fn set_teardown_delay(&self, delay: Duration) {
        *self.teardown_delay.lock().unwrap() = Some(delay);
    }

    /// Feeds an update to the newest session. Returns false if it is gone.
    pub fn push(&self, update: Update) -> bool {
        self.push_result(Ok(update))
    }

    /// Feeds a failure to the newest session's `next_update`.
    pub fn push_error(&self, error: SessionError) -> bool {
        self.push_result(Err(error))
    }

    /// Closes the newest session's intake.
    pub fn close_intake(&self) {
        self.current.lock().unwrap().take();
    }

    fn push_result(&self, item: Result<Update, SessionError>) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }
}

impl SessionFactory for ScriptedFactory {
    fn create(&self) -> Box<dyn Session> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let init = self
            .init_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(InitBehavior::Succeed);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current.lock().unwrap() = Some(tx);
        let delay = *self.teardown_delay.lock().unwrap();
        Box::new(ScriptedSession::new(self.log(), init, rx).with_teardown_delay(delay))
    }
}

/// Echoes text; `stop` requests a worker stop and `panic` panics.
#[derive(Debug, Default)]
pub struct EchoDispatch;

#[async_trait]
impl Dispatch for EchoDispatch {
    async fn dispatch(&self, update: &Update) -> DispatchOutcome {
        match update.text.as_str() {
            "stop" => DispatchOutcome::reply(update.chat, "stopping").and_stop(),
            "panic" => panic!("handler exploded"),
            text => DispatchOutcome::reply(update.chat, text),
        }
    }
}

/// A [`Notify`] sink that remembers every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
