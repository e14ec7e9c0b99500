//! Scripted platform doubles for exercising the core without a wire client.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{GroupRef, UserId},
    platform::{GroupHandle, Member, PlatformConnection, PlatformConnector, PlatformError, PlatformResult},
};

type SendHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct MockState {
    connected: AtomicBool,
    disconnected: AtomicBool,
    authorized: AtomicBool,
    session: Mutex<String>,

    request_code_results: Mutex<VecDeque<PlatformResult<()>>>,
    code_requests: AtomicUsize,
    sign_in_results: Mutex<VecDeque<PlatformResult<()>>>,
    password_results: Mutex<VecDeque<PlatformResult<()>>>,

    join_results: Mutex<VecDeque<PlatformResult<()>>>,
    pages: Mutex<VecDeque<PlatformResult<Vec<Member>>>>,
    participant_offsets: Mutex<Vec<usize>>,

    send_failures: Mutex<HashMap<i64, VecDeque<PlatformError>>>,
    sent: Mutex<Vec<(i64, String)>>,
    send_attempts: AtomicUsize,
    send_hook: Mutex<Option<SendHook>>,
}

/// One scripted connection. Unscripted operations succeed; scripted queues
/// are consumed in call order.
#[derive(Clone)]
pub struct MockConnection(Arc<MockState>);

impl MockConnection {
    pub fn new() -> Self {
        let state = MockState {
            session: Mutex::new("session".to_string()),
            ..MockState::default()
        };
        state.connected.store(true, Ordering::SeqCst);
        Self(Arc::new(state))
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.0.authorized.store(authorized, Ordering::SeqCst);
    }

    pub fn set_session(&self, session: &str) {
        *self.0.session.lock().unwrap() = session.to_string();
    }

    pub fn push_request_code(&self, result: PlatformResult<()>) {
        self.0.request_code_results.lock().unwrap().push_back(result);
    }

    pub fn push_sign_in(&self, result: PlatformResult<()>) {
        self.0.sign_in_results.lock().unwrap().push_back(result);
    }

    pub fn push_password(&self, result: PlatformResult<()>) {
        self.0.password_results.lock().unwrap().push_back(result);
    }

    pub fn push_join(&self, result: PlatformResult<()>) {
        self.0.join_results.lock().unwrap().push_back(result);
    }

    pub fn push_page(&self, result: PlatformResult<Vec<Member>>) {
        self.0.pages.lock().unwrap().push_back(result);
    }

    /// Script failures for one recipient; once drained, sends succeed.
    pub fn push_send_failure(&self, recipient: i64, error: PlatformError) {
        self.0
            .send_failures
            .lock()
            .unwrap()
            .entry(recipient)
            .or_default()
            .push_back(error);
    }

    /// Called with the running count of *successful* sends; used to trip a
    /// cancellation token partway through a drain.
    pub fn set_send_hook(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.0.send_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn code_requests(&self) -> usize {
        self.0.code_requests.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> bool {
        self.0.disconnected.load(Ordering::SeqCst)
    }

    pub fn participant_offsets(&self) -> Vec<usize> {
        self.0.participant_offsets.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.0.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.0.send_attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformConnection for MockConnection {
    fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }

    async fn is_authorized(&self) -> PlatformResult<bool> {
        Ok(self.0.authorized.load(Ordering::SeqCst))
    }

    async fn request_code(&self, _phone: &str) -> PlatformResult<()> {
        self.0.code_requests.fetch_add(1, Ordering::SeqCst);
        self.0
            .request_code_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn sign_in_with_code(&self, _phone: &str, _code: &str) -> PlatformResult<()> {
        let result = self
            .0
            .sign_in_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.0.authorized.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn sign_in_with_password(&self, _password: &str) -> PlatformResult<()> {
        let result = self
            .0
            .password_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.0.authorized.store(true, Ordering::SeqCst);
        }
        result
    }

    fn export_session(&self) -> String {
        self.0.session.lock().unwrap().clone()
    }

    async fn disconnect(&self) {
        self.0.connected.store(false, Ordering::SeqCst);
        self.0.disconnected.store(true, Ordering::SeqCst);
    }

    async fn resolve_group(&self, group: &GroupRef) -> PlatformResult<GroupHandle> {
        Ok(GroupHandle {
            id: 1,
            title: Some(group.0.clone()),
        })
    }

    async fn join_group(&self, _group: &GroupHandle) -> PlatformResult<()> {
        self.0.join_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn participants(
        &self,
        _group: &GroupHandle,
        offset: usize,
        _limit: usize,
    ) -> PlatformResult<Vec<Member>> {
        self.0.participant_offsets.lock().unwrap().push(offset);
        self.0.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn send_message(&self, recipient: UserId, text: &str) -> PlatformResult<()> {
        self.0.send_attempts.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .0
            .send_failures
            .lock()
            .unwrap()
            .get_mut(&recipient.0)
            .and_then(|q| q.pop_front());
        if let Some(error) = failure {
            return Err(error);
        }

        let count = {
            let mut sent = self.0.sent.lock().unwrap();
            sent.push((recipient.0, text.to_string()));
            sent.len()
        };
        if let Some(hook) = self.0.send_hook.lock().unwrap().as_ref() {
            hook(count);
        }
        Ok(())
    }
}

/// Scripted connector: hands out queued connections (or errors) in order.
/// With nothing queued it hands out a fresh default connection.
#[derive(Default)]
pub struct MockConnector {
    queue: Mutex<VecDeque<PlatformResult<MockConnection>>>,
    connect_args: Mutex<Vec<Option<String>>>,
}

impl MockConnector {
    pub fn push_ok(&self, conn: MockConnection) {
        self.queue.lock().unwrap().push_back(Ok(conn));
    }

    pub fn push_err(&self, error: PlatformError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// The `session` argument of each `connect` call, in order.
    pub fn connect_args(&self) -> Vec<Option<String>> {
        self.connect_args.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformConnector for MockConnector {
    async fn connect(&self, session: Option<&str>) -> PlatformResult<Box<dyn PlatformConnection>> {
        self.connect_args
            .lock()
            .unwrap()
            .push(session.map(|s| s.to_string()));
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(Ok(conn)) => Ok(Box::new(conn)),
            Some(Err(e)) => Err(e),
            None => Ok(Box::new(MockConnection::new())),
        }
    }
}

/// A member with no recorded presence.
pub fn member(id: i64) -> Member {
    Member {
        id,
        username: Some(format!("user{id}")),
        first_name: Some(format!("User{id}")),
        last_name: None,
        bot: false,
        verified: false,
        last_seen: None,
    }
}

/// A member last seen at `last_seen` unix seconds.
pub fn active_member(id: i64, last_seen: i64) -> Member {
    Member {
        last_seen: Some(last_seen),
        ..member(id)
    }
}
