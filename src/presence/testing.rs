//! Scriptable in-memory bridge used by unit tests

use std::sync::{Arc, Mutex};

use super::activity::WireActivity;
use super::traits::{Bridge, BridgeConnector, BridgeError, BridgeEvents, Transport};

/// What a fake bridge does when `login` is called
#[derive(Debug, Clone)]
pub enum LoginBehavior {
    /// Emit ready before login returns
    Ready,
    /// Fail the login with the given message
    Fail(String),
    /// Never emit anything; tests drive events by hand
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create,
    Login(String),
    SetActivity(WireActivity),
    ClearActivity,
    Destroy,
}

struct FakeInner {
    behavior: LoginBehavior,
    calls: Vec<Call>,
    events: Vec<BridgeEvents>,
    fail_activity: Option<String>,
    fail_destroy: bool,
    hang_activity: bool,
    ready_on_create: bool,
}

#[derive(Clone)]
pub struct FakeConnector {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeConnector {
    pub fn new(behavior: LoginBehavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeInner {
                behavior,
                calls: Vec::new(),
                events: Vec::new(),
                fail_activity: None,
                fail_destroy: false,
                hang_activity: false,
                ready_on_create: false,
            })),
        }
    }

    pub fn set_behavior(&self, behavior: LoginBehavior) {
        self.inner.lock().unwrap().behavior = behavior;
    }

    pub fn fail_activity(&self, message: Option<&str>) {
        self.inner.lock().unwrap().fail_activity = message.map(str::to_string);
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.inner.lock().unwrap().fail_destroy = fail;
    }

    /// Make `set_activity` record the call and then never return
    pub fn hang_activity(&self, hang: bool) {
        self.inner.lock().unwrap().hang_activity = hang;
    }

    pub fn ready_on_create(&self, ready: bool) {
        self.inner.lock().unwrap().ready_on_create = ready;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matcher(c)).count()
    }

    pub fn activities(&self) -> Vec<WireActivity> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetActivity(activity) => Some(activity),
                _ => None,
            })
            .collect()
    }

    /// Event sender of the nth created client
    pub fn events(&self, index: usize) -> BridgeEvents {
        self.inner.lock().unwrap().events[index].clone()
    }

    /// Event sender of the most recently created client
    pub fn latest_events(&self) -> BridgeEvents {
        let inner = self.inner.lock().unwrap();
        inner.events.last().cloned().expect("no client created")
    }
}

impl BridgeConnector for FakeConnector {
    fn name(&self) -> &'static str {
        "Fake"
    }

    fn create(
        &self,
        _transport: Transport,
        events: BridgeEvents,
    ) -> Result<Arc<dyn Bridge>, BridgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Create);
        inner.events.push(events.clone());
        if inner.ready_on_create {
            events.ready();
        }
        Ok(Arc::new(FakeBridge {
            connector: self.inner.clone(),
            events,
        }))
    }
}

struct FakeBridge {
    connector: Arc<Mutex<FakeInner>>,
    events: BridgeEvents,
}

#[async_trait::async_trait]
impl Bridge for FakeBridge {
    async fn login(&self, identifier: &str) -> Result<(), BridgeError> {
        let behavior = {
            let mut inner = self.connector.lock().unwrap();
            inner.calls.push(Call::Login(identifier.to_string()));
            inner.behavior.clone()
        };
        match behavior {
            LoginBehavior::Ready => {
                self.events.ready();
                Ok(())
            }
            LoginBehavior::Fail(message) => Err(BridgeError::Client(message)),
            LoginBehavior::Silent => Ok(()),
        }
    }

    async fn set_activity(&self, activity: WireActivity) -> Result<(), BridgeError> {
        let result = {
            let mut inner = self.connector.lock().unwrap();
            inner.calls.push(Call::SetActivity(activity));
            if inner.hang_activity {
                None
            } else {
                Some(match &inner.fail_activity {
                    Some(message) => Err(BridgeError::Client(message.clone())),
                    None => Ok(()),
                })
            }
        };
        match result {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn clear_activity(&self) -> Result<(), BridgeError> {
        let mut inner = self.connector.lock().unwrap();
        inner.calls.push(Call::ClearActivity);
        match &inner.fail_activity {
            Some(message) => Err(BridgeError::Client(message.clone())),
            None => Ok(()),
        }
    }

    fn destroy(&self) -> Result<(), BridgeError> {
        let mut inner = self.connector.lock().unwrap();
        inner.calls.push(Call::Destroy);
        if inner.fail_destroy {
            Err(BridgeError::Client("destroy failed".to_string()))
        } else {
            Ok(())
        }
    }
}
