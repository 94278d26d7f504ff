use async_trait::async_trait;
use settle_cloud::{Observation, PollError, PollErrorKind, PollResult, Poller};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// One scripted poll outcome
#[derive(Debug, Clone)]
pub enum Step {
    State(&'static str),
    Unlabelled,
    Absent,
    Error(PollErrorKind),
}

/// Poller that replays a fixed script and repeats the last step forever
pub struct ScriptedPoller {
    steps: Vec<Step>,
    calls: AtomicU32,
    latency: Duration,
    on_poll: Mutex<Option<Box<dyn FnMut(u32) + Send>>>,
}

impl ScriptedPoller {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty());
        Self {
            steps,
            calls: AtomicU32::new(0),
            latency: Duration::ZERO,
            on_poll: Mutex::new(None),
        }
    }

    pub fn states(states: &[&'static str]) -> Self {
        Self::new(states.iter().map(|s| Step::State(*s)).collect())
    }

    /// Simulate a slow remote read
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Run `hook` with the 1-based call number after each poll returns
    pub fn on_poll(self, hook: impl FnMut(u32) + Send + 'static) -> Self {
        *self.on_poll.lock().unwrap() = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Poller for ScriptedPoller {
    type Object = String;

    async fn poll(&self) -> PollResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let index = (call as usize - 1).min(self.steps.len() - 1);
        let result = match &self.steps[index] {
            Step::State(state) => Ok(Observation::present(format!("object#{}", call), *state)),
            Step::Unlabelled => Ok(Observation::unlabelled(format!("object#{}", call))),
            Step::Absent => Ok(Observation::absent()),
            Step::Error(kind) => Err(PollError::new(*kind, format!("scripted error #{}", call))),
        };

        if let Some(hook) = self.on_poll.lock().unwrap().as_mut() {
            hook(call);
        }
        result
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
