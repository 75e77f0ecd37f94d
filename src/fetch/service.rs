use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::builder::Options;
use crate::cache::FlagCache;
use crate::errors::{ClientError, ErrorKind};
use crate::events::{Event, EventEmitter, Observer};
use crate::fetch::channel::{Channel, ChannelEvent};
use crate::fetch::fetcher::Fetcher;
use crate::model::enums::ChannelState;
use crate::model::flag::record_from_json;
use crate::utils::updates_url;

struct Session {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct ChannelSlot {
    state: ChannelState,
    session: Option<Session>,
}

struct ServiceState {
    fetcher: Fetcher,
    cache: FlagCache,
    events: EventEmitter,
    validated: AtomicBool,
    next_session: AtomicU64,
    slot: Mutex<ChannelSlot>,
}

impl ServiceState {
    fn slot(&self) -> MutexGuard<'_, ChannelSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the channel slot only while `session_id` is still the active session.
    fn with_session<R>(&self, session_id: u64, f: impl FnOnce(&mut ChannelSlot) -> R) -> Option<R> {
        let mut slot = self.slot();
        let active = slot
            .session
            .as_ref()
            .is_some_and(|session| session.id == session_id);
        if active {
            Some(f(&mut slot))
        } else {
            None
        }
    }
}

/// Owns the flag cache and drives the HTTP requests and the live update channel.
pub struct FlagService {
    state: Arc<ServiceState>,
    options: Arc<Options>,
}

impl FlagService {
    pub fn new(options: Arc<Options>, observers: Vec<Observer>) -> Result<Self, ClientError> {
        let fetcher = Fetcher::new(
            options.base_url().clone(),
            options.api_key(),
            *options.http_timeout(),
        )?;
        Ok(Self {
            state: Arc::new(ServiceState {
                fetcher,
                cache: FlagCache::new(),
                events: EventEmitter::new(observers),
                validated: AtomicBool::new(false),
                next_session: AtomicU64::new(0),
                slot: Mutex::new(ChannelSlot::default()),
            }),
            options,
        })
    }

    pub async fn validate(&self) -> Result<(), ClientError> {
        let project_id = self.options.project_id();
        let toggle_id = self.options.toggle_id();
        if self.state.fetcher.validate(project_id, toggle_id).await? {
            self.state.validated.store(true, Ordering::SeqCst);
            return Ok(());
        }
        self.state.validated.store(false, Ordering::SeqCst);
        let err = ClientError::new(
            ErrorKind::Validation,
            format!("The API key was rejected for project '{project_id}' and toggle '{toggle_id}'."),
        );
        warn!(event_id = err.kind.as_u16(); "{}", err);
        Err(err)
    }

    pub async fn initialize(&self) -> Result<(), ClientError> {
        if !self.is_validated() {
            self.validate().await?;
        }
        let records = self
            .state
            .fetcher
            .fetch_flags(self.options.project_id())
            .await?;
        self.state.cache.upsert_all(&records);
        self.state
            .events
            .emit(Event::Initialized(self.state.cache.snapshot()));
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.state.validated.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &FlagCache {
        &self.state.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.state.events.subscribe()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.state.slot().state
    }

    pub fn listen(&self) -> Result<(), ClientError> {
        if !self.is_validated() {
            let err = ClientError::new(
                ErrorKind::Unauthorized,
                "Live updates can't be requested before the API key is validated. Call `validate()` or `initialize()` first.".to_owned(),
            );
            warn!(event_id = err.kind.as_u16(); "{}", err);
            return Err(err);
        }
        let url = updates_url(self.options.updates_base_url(), self.options.project_id())?;

        let id = self.state.next_session.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        {
            let mut slot = self.state.slot();
            if let Some(previous) = slot.session.replace(Session {
                id,
                token: token.clone(),
            }) {
                debug!("Replacing the running live update session");
                previous.token.cancel();
            }
            slot.state = ChannelState::Connecting;
        }

        info!("Listening for live updates on {url}");
        tokio::spawn(supervise(
            Arc::clone(&self.state),
            Arc::clone(&self.options),
            url,
            id,
            token,
        ));
        Ok(())
    }

    pub fn disconnect(&self) {
        if let Some(state) = self.close_session() {
            if matches!(state, ChannelState::Connecting | ChannelState::Connected) {
                info!("Live update channel disconnected");
                self.state.events.emit(Event::Disconnected);
            }
        }
    }

    /// Cancels the active session, returning the channel state it had.
    fn close_session(&self) -> Option<ChannelState> {
        let mut slot = self.state.slot();
        let session = slot.session.take()?;
        session.token.cancel();
        let previous = slot.state;
        slot.state = ChannelState::Closed;
        Some(previous)
    }
}

impl Drop for FlagService {
    fn drop(&mut self) {
        self.close_session();
    }
}

/// Keeps one live update session alive: opens channels, applies their messages
/// and reconnects according to the [`crate::ReconnectPolicy`] until cancelled.
async fn supervise(
    state: Arc<ServiceState>,
    options: Arc<Options>,
    url: Url,
    session_id: u64,
    token: CancellationToken,
) {
    let mut attempt = 0u32;
    loop {
        let mut channel = Channel::open(&url, options.api_key(), *options.http_timeout());
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                event = channel.recv() => event,
            };
            match event {
                Some(ChannelEvent::Opened) => {
                    attempt = 0;
                    state.with_session(session_id, |slot| slot.state = ChannelState::Connected);
                }
                Some(ChannelEvent::Message(payload)) => apply_update(&state, payload.as_str()),
                Some(ChannelEvent::Error(err)) => {
                    let err = ClientError::new(ErrorKind::Channel, err.to_string());
                    warn!(event_id = err.kind.as_u16(); "{}", err);
                    state.events.emit(Event::Error(err));
                }
                Some(ChannelEvent::Closed) | None => break,
            }
        }
        drop(channel);

        let delay = options.reconnect_policy().delay_for(attempt);
        let still_active = state.with_session(session_id, |slot| {
            slot.state = ChannelState::Closed;
            if delay.is_none() {
                slot.session = None;
            }
        });
        if still_active.is_none() {
            return;
        }
        info!("Live update channel disconnected");
        state.events.emit(Event::Disconnected);

        let Some(delay) = delay else {
            debug!("Reconnect is disabled or exhausted, the live update channel stays closed");
            return;
        };
        attempt = attempt.saturating_add(1);
        warn!(event_id = ErrorKind::Channel.as_u16(); "Reconnecting the live update channel in {}ms (attempt {attempt})", delay.as_millis());
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if state
            .with_session(session_id, |slot| slot.state = ChannelState::Connecting)
            .is_none()
        {
            return;
        }
    }
}

fn apply_update(state: &ServiceState, payload: &str) {
    match record_from_json(payload) {
        Ok(record) => {
            debug!("Live update received: '{}' = {}", record.name, record.state);
            state.cache.upsert(record.name.as_str(), record.state);
            state.events.emit(Event::FlagUpdated {
                name: record.name,
                state: record.state,
            });
        }
        Err(err) => {
            warn!(event_id = ErrorKind::Protocol.as_u16(); "Dropping malformed live update message. {err}")
        }
    }
}
