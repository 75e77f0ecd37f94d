use crate::builder::{ClientBuilder, Options};
use crate::errors::{ClientError, ErrorKind};
use crate::events::{Event, Observer};
use crate::fetch::service::FlagService;
use crate::model::enums::ChannelState;
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The main component for reading feature flags and keeping them up to date.
///
/// # Examples
///
/// ```no_run
/// use flagsync::Client;
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::new("https://flags.example.com", "API_KEY", "PROJECT_ID", "TOGGLE_ID").unwrap();
///
///     client.initialize().await.unwrap();
///     client.listen_for_updates().unwrap();
///
///     let is_flag_enabled = client.get_flag("flag-key").unwrap();
/// }
/// ```
pub struct Client {
    service: FlagService,
}

impl Client {
    pub(crate) fn with_options(
        options: Options,
        observers: Vec<Observer>,
    ) -> Result<Self, ClientError> {
        let service = FlagService::new(Arc::new(options), observers)?;
        Ok(Self { service })
    }

    /// Creates a new [`ClientBuilder`] used to build a [`Client`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagsync::Client;
    ///
    /// let client = Client::builder()
    ///     .base_url("https://flags.example.com")
    ///     .api_key("API_KEY")
    ///     .project_id("PROJECT_ID")
    ///     .toggle_id("TOGGLE_ID")
    ///     .reconnect(false)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a new [`Client`] with default options.
    ///
    /// # Errors
    ///
    /// This method fails with [`ErrorKind::Configuration`] if any of the parameters is empty
    /// or the base URL is not a valid `http` or `https` URL.
    pub fn new(
        base_url: &str,
        api_key: &str,
        project_id: &str,
        toggle_id: &str,
    ) -> Result<Self, ClientError> {
        ClientBuilder::new()
            .base_url(base_url)
            .api_key(api_key)
            .project_id(project_id)
            .toggle_id(toggle_id)
            .build()
    }

    /// Validates the API key for the configured project and toggle.
    ///
    /// Calling it again repeats the request. The flag cache is never touched.
    ///
    /// # Errors
    ///
    /// This method fails with [`ErrorKind::Validation`] if the server rejects the API key,
    /// or if the request fails or times out.
    pub async fn validate(&self) -> Result<(), ClientError> {
        self.service.validate().await
    }

    /// Downloads every feature flag of the project into the local cache, validating the
    /// API key first if that hasn't happened yet. Emits [`Event::Initialized`] on success.
    ///
    /// Repeated calls merge the downloaded flags into the cache.
    ///
    /// # Errors
    ///
    /// This method fails in the following cases:
    /// - The validation fails ([`ErrorKind::Validation`]).
    /// - The response is not a list of flags ([`ErrorKind::Protocol`]).
    /// - The request fails or times out ([`ErrorKind::Initialization`]).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagsync::Client;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://flags.example.com", "API_KEY", "PROJECT_ID", "TOGGLE_ID").unwrap();
    ///
    ///     client.initialize().await.unwrap();
    /// }
    /// ```
    pub async fn initialize(&self) -> Result<(), ClientError> {
        self.service.initialize().await
    }

    /// Returns the cached state of the feature flag identified by `name`.
    ///
    /// # Errors
    ///
    /// This method fails with [`ErrorKind::NotFound`] if the flag is not in the cache.
    pub fn get_flag(&self, name: &str) -> Result<bool, ClientError> {
        self.service.cache().get(name).ok_or_else(|| {
            ClientError::new(
                ErrorKind::NotFound,
                format!("Feature flag '{name}' was not found in the local cache."),
            )
        })
    }

    /// Returns the cached state of the feature flag identified by `name`, or `default` if
    /// the flag is not in the cache.
    pub fn get_flag_or(&self, name: &str, default: bool) -> bool {
        match self.get_flag(name) {
            Ok(state) => state,
            Err(err) => {
                warn!(event_id = err.kind.as_u16(); "{} Returning the default value: '{default}'.", err);
                default
            }
        }
    }

    /// Returns a copy of every cached feature flag state.
    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.service.cache().snapshot()
    }

    /// Returns the time of the last change made to the flag cache.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.service.cache().last_updated()
    }

    /// Returns `true` after a successful validation.
    pub fn is_validated(&self) -> bool {
        self.service.is_validated()
    }

    /// Opens the live update channel and returns immediately.
    ///
    /// Incoming updates are applied to the cache and reported as [`Event::FlagUpdated`].
    /// When the channel closes, [`Event::Disconnected`] is emitted and a new connection is
    /// attempted according to the configured [`crate::ReconnectPolicy`].
    /// Calling it while a channel is already running replaces that channel.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// This method fails with [`ErrorKind::Unauthorized`] if the API key was not validated yet.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagsync::{Client, Event};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://flags.example.com", "API_KEY", "PROJECT_ID", "TOGGLE_ID").unwrap();
    ///     let mut events = client.subscribe();
    ///
    ///     client.initialize().await.unwrap();
    ///     client.listen_for_updates().unwrap();
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::FlagUpdated { name, state } = event {
    ///             println!("{name} is now {state}");
    ///         }
    ///     }
    /// }
    /// ```
    pub fn listen_for_updates(&self) -> Result<(), ClientError> {
        self.service.listen()
    }

    /// Closes the live update channel and cancels any pending reconnect.
    ///
    /// Emits [`Event::Disconnected`] if the channel was open or connecting.
    /// Does nothing when there is no channel.
    pub fn disconnect(&self) {
        self.service.disconnect();
    }

    /// Returns the current state of the live update channel.
    pub fn channel_state(&self) -> ChannelState {
        self.service.channel_state()
    }

    /// Returns a receiver of every [`Event`] emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.service.subscribe()
    }
}
