use crate::constants::DEFAULT_HTTP_TIMEOUT;
use crate::errors::{ClientError, ErrorKind};
use crate::events::{Event, Observer};
use crate::modes::ReconnectPolicy;
use crate::utils::parse_url;
use crate::Client;
use std::time::Duration;
use url::Url;

const HTTP_SCHEMES: &[&str] = &["http", "https"];
const UPDATES_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

pub struct Options {
    base_url: Url,
    updates_url: Option<Url>,
    api_key: String,
    project_id: String,
    toggle_id: String,
    http_timeout: Duration,
    reconnect_policy: ReconnectPolicy,
}

impl Options {
    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn updates_base_url(&self) -> &Url {
        self.updates_url.as_ref().unwrap_or(&self.base_url)
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn project_id(&self) -> &str {
        &self.project_id
    }

    pub(crate) fn toggle_id(&self) -> &str {
        &self.toggle_id
    }

    pub(crate) fn http_timeout(&self) -> &Duration {
        &self.http_timeout
    }

    pub(crate) fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect_policy
    }
}

/// Builder to create a [`Client`].
///
/// The `base_url`, `api_key`, `project_id` and `toggle_id` options are required.
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
///     .build()
///     .unwrap();
/// ```
pub struct ClientBuilder {
    base_url: Option<String>,
    updates_url: Option<String>,
    api_key: Option<String>,
    project_id: Option<String>,
    toggle_id: Option<String>,
    http_timeout: Option<Duration>,
    reconnect_policy: Option<ReconnectPolicy>,
    observers: Vec<Observer>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            base_url: None,
            updates_url: None,
            api_key: None,
            project_id: None,
            toggle_id: None,
            http_timeout: None,
            reconnect_policy: None,
            observers: Vec::new(),
        }
    }

    /// Sets the base URL of the feature flag service. Must be an `http` or `https` URL.
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_owned());
        self
    }

    /// Sets the API key sent as a bearer token with every request.
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_owned());
        self
    }

    /// Sets the identifier of the project whose feature flags are fetched.
    pub fn project_id(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_owned());
        self
    }

    /// Sets the identifier of the flag set used during credential validation.
    pub fn toggle_id(mut self, toggle_id: &str) -> Self {
        self.toggle_id = Some(toggle_id.to_owned());
        self
    }

    /// Sets a different base URL for the live update channel.
    /// By default the channel is opened on the base URL with its scheme switched to `ws` or `wss`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagsync::Client;
    ///
    /// let builder = Client::builder()
    ///     .updates_url("wss://push.example.com");
    /// ```
    pub fn updates_url(mut self, updates_url: &str) -> Self {
        self.updates_url = Some(updates_url.to_owned());
        self
    }

    /// Sets the HTTP request timeout.
    /// Default value is `5` seconds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use flagsync::Client;
    ///
    /// let builder = Client::builder()
    ///     .http_timeout(Duration::from_secs(10));
    /// ```
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Indicates whether the live update channel should reconnect after it closes.
    /// Default value is `true`, which reconnects every `5` seconds without limit.
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect_policy = Some(if reconnect {
            ReconnectPolicy::default()
        } else {
            ReconnectPolicy::Disabled
        });
        self
    }

    /// Sets the [`ReconnectPolicy`] of the live update channel.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use flagsync::{Client, ReconnectPolicy};
    ///
    /// let builder = Client::builder()
    ///     .reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(1)));
    /// ```
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = Some(policy);
        self
    }

    /// Registers a callback invoked synchronously for every [`Event`] emitted by the client.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagsync::{Client, Event};
    ///
    /// let builder = Client::builder()
    ///     .on_event(|event| {
    ///         if let Event::FlagUpdated { name, state } = event {
    ///             println!("{name} is now {state}");
    ///         }
    ///     });
    /// ```
    pub fn on_event(mut self, callback: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.observers.push(Box::new(callback));
        self
    }

    /// Creates a [`Client`] from the configuration made on the builder.
    ///
    /// # Errors
    ///
    /// This method fails if a required option is missing or empty, if a URL option is invalid,
    /// or if the internal HTTP client can't be created.
    pub fn build(self) -> Result<Client, ClientError> {
        let (options, observers) = self.build_options()?;
        Client::with_options(options, observers)
    }

    pub(crate) fn build_options(self) -> Result<(Options, Vec<Observer>), ClientError> {
        let base_url = required("base_url", self.base_url)?;
        let api_key = required("api_key", self.api_key)?;
        let project_id = required("project_id", self.project_id)?;
        let toggle_id = required("toggle_id", self.toggle_id)?;
        let updates_url = match self.updates_url {
            Some(url) => Some(parse_url("updates_url", url.as_str(), UPDATES_SCHEMES)?),
            None => None,
        };
        let options = Options {
            base_url: parse_url("base_url", base_url.as_str(), HTTP_SCHEMES)?,
            updates_url,
            api_key,
            project_id,
            toggle_id,
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            reconnect_policy: self.reconnect_policy.unwrap_or_default(),
        };
        Ok((options, self.observers))
    }
}

fn required(name: &str, value: Option<String>) -> Result<String, ClientError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ClientError::new(
            ErrorKind::Configuration,
            format!("The `{name}` option is required."),
        )),
    }
}
