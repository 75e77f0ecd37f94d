use std::time::Duration;

use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Response;
use url::Url;

use crate::constants::{USER_AGENT, USER_AGENT_HEADER};
use crate::errors::ErrorKind::*;
use crate::errors::{ClientError, ErrorKind};
use crate::model::flag::{records_from_json, validation_from_json, FlagRecord, ValidationRequest};
use crate::utils::endpoint;

/// Performs the credential validation and bulk fetch HTTP requests.
pub struct Fetcher {
    base_url: Url,
    http_client: reqwest::Client,
    api_key: String,
}

impl Fetcher {
    pub fn new(base_url: Url, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                let msg = format!("Could not create the HTTP client. {err}");
                error!(event_id = HttpClientInitFailure.as_u16(); "{}", msg);
                ClientError::new(HttpClientInitFailure, msg)
            })?;
        Ok(Self {
            base_url,
            http_client,
            api_key: api_key.to_owned(),
        })
    }

    /// Asks the server whether the API key is valid for the given project and flag set.
    ///
    /// Returns the server's verdict; failing to get one is an error.
    pub async fn validate(&self, project_id: &str, toggle_id: &str) -> Result<bool, ClientError> {
        let body = serde_json::to_string(&ValidationRequest {
            project_id,
            toggle_id,
        })
        .map_err(|err| {
            fail(
                Validation,
                format!("Could not encode the validation request. {err}"),
            )
        })?;

        let result = self
            .http_client
            .post(endpoint(&self.base_url, &["validate"]))
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(transport_failure(Validation, "validate the API key", err)),
        };
        let body = read_body(Validation, "validate the API key", response).await?;
        match validation_from_json(body.as_str()) {
            Ok(validation) => {
                debug!("Validation request was successful: valid = {}", validation.valid);
                Ok(validation.valid)
            }
            Err(parse_error) => Err(fail(
                Validation,
                format!("Validation request was successful but the HTTP response content was invalid. {parse_error}"),
            )),
        }
    }

    /// Downloads every feature flag of the project. Malformed records are left out of the result.
    pub async fn fetch_flags(&self, project_id: &str) -> Result<Vec<FlagRecord>, ClientError> {
        let result = self
            .http_client
            .get(endpoint(&self.base_url, &["projects", project_id, "feature-flags"]))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(transport_failure(Initialization, "fetch feature flags", err)),
        };
        let body = read_body(Initialization, "fetch feature flags", response).await?;
        match records_from_json(body.as_str()) {
            Ok(records) => {
                debug!("Fetch was successful: {} feature flags received", records.len());
                Ok(records)
            }
            Err(parse_error) => Err(fail(
                Protocol,
                format!("Fetching feature flags was successful but the HTTP response content was invalid. {parse_error}"),
            )),
        }
    }
}

async fn read_body(
    kind: ErrorKind,
    action: &str,
    response: Response,
) -> Result<String, ClientError> {
    match response.status().as_u16() {
        200..=299 => response
            .text()
            .await
            .map_err(|err| transport_failure(kind, action, err)),
        code @ 401 | code @ 403 => Err(fail(
            kind,
            format!("Your API key seems to be wrong. Could not {action}. Status code: {code}"),
        )),
        code => Err(fail(
            kind,
            format!("Unexpected HTTP response was received while trying to {action}. Status code: {code}"),
        )),
    }
}

fn transport_failure(kind: ErrorKind, action: &str, err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        fail(kind, format!("Request timed out while trying to {action}."))
    } else {
        fail(
            kind,
            format!("Unexpected error occurred while trying to {action}. It is most likely due to a local network issue. {err}"),
        )
    }
}

fn fail(kind: ErrorKind, msg: String) -> ClientError {
    error!(event_id = kind.as_u16(); "{}", msg);
    ClientError::new(kind, msg)
}

#[cfg(test)]
mod fetch_tests {
    use std::time::Duration;

    use mockito::Matcher;
    use url::Url;

    use crate::constants::test_constants::{
        MOCK_API_KEY, MOCK_FLAGS_PATH, MOCK_PROJECT, MOCK_TOGGLE, MOCK_VALIDATE_PATH,
    };
    use crate::constants::{PKG_VERSION, USER_AGENT_HEADER};
    use crate::errors::ErrorKind;
    use crate::fetch::fetcher::Fetcher;

    fn fetcher(url: &str) -> Fetcher {
        Fetcher::new(Url::parse(url).unwrap(), MOCK_API_KEY, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn validate_http() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", MOCK_VALIDATE_PATH)
            .match_header("authorization", "Bearer api-key")
            .match_header(
                USER_AGENT_HEADER,
                format!("Flagsync-Rust/{PKG_VERSION}").as_str(),
            )
            .match_body(Matcher::Json(serde_json::json!({
                "projectId": MOCK_PROJECT,
                "toggleId": MOCK_TOGGLE
            })))
            .with_status(200)
            .with_body(r#"{"valid": true}"#)
            .create_async()
            .await;

        let valid = fetcher(server.url().as_str())
            .validate(MOCK_PROJECT, MOCK_TOGGLE)
            .await
            .unwrap();
        assert!(valid);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn validate_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", MOCK_VALIDATE_PATH)
            .with_status(200)
            .with_body(r#"{"valid": false}"#)
            .create_async()
            .await;

        let valid = fetcher(server.url().as_str())
            .validate(MOCK_PROJECT, MOCK_TOGGLE)
            .await
            .unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn validate_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", MOCK_VALIDATE_PATH)
            .with_status(401)
            .create_async()
            .await;

        server
            .mock("POST", MOCK_VALIDATE_PATH)
            .with_status(500)
            .create_async()
            .await;

        server
            .mock("POST", MOCK_VALIDATE_PATH)
            .with_status(200)
            .with_body(r#"{"valid": "#)
            .create_async()
            .await;

        let fetcher = fetcher(server.url().as_str());

        let err = fetcher.validate(MOCK_PROJECT, MOCK_TOGGLE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            err.message,
            "Your API key seems to be wrong. Could not validate the API key. Status code: 401"
        );

        let err = fetcher.validate(MOCK_PROJECT, MOCK_TOGGLE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            err.message,
            "Unexpected HTTP response was received while trying to validate the API key. Status code: 500"
        );

        let err = fetcher.validate(MOCK_PROJECT, MOCK_TOGGLE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err
            .message
            .starts_with("Validation request was successful but the HTTP response content was invalid. JSON parsing failed."));
    }

    #[tokio::test]
    async fn validate_unreachable() {
        let err = fetcher("http://127.0.0.1:1")
            .validate(MOCK_PROJECT, MOCK_TOGGLE)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err
            .message
            .starts_with("Unexpected error occurred while trying to validate the API key."));
    }

    #[tokio::test]
    async fn fetch_flags_http() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", MOCK_FLAGS_PATH)
            .match_header("authorization", "Bearer api-key")
            .with_status(200)
            .with_body(r#"[{"name":"a","state":true},{"name":"b","state":false},{"malformed":1}]"#)
            .create_async()
            .await;

        let records = fetcher(server.url().as_str())
            .fetch_flags(MOCK_PROJECT)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a");
        assert!(records[0].state);
        assert_eq!(records[1].name, "b");
        assert!(!records[1].state);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_flags_invalid_format() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_FLAGS_PATH)
            .with_status(200)
            .with_body(r#"{"name":"a","state":true}"#)
            .create_async()
            .await;

        let err = fetcher(server.url().as_str())
            .fetch_flags(MOCK_PROJECT)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
        assert_eq!(
            err.message,
            "Fetching feature flags was successful but the HTTP response content was invalid. invalid response format"
        );
    }

    #[tokio::test]
    async fn fetch_flags_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_FLAGS_PATH)
            .with_status(503)
            .create_async()
            .await;

        let err = fetcher(server.url().as_str())
            .fetch_flags(MOCK_PROJECT)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);
        assert_eq!(
            err.message,
            "Unexpected HTTP response was received while trying to fetch feature flags. Status code: 503"
        );

        let err = fetcher("http://127.0.0.1:1")
            .fetch_flags(MOCK_PROJECT)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);
    }
}
