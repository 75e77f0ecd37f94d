use url::Url;

use crate::errors::{ClientError, ErrorKind};

pub fn parse_url(option: &str, raw: &str, schemes: &[&str]) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|err| {
        ClientError::new(
            ErrorKind::Configuration,
            format!("The `{option}` option '{raw}' is not a valid URL. ({err})"),
        )
    })?;
    if url.cannot_be_a_base() || !schemes.contains(&url.scheme()) {
        return Err(ClientError::new(
            ErrorKind::Configuration,
            format!(
                "The `{option}` option '{raw}' must be an absolute URL with one of the following schemes: {}.",
                schemes.join(", ")
            ),
        ));
    }
    Ok(url)
}

/// Appends path `segments` to `base`, percent-encoding each of them.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Builds the address of the live update channel, switching `http`/`https` to `ws`/`wss`.
pub fn updates_url(base: &Url, project_id: &str) -> Result<Url, ClientError> {
    let mut url = endpoint(base, &["projects", project_id, "updates"]);
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url),
        other => {
            return Err(ClientError::new(
                ErrorKind::Configuration,
                format!("Unsupported scheme '{other}' for the live update address."),
            ))
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        ClientError::new(
            ErrorKind::Configuration,
            format!("Could not derive the live update address from '{base}'."),
        )
    })?;
    Ok(url)
}
