//! Purpose: Wire shapes and URL handling for the `/process` exchange.
//! Exports: `ProcessRequest`, `encode_request`, `decode_response`, URL helpers (crate-private).
//! Role: Keeps serde/url details out of the client's call path.
//! Invariants: The envelope always carries exactly `data`, `license`, and `tier`.
//! Invariants: `data` is serialized as given; nothing is normalized or dropped.
use crate::core::error::{Error, ErrorKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Read;
use url::Url;

type ApiResult<T> = Result<T, Error>;

const PROCESS_SEGMENT: &str = "process";

#[derive(Serialize)]
pub(crate) struct ProcessRequest<'a, T: ?Sized> {
    pub data: &'a T,
    pub license: &'a str,
    pub tier: &'a str,
}

pub(crate) fn encode_request<T>(data: &T, license: &str, tier: &str) -> ApiResult<String>
where
    T: Serialize + ?Sized,
{
    let request = ProcessRequest {
        data,
        license,
        tier,
    };
    serde_json::to_string(&request).map_err(|err| {
        Error::new(ErrorKind::Serialization)
            .with_message("failed to encode request json")
            .with_source(err)
    })
}

/// Decodes one JSON document from `reader`, reading it to the end.
///
/// I/O failures while reading are transport errors; everything else,
/// including trailing bytes after the document, is a decode error.
pub(crate) fn decode_response<R, B>(reader: B) -> ApiResult<R>
where
    R: DeserializeOwned,
    B: Read,
{
    serde_json::from_reader(reader).map_err(|err| {
        if err.is_io() {
            Error::new(ErrorKind::Transport)
                .with_message("failed to read response body")
                .with_source(err)
        } else {
            Error::new(ErrorKind::Deserialization)
                .with_message("invalid response json")
                .with_source(err)
        }
    })
}

pub(crate) fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Configuration)
            .with_message("invalid api endpoint url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Configuration)
            .with_message("api endpoint must use http or https scheme"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::new(ErrorKind::Configuration).with_message("api endpoint has no host"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Appends `/process` to the endpoint path, keeping any base path.
pub(crate) fn process_url(base_url: &Url) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Configuration).with_message("api endpoint cannot be a base")
        })?;
        path.pop_if_empty();
        path.push(PROCESS_SEGMENT);
    }
    Ok(url)
}
