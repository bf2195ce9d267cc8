use sy_domain::error::Error;

/// Map a reqwest error to the shared error type, keeping timeout as its
/// own class.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
