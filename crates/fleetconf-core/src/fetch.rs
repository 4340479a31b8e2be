//! Remote document retrieval.

use std::sync::Arc;

use crate::error::ConfigError;

/// Retrieves the raw text behind a URL.
///
/// Implementations own the transport and its timeout. A call must fail with
/// [`ConfigError::Transport`] on any transport error, non-success status, or
/// empty body.
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, ConfigError>;
}

impl<T: RemoteFetcher + ?Sized> RemoteFetcher for &T {
    fn fetch(&self, url: &str) -> Result<String, ConfigError> {
        (**self).fetch(url)
    }
}

impl<T: RemoteFetcher + ?Sized> RemoteFetcher for Arc<T> {
    fn fetch(&self, url: &str) -> Result<String, ConfigError> {
        (**self).fetch(url)
    }
}

fn join(base: &str, file: &str) -> String {
    let mut url = base.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(file);
    url
}

/// `<base>/global.json`
pub fn global_url(base: &str) -> String {
    join(base, "global.json")
}

/// `<base>/<location>.json`
pub fn instance_url(base: &str, location_name: &str) -> String {
    join(base, &format!("{}.json", location_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_url() {
        assert_eq!(global_url("http://cfg/base"), "http://cfg/base/global.json");
        assert_eq!(global_url("http://cfg/base/"), "http://cfg/base/global.json");
    }

    #[test]
    fn test_instance_url() {
        assert_eq!(instance_url("http://cfg", "attic"), "http://cfg/attic.json");
        assert_eq!(instance_url("http://cfg/", "attic"), "http://cfg/attic.json");
    }
}
