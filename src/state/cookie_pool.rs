use crate::GatherError;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// A single cookie carried in the `Cookie` request header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// Creates a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses the leading `name=value` pair of a `Set-Cookie` header
    ///
    /// Attributes after the first `;` (Path, Expires, ...) are ignored.
    /// Returns None if there is no `=` or the name is empty.
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let pair = header.split(';').next()?;
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value.trim()))
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Thread-safe, append-only pool of cookies shared across workers
///
/// Retrieval picks uniformly at random over the pool's length at call time,
/// so concurrent additions may change which cookies a later call can return.
#[derive(Debug, Default)]
pub struct CookiePool {
    cookies: Mutex<Vec<Cookie>>,
}

impl CookiePool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cookie to the pool
    pub fn add(&self, cookie: Cookie) {
        self.lock().push(cookie);
    }

    /// Returns a uniformly random cookie from the pool
    ///
    /// # Returns
    ///
    /// * `Ok(Cookie)` - One of the cookies added so far
    /// * `Err(GatherError::EmptyPool)` - Nothing has been added yet
    pub fn get_random(&self) -> Result<Cookie, GatherError> {
        let cookies = self.lock();
        if cookies.is_empty() {
            return Err(GatherError::EmptyPool { pool: "cookie" });
        }
        let index = fastrand::usize(..cookies.len());
        Ok(cookies[index].clone())
    }

    /// Returns the number of cookies in the pool
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A push either completes or never starts, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Cookie>> {
        self.cookies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FromIterator<Cookie> for CookiePool {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self {
            cookies: Mutex::new(iter.into_iter().collect()),
        }
    }
}
