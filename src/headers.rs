//! The `headers` module provides the `HeaderValue` struct, which represents a single parsed
//! value from a (possibly multi-valued) HTTP header, along with any `;`-separated parameters
//! (such as the `q` weighting used throughout content negotiation).

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::content_negotiation::{Charset, Encoding, MediaLanguage, MediaType};

/// Represents a single value parsed from an HTTP header, with any associated parameters.
#[derive(Debug, Clone)]
pub struct HeaderValue {
    /// The main value of the header
    pub value: String,
    /// Any parameters associated with the value (e.g. `q`, `charset`)
    pub params: HashMap<String, String>,
    /// If the value should be quoted when rendered
    pub quote: bool,
}

impl HeaderValue {
    /// Creates a basic header value with no parameters from a plain string
    pub fn basic<S: Into<String>>(value: S) -> HeaderValue {
        HeaderValue {
            value: value.into(),
            params: HashMap::new(),
            quote: false,
        }
    }

    /// Parses a header value, which may have `;`-separated parameters, from a string. The first
    /// segment is the value; any later `key=value` segments become parameters. A value that is
    /// wrapped entirely in double quotes has those quotes stripped and `quote` is set.
    pub fn parse_string<S: AsRef<str>>(s: S) -> HeaderValue {
        let s = s.as_ref();
        let mut parts = s.split(';');
        let first = parts.next().unwrap_or("").trim();
        let (value, quote) = if first.len() >= 2 && first.starts_with('"') && first.ends_with('"')
        {
            (first[1..first.len() - 1].to_string(), true)
        } else {
            (first.to_string(), false)
        };
        let params = parts
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    None
                } else {
                    let mut kv = part.splitn(2, '=');
                    let key = kv.next()?.trim().to_lowercase();
                    let val = kv.next().unwrap_or("").trim().trim_matches('"').to_string();
                    Some((key, val))
                }
            })
            .collect();
        HeaderValue {
            value,
            params,
            quote,
        }
    }

    /// Marks the header value as needing to be quoted when rendered
    pub fn quote(mut self) -> HeaderValue {
        self.quote = true;
        self
    }

    /// If this is a weak ETag value (prefixed with `W/`), returns the unquoted ETag value
    pub fn weak_etag(&self) -> Option<String> {
        if self.value.starts_with("W/") {
            Some(self.value[2..].trim_matches('"').to_string())
        } else {
            None
        }
    }

    /// Returns the `q` parameter weight for this header value, defaulting to `1.0`
    fn weight_param(&self) -> String {
        self.params.get("q").cloned().unwrap_or_else(|| "1".to_string())
    }

    /// Converts this header value into a media type, applying the `q` weight if present
    pub fn as_media_type(&self) -> MediaType {
        MediaType::parse_string(&self.value).with_weight(&self.weight_param())
    }

    /// Converts this header value into a media language, applying the `q` weight if present
    pub fn as_media_language(&self) -> MediaLanguage {
        MediaLanguage::parse_string(&self.value).with_weight(&self.weight_param())
    }

    /// Converts this header value into a charset, applying the `q` weight if present
    pub fn as_charset(&self) -> Charset {
        Charset::parse_string(&self.value).with_weight(&self.weight_param())
    }

    /// Converts this header value into an encoding, applying the `q` weight if present
    pub fn as_encoding(&self) -> Encoding {
        Encoding::parse_string(&self.value).with_weight(&self.weight_param())
    }
}

impl PartialEq for HeaderValue {
    fn eq(&self, other: &HeaderValue) -> bool {
        self.value == other.value && self.quote == other.quote && self.params == other.params
    }
}

impl Eq for HeaderValue {}

impl PartialEq<&str> for HeaderValue {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl Hash for HeaderValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.quote.hash(state);
        let mut params: Vec<(&String, &String)> = self.params.iter().collect();
        params.sort();
        params.hash(state);
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.quote {
            write!(f, "\"{}\"", self.value)?;
        } else {
            write!(f, "{}", self.value)?;
        }
        for (k, v) in &self.params {
            write!(f, "; {}={}", k, v)?;
        }
        Ok(())
    }
}

/// Convenience macro for parsing a header value from a string literal or expression
#[macro_export]
macro_rules! h {
    ($e:expr) => {
        $crate::headers::HeaderValue::parse_string($e)
    };
}
