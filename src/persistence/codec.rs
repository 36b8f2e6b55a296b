//! Identifier codecs: one identifier per line of text.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AnnoyError, Result};

/// Converts identifiers to and from a single line of text.
///
/// `encode` must be injective and must not produce line breaks, otherwise a
/// saved index cannot be read back in the same order. An identifier that
/// cannot be encoded is an `InvalidInput` error.
pub trait IdentifierCodec<T> {
    fn encode(&self, id: &T) -> Result<String>;

    fn decode(&self, line: &str) -> Result<T>;
}

impl<T, C: IdentifierCodec<T> + ?Sized> IdentifierCodec<T> for &C {
    fn encode(&self, id: &T) -> Result<String> {
        (**self).encode(id)
    }

    fn decode(&self, line: &str) -> Result<T> {
        (**self).decode(line)
    }
}

/// Codec for anything with a `Display` / `FromStr` pair: integers, `char`,
/// `String` and friends.
pub struct ParseCodec<T>(PhantomData<fn() -> T>);

impl<T> ParseCodec<T> {
    pub fn new() -> Self {
        ParseCodec(PhantomData)
    }
}

impl<T> Default for ParseCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdentifierCodec<T> for ParseCodec<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    fn encode(&self, id: &T) -> Result<String> {
        Ok(id.to_string())
    }

    fn decode(&self, line: &str) -> Result<T> {
        line.parse::<T>()
            .map_err(|e| AnnoyError::corrupt(format!("cannot decode identifier {:?}: {}", line, e)))
    }
}

/// Identity codec for string identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl IdentifierCodec<String> for StringCodec {
    fn encode(&self, id: &String) -> Result<String> {
        Ok(id.clone())
    }

    fn decode(&self, line: &str) -> Result<String> {
        Ok(line.to_string())
    }
}

/// Codec storing each identifier as a compact JSON document.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        JsonCodec(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> IdentifierCodec<T> for JsonCodec<T> {
    fn encode(&self, id: &T) -> Result<String> {
        serde_json::to_string(id)
            .map_err(|e| AnnoyError::invalid(format!("cannot encode identifier: {}", e)))
    }

    fn decode(&self, line: &str) -> Result<T> {
        serde_json::from_str(line)
            .map_err(|e| AnnoyError::corrupt(format!("cannot decode identifier {:?}: {}", line, e)))
    }
}
