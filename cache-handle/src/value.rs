//! # Stored Values
//!
//! Purpose: Turn caller values into the text stored at a key and back.
//!
//! Plain text and integers are stored verbatim so other clients can read and
//! `INCR` them. Anything else goes through [`Json`] and is stored as JSON
//! text. The choice is made by the type at compile time.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CacheError, CacheResult};

/// Values that can be written to a string key.
pub trait ToStored {
    /// Returns the text to store.
    fn to_stored(&self) -> CacheResult<String>;
}

/// Values that can be read back from a string key.
pub trait FromStored: Sized {
    /// Decodes the stored text.
    fn from_stored(raw: String) -> CacheResult<Self>;
}

/// Structured value stored as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwraps the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: ToStored + ?Sized> ToStored for &T {
    fn to_stored(&self) -> CacheResult<String> {
        (**self).to_stored()
    }
}

impl ToStored for str {
    fn to_stored(&self) -> CacheResult<String> {
        Ok(self.to_owned())
    }
}

impl ToStored for String {
    fn to_stored(&self) -> CacheResult<String> {
        Ok(self.clone())
    }
}

impl FromStored for String {
    fn from_stored(raw: String) -> CacheResult<Self> {
        Ok(raw)
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl ToStored for $ty {
                fn to_stored(&self) -> CacheResult<String> {
                    Ok(self.to_string())
                }
            }

            impl FromStored for $ty {
                fn from_stored(raw: String) -> CacheResult<Self> {
                    raw.trim().parse().map_err(|err| {
                        CacheError::Decode(format!("{raw:?} is not a valid {}: {err}", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: Serialize> ToStored for Json<T> {
    fn to_stored(&self) -> CacheResult<String> {
        serde_json::to_string(&self.0).map_err(|err| CacheError::Serialize(err.to_string()))
    }
}

impl<T: DeserializeOwned> FromStored for Json<T> {
    fn from_stored(raw: String) -> CacheResult<Self> {
        serde_json::from_str(&raw).map(Json).map_err(|err| {
            warn!(error = %err, "stored value is not valid JSON for the requested type");
            CacheError::Decode(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        a: i32,
        name: String,
    }

    #[test]
    fn text_and_integers_are_verbatim() {
        assert_eq!("abc".to_stored().unwrap(), "abc");
        assert_eq!(String::from("abc").to_stored().unwrap(), "abc");
        assert_eq!(42i32.to_stored().unwrap(), "42");
        assert_eq!((-7i64).to_stored().unwrap(), "-7");
        assert_eq!((&&"nested").to_stored().unwrap(), "nested");
    }

    #[test]
    fn structured_values_are_json() {
        let value = Json(Profile {
            a: 1,
            name: "x".to_string(),
        });
        assert_eq!(value.to_stored().unwrap(), r#"{"a":1,"name":"x"}"#);
    }

    #[test]
    fn json_reencodes_to_identical_text() {
        let stored = r#"{"a":1,"name":"x"}"#.to_string();
        let decoded: Json<Profile> = Json::from_stored(stored.clone()).unwrap();
        assert_eq!(decoded.to_stored().unwrap(), stored);
    }

    #[test]
    fn integer_decode_failure_is_reported() {
        let err = i64::from_stored("abc".to_string()).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
        assert_eq!(u16::from_stored("8080".to_string()).unwrap(), 8080);
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = Json::<Profile>::from_stored("abc".to_string()).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
