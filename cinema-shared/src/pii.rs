use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

const MASK: &str = "********";

/// Wrapper for card data and other secrets.
///
/// Debug, Display and Serialize all emit a mask, so a secret can travel inside
/// request structs without leaking through `tracing` fields or JSON payloads.
/// Read the value explicitly with [`Masked::expose`].
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Masked<T>(T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Masked<String> {
    /// Last four characters, the only part safe to print on a receipt
    pub fn last_four(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let start = chars.len().saturating_sub(4);
        chars[start..].iter().collect()
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_never_prints_value() {
        let secret = Masked::new("4111111111111111".to_string());
        assert_eq!(format!("{:?}", secret), MASK);
        assert_eq!(secret.to_string(), MASK);
        assert_eq!(serde_json::to_string(&secret).unwrap(), format!("\"{}\"", MASK));
        assert_eq!(secret.expose(), "4111111111111111");
    }

    #[test]
    fn test_last_four() {
        assert_eq!(Masked::new("4111111111111234".to_string()).last_four(), "1234");
        assert_eq!(Masked::new("12".to_string()).last_four(), "12");
    }

    #[test]
    fn test_deserializes_plain_value() {
        let secret: Masked<String> = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(secret.expose(), "123");
    }
}
