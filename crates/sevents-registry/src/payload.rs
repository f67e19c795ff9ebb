use serde::de::DeserializeOwned;
use serde_json::Value;

/// Body carried by a decoded event.
///
/// A frame without a body decodes to [`Payload::None`]. That is distinct from
/// a body that was serialized as JSON `null`, which is `Payload::Value(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    None,
    Value(Value),
}

impl Payload {
    /// Borrow the body value, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Take the body value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Deserialize the body into a concrete type.
    ///
    /// Returns `Ok(None)` for bodyless events.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        match self {
            Self::None => Ok(None),
            Self::Value(value) => T::deserialize(value).map(Some),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for Payload {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::None, Self::Value)
    }
}

/// A decoded event: its name and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Status {
        code: u16,
    }

    #[test]
    fn null_body_is_not_absent() {
        let absent = Payload::None;
        let null = Payload::from(Value::Null);

        assert_ne!(absent, null);
        assert!(absent.is_none());
        assert_eq!(null.as_value(), Some(&Value::Null));
    }

    #[test]
    fn decode_typed_body() {
        let payload = Payload::from(json!({ "code": 200 }));
        let status: Option<Status> = payload.decode().unwrap();
        assert_eq!(status, Some(Status { code: 200 }));

        let empty: Option<Status> = Payload::None.decode().unwrap();
        assert!(empty.is_none());

        assert!(Payload::from(json!("nope")).decode::<Status>().is_err());
    }
}
