use serde_json::{Map, Value};

/// Profile-event content, parsed once and read per-field.
#[derive(Debug, Clone, Default)]
pub struct ProfileState(Value);

impl ProfileState {
    pub fn new(value: Map<String, Value>) -> Self {
        Self(Value::Object(value))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    #[inline]
    pub fn display_name(&self) -> Option<&str> {
        self.get_str("display_name")
    }

    #[inline]
    pub fn picture(&self) -> Option<&str> {
        self.get_str("picture")
    }

    #[inline]
    pub fn lud06(&self) -> Option<&str> {
        self.get_str("lud06")
    }

    #[inline]
    pub fn lud16(&self) -> Option<&str> {
        self.get_str("lud16")
    }

    #[inline]
    pub fn nip05(&self) -> Option<&str> {
        self.get_str("nip05")
    }

    /// Whether a payment address can be resolved from this profile.
    pub fn has_payment_address(&self) -> bool {
        self.lud16().is_some() || self.lud06().is_some()
    }

    pub fn from_note_contents(contents: &str) -> Self {
        let json = serde_json::from_str(contents);
        let data = if let Ok(Value::Object(data)) = json {
            data
        } else {
            Map::new()
        };

        Self::new(data)
    }
}
