//! Inbound hub envelopes.
//!
//! The hub tags every event with a type and a source string. Only four
//! combinations matter to the monitor; everything else is ignored.

use serde_json::{Map, Value};
use tracing::debug;

use super::EventHub;
use crate::config::HostConfiguration;
use crate::constants::{event, event_type, rules, shared_state, source};
use crate::error::{MonitorError, MonitorResult};
use crate::event::{Event, PlacesResponse};
use crate::policy::{AuthorizationLevel, MonitorMode};

/// Classification of an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    /// Hub shared-state change.
    Hub,
    /// Command addressed to the monitor.
    MonitorCommand,
    /// Answer from the places service.
    PlacesResponse,
    /// Triggered rules-engine consequence.
    RulesConsequence,
}

impl EventTag {
    #[must_use]
    pub fn classify(event_type: &str, event_source: &str) -> Option<Self> {
        match (event_type, event_source) {
            (event_type::HUB, source::SHARED_STATE) => Some(Self::Hub),
            (event_type::MONITOR, source::REQUEST_CONTENT) => Some(Self::MonitorCommand),
            (event_type::PLACES, source::RESPONSE_CONTENT) => Some(Self::PlacesResponse),
            (event_type::RULES, source::RESPONSE_CONTENT) => Some(Self::RulesConsequence),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::MonitorCommand => "monitor-command",
            Self::PlacesResponse => "places-response",
            Self::RulesConsequence => "rules-consequence",
        }
    }
}

/// An event as delivered by the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub name: String,
    pub event_type: String,
    pub source: String,
    pub data: Map<String, Value>,
}

impl InboundEnvelope {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            event_type: event_type.into(),
            source: source.into(),
            data,
        }
    }

    /// A monitor command envelope, as the public API would send it.
    #[must_use]
    pub fn monitor_command(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(name, event_type::MONITOR, source::REQUEST_CONTENT, data)
    }

    /// A hub shared-state change for `owner`.
    #[must_use]
    pub fn shared_state_change(owner: &str) -> Self {
        let mut data = Map::new();
        data.insert(event::DATA_STATE_OWNER.to_string(), Value::from(owner));
        Self::new("shared state change", event_type::HUB, source::SHARED_STATE, data)
    }

    #[must_use]
    pub fn tag(&self) -> Option<EventTag> {
        EventTag::classify(&self.event_type, &self.source)
    }

    /// Translate into a coordinator event.
    ///
    /// `Ok(None)` means the envelope is valid but of no interest. Configuration
    /// changes are resolved by reading the configuration shared state from
    /// `hub`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` for a monitor command or places
    /// response with a missing or malformed payload.
    pub fn decode(&self, hub: &dyn EventHub) -> MonitorResult<Option<Event>> {
        let Some(tag) = self.tag() else {
            debug!(event_type = %self.event_type, source = %self.source, "ignoring unrecognised envelope");
            return Ok(None);
        };

        match tag {
            EventTag::Hub => Ok(self.decode_shared_state(hub)),
            EventTag::MonitorCommand => self.decode_command().map(Some),
            EventTag::PlacesResponse => {
                let response: PlacesResponse = serde_json::from_value(Value::Object(self.data.clone()))
                    .map_err(|e| MonitorError::invalid_event(format!("malformed places response: {e}")))?;
                Ok(Some(Event::PlacesResponse(response)))
            }
            EventTag::RulesConsequence => {
                let consequence_type = self
                    .data
                    .get(rules::TRIGGERED_CONSEQUENCE)
                    .and_then(|c| c.get(rules::CONSEQUENCE_TYPE))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                debug!(name = %self.name, consequence_type, "rules consequences carry no monitor work");
                Ok(None)
            }
        }
    }

    fn decode_shared_state(&self, hub: &dyn EventHub) -> Option<Event> {
        let owner = self.data.get(event::DATA_STATE_OWNER).and_then(Value::as_str)?;
        if owner != shared_state::CONFIGURATION {
            debug!(owner, "ignoring shared state change");
            return None;
        }

        match hub.shared_state(shared_state::CONFIGURATION).and_then(HostConfiguration::from_value) {
            Some(config) => Some(Event::ConfigurationChanged(config)),
            None => {
                debug!("configuration shared state announced but not readable yet");
                None
            }
        }
    }

    fn decode_command(&self) -> MonitorResult<Event> {
        match self.name.as_str() {
            event::NAME_START => Ok(Event::Start),
            event::NAME_STOP => {
                let clear_data = self
                    .data
                    .get(event::DATA_CLEAR)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Event::Stop { clear_data })
            }
            event::NAME_UPDATE_LOCATION_NOW => Ok(Event::UpdateLocationNow),
            event::NAME_UPDATE_MONITOR_CONFIGURATION => {
                let bits = self
                    .data
                    .get(event::DATA_MONITOR_MODE)
                    .and_then(Value::as_u64)
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| MonitorError::invalid_event("missing or invalid monitormode"))?;
                Ok(Event::SetMode(MonitorMode::from_bits(bits)))
            }
            event::NAME_SET_REQUEST_AUTHORIZATION_LEVEL => {
                let level = self
                    .data
                    .get(event::DATA_REQUEST_AUTHORIZATION_LEVEL)
                    .and_then(AuthorizationLevel::from_json)
                    .ok_or_else(|| MonitorError::invalid_event("missing or invalid requestauthorizationlevel"))?;
                Ok(Event::SetAuthorizationLevel(level))
            }
            other => Err(MonitorError::invalid_event(format!("unknown monitor command '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{RegionNotification, SharedState};
    use serde_json::json;

    struct ConfiguredHub(Option<Value>);

    impl EventHub for ConfiguredHub {
        fn emit_region_event(&self, _notification: RegionNotification) {}
        fn publish_shared_state(&self, _state: SharedState) {}
        fn shared_state(&self, owner: &str) -> Option<Value> {
            (owner == shared_state::CONFIGURATION).then(|| self.0.clone()).flatten()
        }
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            EventTag::classify(event_type::MONITOR, source::REQUEST_CONTENT),
            Some(EventTag::MonitorCommand)
        );
        assert_eq!(EventTag::classify(event_type::MONITOR, source::SHARED_STATE), None);
        assert_eq!(EventTag::RulesConsequence.as_str(), "rules-consequence");
    }

    #[test]
    fn test_decode_commands() {
        let hub = ConfiguredHub(None);

        let stop = InboundEnvelope::monitor_command(event::NAME_STOP, data(json!({"clearclientdata": true})));
        assert_eq!(stop.decode(&hub).unwrap(), Some(Event::Stop { clear_data: true }));

        let stop_default = InboundEnvelope::monitor_command(event::NAME_STOP, Map::new());
        assert_eq!(stop_default.decode(&hub).unwrap(), Some(Event::Stop { clear_data: false }));

        let mode = InboundEnvelope::monitor_command(
            event::NAME_UPDATE_MONITOR_CONFIGURATION,
            data(json!({"monitormode": 1})),
        );
        assert_eq!(mode.decode(&hub).unwrap(), Some(Event::SetMode(MonitorMode::CONTINUOUS)));

        let level = InboundEnvelope::monitor_command(
            event::NAME_SET_REQUEST_AUTHORIZATION_LEVEL,
            data(json!({"requestauthorizationlevel": "wheninuse"})),
        );
        assert_eq!(
            level.decode(&hub).unwrap(),
            Some(Event::SetAuthorizationLevel(AuthorizationLevel::WhenInUse))
        );
    }

    #[test]
    fn test_decode_rejects_bad_commands() {
        let hub = ConfiguredHub(None);
        let unknown = InboundEnvelope::monitor_command("dance", Map::new());
        assert!(unknown.decode(&hub).is_err());

        let no_mode = InboundEnvelope::monitor_command(event::NAME_UPDATE_MONITOR_CONFIGURATION, Map::new());
        assert!(no_mode.decode(&hub).is_err());
    }

    #[test]
    fn test_decode_configuration_change() {
        let envelope = InboundEnvelope::shared_state_change(shared_state::CONFIGURATION);

        let missing = ConfiguredHub(None);
        assert_eq!(envelope.decode(&missing).unwrap(), None);

        let present = ConfiguredHub(Some(json!({"global.privacy": "optedin"})));
        let Some(Event::ConfigurationChanged(config)) = envelope.decode(&present).unwrap() else {
            panic!("expected configuration change");
        };
        assert_eq!(config.get_str("global.privacy"), Some("optedin"));

        let places = InboundEnvelope::shared_state_change(shared_state::PLACES);
        assert_eq!(places.decode(&present).unwrap(), None);
    }

    #[test]
    fn test_decode_places_response() {
        let hub = ConfiguredHub(None);
        let envelope = InboundEnvelope::new(
            "response",
            event_type::PLACES,
            source::RESPONSE_CONTENT,
            data(json!({
                "status": "failed",
                "location": {"latitude": 1.0, "longitude": 2.0},
                "reason": "server error"
            })),
        );
        let Some(Event::PlacesResponse(PlacesResponse::Failed { reason, .. })) = envelope.decode(&hub).unwrap() else {
            panic!("expected failed places response");
        };
        assert_eq!(reason, "server error");
    }

    #[test]
    fn test_rules_and_unknown_are_ignored() {
        let hub = ConfiguredHub(None);
        let rules = InboundEnvelope::new("rule", event_type::RULES, source::RESPONSE_CONTENT, Map::new());
        assert_eq!(rules.decode(&hub).unwrap(), None);

        let other = InboundEnvelope::new("x", "com.example.type", "com.example.source", Map::new());
        assert_eq!(other.decode(&hub).unwrap(), None);
    }
}
