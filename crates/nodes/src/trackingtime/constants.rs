//! Fixed values of the TrackingTime API and of the nodes built on it.

pub const TRACKINGTIME_BASE_URL: &str = "https://app.trackingtime.co/api/v4";

/// Credential type the nodes request from the host.
pub const CREDENTIAL_TYPE: &str = "trackingtimeApi";

/// Entity the time-entry search and its field metadata are scoped to.
pub const TIME_ENTRY_SEARCH_ENTITY: &str = "Event";

/// Event filter registered for the `time-entries` trigger topic.
pub const TIME_ENTRY_EVENTS: &str = "event.updated,event.created";

pub const TOPIC_TIME_ENTRIES: &str = "time-entries";

/// Custom-field slugs used to tag entries created from a workflow.
pub const THIRD_PARTY_ID_SLUG: &str = "EVENT_THIRD_PARTY_ID";
pub const THIRD_PARTY_SERVICE_SLUG: &str = "EVENT_THIRD_PARTY_SERVICE";
pub const THIRD_PARTY_SERVICE_NAME: &str = "N8N";

/// The only resource-mapper mode the search operation accepts.
pub const MAPPING_MODE_DEFINE_BELOW: &str = "defineBelow";

/// Fixed username for app-password basic auth.
pub const APP_PASSWORD_USERNAME: &str = "API_TOKEN";

// Static data keys.
pub const WEBHOOK_ID_KEY: &str = "webhookId";
pub const WEBHOOK_SECRET_KEY: &str = "webhookSecret";
pub const DELETE_FAILURES_KEY: &str = "deleteFailures";

/// Capacity of the webhook deletion failure log.
pub const MAX_DELETE_FAILURES: usize = 5;
