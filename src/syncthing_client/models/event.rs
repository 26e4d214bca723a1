use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::syncthing_client::api::RawEvent;
use crate::syncthing_client::helpers::timestamp_or_now;

/// The Syncthing event types the tracker knows about.
///
/// Names introduced by newer daemons classify as [`EventKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConfigSaved,
    DeviceConnected,
    DeviceDisconnected,
    DeviceDiscovered,
    DeviceRejected,
    DownloadProgress,
    FolderCompletion,
    FolderErrors,
    FolderRejected,
    FolderSummary,
    ItemFinished,
    ItemStarted,
    LocalIndexUpdated,
    Ping,
    RemoteIndexUpdated,
    Starting,
    StartupCompleted,
    StateChanged,
    Unknown,
}

impl EventKind {
    pub const KNOWN: [EventKind; 18] = [
        EventKind::ConfigSaved,
        EventKind::DeviceConnected,
        EventKind::DeviceDisconnected,
        EventKind::DeviceDiscovered,
        EventKind::DeviceRejected,
        EventKind::DownloadProgress,
        EventKind::FolderCompletion,
        EventKind::FolderErrors,
        EventKind::FolderRejected,
        EventKind::FolderSummary,
        EventKind::ItemFinished,
        EventKind::ItemStarted,
        EventKind::LocalIndexUpdated,
        EventKind::Ping,
        EventKind::RemoteIndexUpdated,
        EventKind::Starting,
        EventKind::StartupCompleted,
        EventKind::StateChanged,
    ];

    pub fn classify(name: &str) -> Self {
        match name {
            "ConfigSaved" => EventKind::ConfigSaved,
            "DeviceConnected" => EventKind::DeviceConnected,
            "DeviceDisconnected" => EventKind::DeviceDisconnected,
            "DeviceDiscovered" => EventKind::DeviceDiscovered,
            "DeviceRejected" => EventKind::DeviceRejected,
            "DownloadProgress" => EventKind::DownloadProgress,
            "FolderCompletion" => EventKind::FolderCompletion,
            "FolderErrors" => EventKind::FolderErrors,
            "FolderRejected" => EventKind::FolderRejected,
            "FolderSummary" => EventKind::FolderSummary,
            "ItemFinished" => EventKind::ItemFinished,
            "ItemStarted" => EventKind::ItemStarted,
            "LocalIndexUpdated" => EventKind::LocalIndexUpdated,
            "Ping" => EventKind::Ping,
            "RemoteIndexUpdated" => EventKind::RemoteIndexUpdated,
            "Starting" => EventKind::Starting,
            "StartupCompleted" => EventKind::StartupCompleted,
            "StateChanged" => EventKind::StateChanged,
            _ => EventKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConfigSaved => "ConfigSaved",
            EventKind::DeviceConnected => "DeviceConnected",
            EventKind::DeviceDisconnected => "DeviceDisconnected",
            EventKind::DeviceDiscovered => "DeviceDiscovered",
            EventKind::DeviceRejected => "DeviceRejected",
            EventKind::DownloadProgress => "DownloadProgress",
            EventKind::FolderCompletion => "FolderCompletion",
            EventKind::FolderErrors => "FolderErrors",
            EventKind::FolderRejected => "FolderRejected",
            EventKind::FolderSummary => "FolderSummary",
            EventKind::ItemFinished => "ItemFinished",
            EventKind::ItemStarted => "ItemStarted",
            EventKind::LocalIndexUpdated => "LocalIndexUpdated",
            EventKind::Ping => "Ping",
            EventKind::RemoteIndexUpdated => "RemoteIndexUpdated",
            EventKind::Starting => "Starting",
            EventKind::StartupCompleted => "StartupCompleted",
            EventKind::StateChanged => "StateChanged",
            EventKind::Unknown => "Unknown",
        }
    }
}

/// A classified event. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub kind: EventKind,
    pub data: Option<Map<String, Value>>,
}

impl Event {
    pub fn new(id: u64, kind: EventKind, data: Option<Map<String, Value>>) -> Self {
        Self {
            id,
            time: Utc::now(),
            kind,
            data,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key)?.as_str()
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.field(key).and_then(value_as_u64)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.field(key)?.as_f64()
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.str_field("folder")
    }
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let kind = EventKind::classify(&raw.event_type);
        if kind == EventKind::Unknown {
            debug!(id = raw.id, event_type = %raw.event_type, "Unrecognized event type");
        }
        let data = match raw.data {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Self {
            id: raw.id,
            time: timestamp_or_now(&raw.time),
            kind,
            data,
        }
    }
}

/// Byte counts arrive as integers, but tolerate floats from older daemons.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.is_finite() && *number >= 0.0)
            .map(|number| number as u64)
    })
}
