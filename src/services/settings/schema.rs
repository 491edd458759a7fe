//! Declarative table of the settings fields the dashboard knows how to edit.
//!
//! The table drives both field derivation and payload assembly. Keys of a
//! section that are not listed here are never dropped; they travel through
//! the payload untouched.

use serde::Serialize;

/// Value kind of an editable field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldKind {
    Boolean,
    Integer,
    Float,
    String,
    Enum(&'static [&'static str]),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::String => "string",
            FieldKind::Enum(_) => "enum",
        }
    }
}

/// One settings field: where it lives in the document and how to edit it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub section: &'static str,
    /// Key path inside the section, e.g. `["road_camera", "camera_enabled"]`
    pub path: &'static [&'static str],
    pub label: &'static str,
    pub kind: FieldKind,
    /// Value must be masked by the presentation layer
    pub sensitive: bool,
}

impl FieldSpec {
    const fn new(
        section: &'static str,
        path: &'static [&'static str],
        label: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            section,
            path,
            label,
            kind,
            sensitive: false,
        }
    }

    const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Stable identifier: section and key path joined by dots
    pub fn id(&self) -> String {
        let mut id = self.section.to_string();
        for key in self.path {
            id.push('.');
            id.push_str(key);
        }
        id
    }

    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

/// Top-level section of the settings document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SectionSpec {
    pub name: &'static str,
    pub label: &'static str,
}

pub const SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        name: "audio",
        label: "Audio",
    },
    SectionSpec {
        name: "camera",
        label: "Camera",
    },
    SectionSpec {
        name: "events",
        label: "Events",
    },
    SectionSpec {
        name: "obd",
        label: "OBD",
    },
    SectionSpec {
        name: "wifi_hotspot",
        label: "WiFi Hotspot",
    },
    SectionSpec {
        name: "driver_id",
        label: "Driver ID",
    },
    SectionSpec {
        name: "system",
        label: "System",
    },
    SectionSpec {
        name: "eld",
        label: "ELD",
    },
];

pub const VIDEO_RECORDING_PROFILES: &[&str] = &["standard", "legacy", "balanced", "extended"];
pub const SPEEDING_THRESHOLD_TYPES: &[&str] = &["absolute", "relative"];

use FieldKind::{Boolean, Enum, Float, Integer, String as Text};

pub const FIELDS: &[FieldSpec] = &[
    // audio
    FieldSpec::new(
        "audio",
        &["audio_notifications_enabled"],
        "General Audio Notifications",
        Boolean,
    ),
    FieldSpec::new(
        "audio",
        &["streaming_audio_enabled"],
        "Enable Audio in Live Stream",
        Boolean,
    ),
    FieldSpec::new(
        "audio",
        &["message_notification_audio_enabled"],
        "Message Notification Sound",
        Boolean,
    ),
    // camera
    FieldSpec::new(
        "camera",
        &["road_camera", "camera_enabled"],
        "Road Camera Enabled",
        Boolean,
    ),
    FieldSpec::new(
        "camera",
        &["road_camera", "audio_recording"],
        "Road Camera Audio Recording",
        Boolean,
    ),
    FieldSpec::new(
        "camera",
        &["cabin_camera", "camera_enabled"],
        "Cabin Camera Enabled",
        Boolean,
    ),
    FieldSpec::new(
        "camera",
        &["cabin_camera", "audio_recording"],
        "Cabin Camera Audio Recording",
        Boolean,
    ),
    FieldSpec::new(
        "camera",
        &["video_recording_profile"],
        "Video Profile",
        Enum(VIDEO_RECORDING_PROFILES),
    ),
    // events: g-force
    FieldSpec::new(
        "events",
        &["harsh_braking_event_enabled"],
        "Harsh Braking",
        Boolean,
    ),
    FieldSpec::new(
        "events",
        &["harsh_braking_accel_threshold"],
        "Braking Threshold",
        Float,
    ),
    FieldSpec::new(
        "events",
        &["aggressive_accel_event_enabled"],
        "Aggressive Accel",
        Boolean,
    ),
    FieldSpec::new(
        "events",
        &["aggressive_accel_threshold"],
        "Accel Threshold",
        Float,
    ),
    // events: standard
    FieldSpec::new("events", &["idling_event_enabled"], "Idling Event", Boolean),
    FieldSpec::new(
        "events",
        &["speeding_event_enabled"],
        "Speeding Event",
        Boolean,
    ),
    FieldSpec::new(
        "events",
        &["speeding_threshold_type"],
        "Speeding Threshold Type",
        Enum(SPEEDING_THRESHOLD_TYPES),
    ),
    // events: driver monitoring
    FieldSpec::new(
        "events",
        &["cellphone_detection_event_enabled"],
        "Cellphone Detection",
        Boolean,
    ),
    // obd
    FieldSpec::new("obd", &["canbus_enabled"], "CANbus Enabled", Boolean),
    FieldSpec::new(
        "obd",
        &["low_battery_cutoff_millivolts"],
        "Low Battery Cutoff (mV)",
        Integer,
    ),
    // wifi hotspot
    FieldSpec::new(
        "wifi_hotspot",
        &["hotspot_enabled"],
        "Hotspot Enabled",
        Boolean,
    ),
    FieldSpec::new(
        "wifi_hotspot",
        &["auto_disable_on_engine_off"],
        "Auto-Disable on Engine Off",
        Boolean,
    ),
    FieldSpec::new("wifi_hotspot", &["ssid"], "SSID", Text),
    FieldSpec::new("wifi_hotspot", &["password"], "Password", Text).sensitive(),
];

pub fn section(name: &str) -> Option<&'static SectionSpec> {
    SECTIONS.iter().find(|section| section.name == name)
}

pub fn section_fields(name: &str) -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(move |field| field.section == name)
}

pub fn field(id: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|field| field.id() == id)
}
