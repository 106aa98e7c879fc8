//! The two body encodings RESTCONF speaks.

use serde::{Deserialize, Serialize};

use super::media_type::{
    APPLICATION_JSON, APPLICATION_XML, TEXT_XML, YANG_DATA_JSON, YANG_DATA_XML, YANG_PATCH_JSON,
    YANG_PATCH_XML,
};

/// A body representation for YANG data and YANG patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEncoding {
    Json,
    Xml,
}

impl MessageEncoding {
    /// All encodings, in the order they are tried during negotiation.
    pub const ALL: [MessageEncoding; 2] = [MessageEncoding::Json, MessageEncoding::Xml];

    /// Media type of YANG data in this encoding (RFC 8040).
    pub fn data_media_type(self) -> &'static str {
        match self {
            MessageEncoding::Json => YANG_DATA_JSON,
            MessageEncoding::Xml => YANG_DATA_XML,
        }
    }

    /// Media type of a YANG Patch in this encoding (RFC 8072).
    pub fn patch_media_type(self) -> &'static str {
        match self {
            MessageEncoding::Json => YANG_PATCH_JSON,
            MessageEncoding::Xml => YANG_PATCH_XML,
        }
    }

    fn legacy_data_media_types(self) -> &'static [&'static str] {
        match self {
            MessageEncoding::Json => &[APPLICATION_JSON],
            MessageEncoding::Xml => &[APPLICATION_XML, TEXT_XML],
        }
    }

    /// Whether a media type essence denotes YANG data in this encoding,
    /// including the legacy pre-RFC 8040 media types.
    pub fn is_data_media_type(self, essence: &str) -> bool {
        essence == self.data_media_type() || self.legacy_data_media_types().contains(&essence)
    }

    /// Whether a media type essence denotes a YANG Patch in this encoding.
    pub fn is_patch_media_type(self, essence: &str) -> bool {
        essence == self.patch_media_type()
    }

    /// Name used for this encoding in event stream URLs.
    pub fn stream_name(self) -> &'static str {
        match self {
            MessageEncoding::Json => "json",
            MessageEncoding::Xml => "xml",
        }
    }

    pub fn from_stream_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|encoding| encoding.stream_name() == name)
    }
}

impl std::fmt::Display for MessageEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.stream_name())
    }
}
