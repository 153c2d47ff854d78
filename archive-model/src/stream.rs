use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Classifies an [`ArchiveStream`] and, through that, which storage
/// container it belongs in (see [`ArchiveStreamType::is_public`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveStreamType {
    UserVideo,
    UserAudio,
    StitchedAudio,
}

impl ArchiveStreamType {
    /// Name as stored in the `ChatArchiveType` lookup table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStreamType::UserVideo => "USER_VIDEO",
            ArchiveStreamType::UserAudio => "USER_AUDIO",
            ArchiveStreamType::StitchedAudio => "STITCHED_AUDIO",
        }
    }

    /// Stitched audio is the only anonymized, CDN-public artifact; every
    /// other stream type holds raw per-user media and stays private.
    pub fn is_public(&self) -> bool {
        matches!(self, ArchiveStreamType::StitchedAudio)
    }
}

/// An in-pipeline handle to a media artifact, as it flows from F through
/// S and W into P.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStream {
    /// Relative path in storage; also the object key in both containers.
    pub filename: String,
    pub stream_type: ArchiveStreamType,
    pub length_ms: Option<i64>,
    pub users: BTreeSet<i64>,
    pub offset_ms: i64,
    pub waveform_data: Option<String>,
    pub waveform_filename: Option<String>,
}

impl ArchiveStream {
    pub fn new(filename: impl Into<String>, stream_type: ArchiveStreamType) -> Self {
        Self {
            filename: filename.into(),
            stream_type,
            length_ms: None,
            users: BTreeSet::new(),
            offset_ms: 0,
            waveform_data: None,
            waveform_filename: None,
        }
    }

    pub fn with_users(mut self, users: impl IntoIterator<Item = i64>) -> Self {
        self.users = users.into_iter().collect();
        self
    }

    pub fn with_offset_ms(mut self, offset_ms: i64) -> Self {
        self.offset_ms = offset_ms.max(0);
        self
    }

    pub fn with_length_ms(mut self, length_ms: i64) -> Self {
        self.length_ms = Some(length_ms.max(0));
        self
    }

    /// File extension without the leading dot, lower-cased, used to
    /// derive the `mime_type_id` in P.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Output of F: the ordered set of per-participant streams discovered
/// for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub streams: Vec<ArchiveStream>,
}

impl ArchiveManifest {
    pub fn new(mut streams: Vec<ArchiveStream>) -> Self {
        streams.sort_by(|a, b| {
            a.offset_ms
                .cmp(&b.offset_ms)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Self { streams }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_orders_by_offset_then_filename() {
        let a = ArchiveStream::new("b.mp3", ArchiveStreamType::UserAudio).with_offset_ms(100);
        let b = ArchiveStream::new("a.mp3", ArchiveStreamType::UserAudio).with_offset_ms(100);
        let c = ArchiveStream::new("z.mp3", ArchiveStreamType::UserAudio).with_offset_ms(50);

        let manifest = ArchiveManifest::new(vec![a, b, c]);
        let names: Vec<_> = manifest.streams.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["z.mp3", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn stitched_audio_is_the_only_public_type() {
        assert!(ArchiveStreamType::StitchedAudio.is_public());
        assert!(!ArchiveStreamType::UserAudio.is_public());
        assert!(!ArchiveStreamType::UserVideo.is_public());
    }
}
