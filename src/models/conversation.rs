use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_id", deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(
        default,
        rename = "last_at",
        deserialize_with = "super::lenient_timestamp"
    )]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Title if one was assigned, else the server preview.
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.preview.as_deref().filter(|p| !p.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_prefers_title() {
        let session: Session = serde_json::from_str(
            r#"{"session_id":"s1","title":"Leg day","preview":"how do I squat"}"#,
        )
        .unwrap();
        assert_eq!(session.display_title(), Some("Leg day"));
    }

    #[test]
    fn test_display_title_falls_back_to_preview() {
        let session: Session =
            serde_json::from_str(r#"{"session_id":"s1","title":"  ","preview":"hello"}"#)
                .unwrap();
        assert_eq!(session.display_title(), Some("hello"));

        let bare: Session = serde_json::from_str(r#"{"session_id":"s2"}"#).unwrap();
        assert_eq!(bare.display_title(), None);
    }

    #[test]
    fn test_last_activity_parses_rfc3339() {
        let session: Session = serde_json::from_str(
            r#"{"session_id":"s1","last_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(session.last_activity_at.is_some());

        let naive: Session = serde_json::from_str(
            r#"{"session_id":"s1","last_at":"2024-05-01 10:00:00.123"}"#,
        )
        .unwrap();
        assert!(naive.last_activity_at.is_some());

        let junk: Session =
            serde_json::from_str(r#"{"session_id":"s1","last_at":"yesterday"}"#).unwrap();
        assert!(junk.last_activity_at.is_none());
    }

    #[test]
    fn test_listing_with_numeric_id_and_timestamp() {
        let sessions: Vec<Session> = serde_json::from_str(
            r#"[{"session_id":42,"title":"Cut","last_at":1714557600},
                {"session_id":"s3","last_at":null}]"#,
        )
        .unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "42");
        assert_eq!(sessions[0].display_title(), Some("Cut"));
        assert!(sessions[0].last_activity_at.is_none());
        assert_eq!(sessions[1].id, "s3");
    }

    #[test]
    fn test_missing_session_id_is_rejected() {
        assert!(serde_json::from_str::<Session>(r#"{"session_id":null}"#).is_err());
        assert!(serde_json::from_str::<Session>(r#"{"title":"orphan"}"#).is_err());
    }
}
