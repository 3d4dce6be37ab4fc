use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Display language supplied by the host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ar];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "ar" | "arabic" => Some(Language::Ar),
            _ => None,
        }
    }

    pub fn strings(&self) -> &'static Strings {
        match self {
            Language::En => &EN,
            Language::Ar => &AR,
        }
    }

    pub fn scheduled_sentence(&self, date: Option<&str>, time: Option<&str>) -> Option<String> {
        let sentence = match (self, date, time) {
            (_, None, None) => return None,
            (Language::En, Some(d), Some(t)) => format!("Your session is booked for {} at {}.", d, t),
            (Language::En, Some(d), None) => format!("Your session is booked for {}.", d),
            (Language::En, None, Some(t)) => format!("Your session is booked at {}.", t),
            (Language::Ar, Some(d), Some(t)) => format!("تم حجز جلستك يوم {} الساعة {}.", d, t),
            (Language::Ar, Some(d), None) => format!("تم حجز جلستك يوم {}.", d),
            (Language::Ar, None, Some(t)) => format!("تم حجز جلستك الساعة {}.", t),
        };
        Some(sentence)
    }

    pub fn trainer_line(&self, recipient: &str) -> String {
        match self {
            Language::En => format!("Message sent to {}.", recipient),
            Language::Ar => format!("تم إرسال الرسالة إلى {}.", recipient),
        }
    }
}

/// Shared handle on the active display language.
#[derive(Debug, Clone, Default)]
pub struct Locale {
    current: Arc<RwLock<Language>>,
}

impl Locale {
    pub fn new(language: Language) -> Self {
        Self {
            current: Arc::new(RwLock::new(language)),
        }
    }

    pub fn language(&self) -> Language {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, language: Language) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = language;
    }

    pub fn strings(&self) -> &'static Strings {
        self.language().strings()
    }
}

/// Fixed user-visible strings for one language.
pub struct Strings {
    pub send_failed: &'static str,
    /// Text the assistant embeds in a reply to offer the suggested plan for sale.
    pub buy_marker: &'static str,
    pub new_conversation: &'static str,
    pub no_conversations: &'static str,
    pub status_ok: &'static str,
    pub status_failed: &'static str,
    pub search_title: &'static str,
    pub schedule_title: &'static str,
    pub plan_created_title: &'static str,
    pub plans_suggested_title: &'static str,
    pub profile_updated_title: &'static str,
    pub settings_updated_title: &'static str,
    pub progress_title: &'static str,
    pub trainer_message_title: &'static str,
}

static EN: Strings = Strings {
    send_failed: "Sorry, something went wrong. Please try again.",
    buy_marker: "Buy now",
    new_conversation: "New conversation",
    no_conversations: "No conversations yet.",
    status_ok: "done",
    status_failed: "failed",
    search_title: "Search results",
    schedule_title: "Session scheduled",
    plan_created_title: "Workout plan",
    plans_suggested_title: "Suggested plans",
    profile_updated_title: "Profile updated",
    settings_updated_title: "Settings updated",
    progress_title: "Progress",
    trainer_message_title: "Message to trainer",
};

static AR: Strings = Strings {
    send_failed: "عذراً، حدث خطأ ما. يرجى المحاولة مرة أخرى.",
    buy_marker: "اشترِ الآن",
    new_conversation: "محادثة جديدة",
    no_conversations: "لا توجد محادثات بعد.",
    status_ok: "تم",
    status_failed: "فشل",
    search_title: "نتائج البحث",
    schedule_title: "تم حجز الجلسة",
    plan_created_title: "خطة التمرين",
    plans_suggested_title: "خطط مقترحة",
    profile_updated_title: "تم تحديث الملف الشخصي",
    settings_updated_title: "تم تحديث الإعدادات",
    progress_title: "التقدم",
    trainer_message_title: "رسالة إلى المدرب",
};

/// True when `content` carries the buy affordance in any display language,
/// so replies stay actionable after the user switches language.
pub fn contains_buy_marker(content: &str) -> bool {
    let lowered = content.to_lowercase();
    Language::ALL
        .iter()
        .any(|lang| lowered.contains(&lang.strings().buy_marker.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(Language::from_code("EN"), Some(Language::En));
        assert_eq!(Language::from_code(" ar "), Some(Language::Ar));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn test_buy_marker_detection() {
        assert!(contains_buy_marker("Great choice! Tap BUY NOW to start."));
        assert!(contains_buy_marker("هذه الخطة مناسبة لك. اشترِ الآن"));
        assert!(!contains_buy_marker("Here is your plan"));
    }

    #[test]
    fn test_scheduled_sentence_variants() {
        assert_eq!(
            Language::En.scheduled_sentence(Some("2024-05-01"), Some("18:00")),
            Some("Your session is booked for 2024-05-01 at 18:00.".to_string())
        );
        assert_eq!(Language::Ar.scheduled_sentence(None, None), None);
        assert!(Language::Ar
            .scheduled_sentence(Some("2024-05-01"), None)
            .unwrap()
            .contains("2024-05-01"));
    }

    #[test]
    fn test_locale_is_shared_between_clones() {
        let locale = Locale::new(Language::En);
        let other = locale.clone();
        other.set(Language::Ar);
        assert_eq!(locale.language(), Language::Ar);
        assert_eq!(locale.strings().buy_marker, "اشترِ الآن");
    }

    #[test]
    fn test_failure_text_is_non_empty_everywhere() {
        for lang in Language::ALL {
            assert!(!lang.strings().send_failed.is_empty());
        }
    }
}
