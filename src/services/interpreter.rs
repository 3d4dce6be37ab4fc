//! Turns the structured results attached to assistant replies into
//! displayable fragments.
//!
//! The backend's action set is open-ended. Every result is first classified
//! into an [`Interpretation`]; anything that is not a recognised action with
//! a usable payload lands in [`Interpretation::Fallback`], which only ever
//! shows the action name, its status and the error text.

use std::fmt;

use serde_json::{Map, Value};

use super::i18n::Language;
use crate::models::{parse_timestamp, ActionResult, PlanId};

/// Suggested plans shown per result.
pub const MAX_SUGGESTED_PLANS: usize = 3;
/// Plan descriptions are cut to this many characters.
pub const DESCRIPTION_LIMIT: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Search(Vec<NamedItem>),
    Schedule(ScheduleInfo),
    PlanCreated(String),
    PlansSuggested(Vec<SuggestedPlan>),
    ProfileUpdated(Vec<(String, String)>),
    SettingsUpdated(Vec<(String, String)>),
    Progress(String),
    TrainerMessage(String),
    Fallback {
        action: String,
        status: String,
        error: Option<String>,
    },
}

/// A search hit with whatever localized names the backend sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedItem {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub name: Option<String>,
}

impl NamedItem {
    fn from_value(value: &Value) -> Option<Self> {
        let item = match value {
            Value::String(s) => NamedItem {
                name: non_empty(s),
                ..Default::default()
            },
            Value::Object(map) => NamedItem {
                name_en: str_field(map, &["name_en", "title_en"]),
                name_ar: str_field(map, &["name_ar", "title_ar"]),
                name: str_field(map, &["name", "title"]),
            },
            _ => return None,
        };
        if item.best_name(Language::En).is_some() {
            Some(item)
        } else {
            None
        }
    }

    /// The name in `lang`, else the untagged name, else any other language.
    pub fn best_name(&self, lang: Language) -> Option<&str> {
        let (own, other) = match lang {
            Language::En => (&self.name_en, &self.name_ar),
            Language::Ar => (&self.name_ar, &self.name_en),
        };
        own.as_deref()
            .or(self.name.as_deref())
            .or(other.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleInfo {
    pub sentence_en: Option<String>,
    pub sentence_ar: Option<String>,
    pub sentence: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl ScheduleInfo {
    fn from_map(map: &Map<String, Value>) -> Self {
        let mut info = ScheduleInfo {
            sentence_en: str_field(map, &["message_en", "formatted_en"]),
            sentence_ar: str_field(map, &["message_ar", "formatted_ar"]),
            sentence: str_field(map, &["message", "formatted"]),
            date: str_field(map, &["resolved_date", "date"]),
            time: str_field(map, &["resolved_time", "time"]),
        };

        if info.date.is_none() || info.time.is_none() {
            if let Some(ts) = str_field(map, &["resolved_datetime", "datetime", "start"])
                .as_deref()
                .and_then(parse_timestamp)
            {
                info.date.get_or_insert_with(|| ts.format("%Y-%m-%d").to_string());
                info.time.get_or_insert_with(|| ts.format("%H:%M").to_string());
            }
        }
        info
    }

    /// Server sentence for `lang`, else the untagged one, else the other
    /// language's. Only without any server sentence is one composed from the
    /// resolved date and time.
    pub fn sentence(&self, lang: Language) -> Option<String> {
        let (own, other) = match lang {
            Language::En => (&self.sentence_en, &self.sentence_ar),
            Language::Ar => (&self.sentence_ar, &self.sentence_en),
        };
        own.clone()
            .or_else(|| self.sentence.clone())
            .or_else(|| other.clone())
            .or_else(|| lang.scheduled_sentence(self.date.as_deref(), self.time.as_deref()))
    }

    fn is_empty(&self) -> bool {
        self.sentence_en.is_none()
            && self.sentence_ar.is_none()
            && self.sentence.is_none()
            && self.date.is_none()
            && self.time.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestedPlan {
    pub id: Option<PlanId>,
    pub names: NamedItem,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
}

impl SuggestedPlan {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let id = match map.get("id") {
            Some(Value::Number(n)) => n.as_u64().map(PlanId::Number),
            Some(Value::String(s)) => non_empty(s).map(PlanId::Text),
            _ => None,
        };
        Some(SuggestedPlan {
            id,
            names: NamedItem {
                name_en: str_field(map, &["name_en", "title_en"]),
                name_ar: str_field(map, &["name_ar", "title_ar"]),
                name: str_field(map, &["name", "title"]),
            },
            description_en: str_field(map, &["description_en"]),
            description_ar: str_field(map, &["description_ar"]),
            description: str_field(map, &["description"]),
            price: map.get("price").and_then(number_field),
        })
    }

    pub fn description(&self, lang: Language) -> Option<&str> {
        let (own, other) = match lang {
            Language::En => (&self.description_en, &self.description_ar),
            Language::Ar => (&self.description_ar, &self.description_en),
        };
        own.as_deref()
            .or(self.description.as_deref())
            .or(other.as_deref())
    }
}

/// Classify one result. Never fails: anything unusable becomes `Fallback`.
pub fn interpret(result: &ActionResult) -> Interpretation {
    let fallback = || Interpretation::Fallback {
        action: result.action.clone(),
        status: result.status.clone(),
        error: result.error.clone().filter(|e| !e.trim().is_empty()),
    };

    if !result.is_ok() {
        return fallback();
    }

    let data = &result.data;
    let interpreted = match result.action.as_str() {
        "search_programs" | "search_exercises" | "search" => {
            let keys = ["results", "items", "programs", "exercises"];
            let items: Vec<NamedItem> = list_payload(data, &keys)
                .iter()
                .filter_map(NamedItem::from_value)
                .collect();
            (!items.is_empty()).then_some(Interpretation::Search(items))
        }
        "schedule_session" | "book_session" | "schedule" => data
            .as_object()
            .map(ScheduleInfo::from_map)
            .filter(|info| !info.is_empty())
            .map(Interpretation::Schedule),
        "create_workout_plan" | "create_plan" => match data {
            Value::Object(map) => ["response", "plan", "text"]
                .iter()
                .find_map(|k| map.get(*k).and_then(raw_text)),
            other => raw_text(other),
        }
        .map(Interpretation::PlanCreated),
        "suggest_programs" | "suggest_plans" | "recommend_program" => {
            let plans: Vec<SuggestedPlan> = list_payload(data, &["plans", "programs"])
                .iter()
                .filter_map(SuggestedPlan::from_value)
                .collect();
            (!plans.is_empty()).then_some(Interpretation::PlansSuggested(plans))
        }
        "update_profile" => field_dump(data).map(Interpretation::ProfileUpdated),
        "update_settings" => field_dump(data).map(Interpretation::SettingsUpdated),
        "check_progress" => line_payload(data, &["status", "summary", "message", "progress"])
            .map(Interpretation::Progress),
        "message_trainer" | "contact_trainer" => {
            line_payload(data, &["recipient", "trainer_name", "trainer"])
                .map(Interpretation::TrainerMessage)
        }
        _ => None,
    };

    interpreted.unwrap_or_else(fallback)
}

/// The first plan of the first plan suggestion in `results`.
pub fn purchase_candidate(results: &[ActionResult]) -> Option<SuggestedPlan> {
    results.iter().find_map(|result| match interpret(result) {
        Interpretation::PlansSuggested(plans) => plans.into_iter().next(),
        _ => None,
    })
}

/// A rendered action result.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub title: String,
    pub ok: bool,
    pub error: Option<String>,
    pub body: FragmentBody,
    status_label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentBody {
    Empty,
    Items(Vec<String>),
    Line(String),
    Verbatim(String),
    Plans(Vec<PlanLine>),
    Fields(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanLine {
    pub name: String,
    pub description: Option<String>,
}

pub fn render(result: &ActionResult, lang: Language) -> Fragment {
    let strings = lang.strings();
    let (title, body) = match interpret(result) {
        Interpretation::Search(items) => (
            strings.search_title.to_string(),
            FragmentBody::Items(
                items
                    .iter()
                    .filter_map(|i| i.best_name(lang).map(str::to_string))
                    .collect(),
            ),
        ),
        Interpretation::Schedule(info) => (
            strings.schedule_title.to_string(),
            info.sentence(lang)
                .map(FragmentBody::Line)
                .unwrap_or(FragmentBody::Empty),
        ),
        Interpretation::PlanCreated(text) => (
            strings.plan_created_title.to_string(),
            FragmentBody::Verbatim(text),
        ),
        Interpretation::PlansSuggested(plans) => (
            strings.plans_suggested_title.to_string(),
            FragmentBody::Plans(
                plans
                    .iter()
                    .take(MAX_SUGGESTED_PLANS)
                    .filter_map(|plan| {
                        Some(PlanLine {
                            name: plan.names.best_name(lang)?.to_string(),
                            description: plan
                                .description(lang)
                                .map(|d| truncate(d, DESCRIPTION_LIMIT)),
                        })
                    })
                    .collect(),
            ),
        ),
        Interpretation::ProfileUpdated(fields) => (
            strings.profile_updated_title.to_string(),
            FragmentBody::Fields(fields),
        ),
        Interpretation::SettingsUpdated(fields) => (
            strings.settings_updated_title.to_string(),
            FragmentBody::Fields(fields),
        ),
        Interpretation::Progress(status) => {
            (strings.progress_title.to_string(), FragmentBody::Line(status))
        }
        Interpretation::TrainerMessage(recipient) => (
            strings.trainer_message_title.to_string(),
            FragmentBody::Line(lang.trainer_line(&recipient)),
        ),
        Interpretation::Fallback { action, .. } => (action, FragmentBody::Empty),
    };

    let ok = result.is_ok();
    Fragment {
        title,
        ok,
        error: if ok {
            None
        } else {
            result.error.clone().filter(|e| !e.trim().is_empty())
        },
        body,
        status_label: if ok {
            strings.status_ok
        } else {
            strings.status_failed
        },
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.status_label, self.title)?;
        if let Some(error) = &self.error {
            writeln!(f, "  ! {}", error)?;
        }
        match &self.body {
            FragmentBody::Empty => {}
            FragmentBody::Items(items) => {
                for item in items {
                    writeln!(f, "  - {}", item)?;
                }
            }
            FragmentBody::Line(line) => writeln!(f, "  {}", line)?,
            FragmentBody::Verbatim(text) => {
                for line in text.lines() {
                    writeln!(f, "  {}", line)?;
                }
            }
            FragmentBody::Plans(plans) => {
                for (i, plan) in plans.iter().enumerate() {
                    match &plan.description {
                        Some(d) => writeln!(f, "  {}. {}: {}", i + 1, plan.name, d)?,
                        None => writeln!(f, "  {}. {}", i + 1, plan.name)?,
                    }
                }
            }
            FragmentBody::Fields(fields) => {
                for (key, value) in fields {
                    writeln!(f, "  {}: {}", key, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Cut `text` to `limit` characters, appending an ellipsis when shortened.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut.trim_end())
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Untrimmed text, for content the backend already formatted.
fn raw_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str).and_then(non_empty))
}

fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|p: &f64| p.is_finite() && *p >= 0.0)
}

/// The payload itself when it is a list, else the first list under `keys`.
fn list_payload<'a>(data: &'a Value, keys: &[&str]) -> &'a [Value] {
    match data {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn line_payload(data: &Value, keys: &[&str]) -> Option<String> {
    match data {
        Value::String(s) => non_empty(s),
        Value::Object(map) => str_field(map, keys),
        _ => None,
    }
}

/// Every updated field, nested values kept as compact JSON.
fn field_dump(data: &Value) -> Option<Vec<(String, String)>> {
    let map = data.as_object()?;
    let fields = ["updated_fields", "updated", "fields"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_object))
        .unwrap_or(map);

    let dump: Vec<(String, String)> = fields
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();
    (!dump.is_empty()).then_some(dump)
}
