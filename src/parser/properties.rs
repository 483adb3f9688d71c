use serde::Serialize;

use crate::notion::model::{plain_text, Property};

/// Plain value extracted from one Notion property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    /// Non-empty text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) if !t.is_empty() => Some(t.as_str()),
            _ => None,
        }
    }

    /// Labels carried by the value. A single non-empty text counts as one label.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items,
            Self::Text(t) if !t.is_empty() => vec![t],
            _ => Vec::new(),
        }
    }

    /// Human-readable form; lists are joined with `, `. `None` for null or empty.
    pub fn to_display(&self) -> Option<String> {
        let s = match self {
            Self::Null => return None,
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(t) => t.clone(),
            Self::List(items) => items.join(", "),
        };
        (!s.is_empty()).then_some(s)
    }
}

/// Map a property to its plain value. Never fails; unknown or malformed
/// properties (already degraded at decode time) yield `Null`.
pub fn extract(property: &Property) -> PropertyValue {
    match property {
        Property::Title(runs) | Property::RichText(runs) => PropertyValue::Text(plain_text(runs)),
        Property::Select(option) => option
            .as_ref()
            .map(|o| PropertyValue::Text(o.name.clone()))
            .unwrap_or(PropertyValue::Null),
        Property::MultiSelect(options) => {
            PropertyValue::List(options.iter().map(|o| o.name.clone()).collect())
        }
        Property::Date(date) => date
            .as_ref()
            .and_then(|d| d.start.clone())
            .map(PropertyValue::Text)
            .unwrap_or(PropertyValue::Null),
        Property::Checkbox(b) => PropertyValue::Bool(*b),
        Property::Number(n) => n.map(PropertyValue::Number).unwrap_or(PropertyValue::Null),
        Property::Url(s) | Property::Email(s) | Property::PhoneNumber(s) => s
            .clone()
            .map(PropertyValue::Text)
            .unwrap_or(PropertyValue::Null),
        Property::Files(files) => files
            .first()
            .and_then(|f| f.url())
            .map(|u| PropertyValue::Text(u.to_string()))
            .unwrap_or(PropertyValue::Null),
        Property::People(people) => PropertyValue::List(
            people
                .iter()
                .map(|p| {
                    p.name
                        .clone()
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| p.id.clone())
                })
                .collect(),
        ),
        Property::Unknown { .. } => PropertyValue::Null,
    }
}
