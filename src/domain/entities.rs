//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{lazy::LazyAttribute, logic::ConditionalLogic, types::NotificationEvent};

/// Structural definition of a form: its fields, notifications and documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub notifications: Vec<NotificationTarget>,
    #[serde(default)]
    pub documents: Vec<DocumentSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_label: Option<String>,
    #[serde(default)]
    pub css_class: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<FieldInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(skip_deserializing)]
    display_label: LazyAttribute<String>,
    #[serde(skip_deserializing)]
    css_classes: LazyAttribute<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInput {
    pub id: String,
    pub label: String,
}

/// A notification the host can send, possibly with generated documents attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub event: NotificationEvent,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
}

/// Settings for one generated document of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub template: String,
    pub filename: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Notification ids this document is attached to, in attachment order.
    #[serde(default)]
    pub notifications: Vec<String>,
    #[serde(default)]
    pub always_save: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// A submitted data record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: u64,
    pub form_id: u64,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            admin_label: None,
            css_class: String::new(),
            inputs: Vec::new(),
            conditional_logic: None,
            display_label: LazyAttribute::new(),
            css_classes: LazyAttribute::new(),
        }
    }

    /// Label shown in administrative output; the admin label wins when set.
    pub fn display_label(&self) -> &str {
        self.display_label.get_or_init(|| {
            self.admin_label
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .unwrap_or(self.label.as_str())
                .to_string()
        })
    }

    pub fn css_classes(&self) -> &[String] {
        self.css_classes.get_or_init(|| {
            self.css_class
                .split_whitespace()
                .map(str::to_string)
                .collect()
        })
    }

    /// Force every lazily computed attribute.
    pub fn materialize(&self) {
        self.display_label();
        self.css_classes();
    }
}

impl FormDefinition {
    /// Force lazy attributes on every field.
    pub fn materialize(&self) {
        for field in &self.fields {
            field.materialize();
        }
    }

    /// Serialized form with every lazy attribute materialized.
    ///
    /// Serializing a form directly yields different bytes before and after a
    /// lazy attribute is first read; this is the only form fit for hashing.
    pub fn canonical(&self) -> Result<Value, serde_json::Error> {
        self.materialize();
        serde_json::to_value(self)
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn notification(&self, id: &str) -> Option<&NotificationTarget> {
        self.notifications.iter().find(|target| target.id == id)
    }

    pub fn document(&self, id: &str) -> Option<&DocumentSettings> {
        self.documents.iter().find(|document| document.id == id)
    }

    /// Documents a notification would attach for this entry, in attachment order.
    ///
    /// Inactive documents and documents whose conditional logic hides them (or
    /// fails to evaluate) are left out.
    pub fn attachments_for<'a>(
        &'a self,
        notification_id: &'a str,
        entry: &'a EntryRecord,
    ) -> impl Iterator<Item = &'a DocumentSettings> + 'a {
        self.documents.iter().filter(move |document| {
            document.active
                && document.attaches_to(notification_id)
                && document.visible_for(entry)
        })
    }

    /// Documents whose generated output is kept on disk after dispatch.
    pub fn persisted_documents(&self) -> impl Iterator<Item = &DocumentSettings> {
        self.documents
            .iter()
            .filter(|document| document.always_save || !document.notifications.is_empty())
    }
}

impl DocumentSettings {
    pub fn attaches_to(&self, notification_id: &str) -> bool {
        self.notifications.iter().any(|id| id == notification_id)
    }

    pub fn visible_for(&self, entry: &EntryRecord) -> bool {
        match &self.conditional_logic {
            Some(logic) => logic.evaluate(entry).unwrap_or(false),
            None => true,
        }
    }
}

impl EntryRecord {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_form() -> FormDefinition {
        serde_json::from_value(json!({
            "id": 3,
            "title": "Order",
            "fields": [
                {"id": "1", "type": "text", "label": "Name", "admin_label": "Customer"},
                {"id": "2", "type": "number", "label": "Total", "css_class": "wide  bold"}
            ],
            "notifications": [
                {"id": "admin", "name": "Admin"},
                {"id": "user", "name": "User", "is_active": false}
            ],
            "documents": [
                {"id": "invoice", "template": "invoice", "filename": "invoice",
                 "notifications": ["admin"]},
                {"id": "receipt", "template": "receipt", "filename": "receipt",
                 "notifications": ["admin"], "active": false},
                {"id": "archive", "template": "plain", "filename": "archive",
                 "always_save": true}
            ]
        }))
        .expect("valid form")
    }

    #[test]
    fn lazy_field_attributes_derive_from_source_fields() {
        let form = sample_form();
        let name = form.field("1").expect("field 1");
        let total = form.field("2").expect("field 2");

        assert_eq!(name.display_label(), "Customer");
        assert_eq!(total.display_label(), "Total");
        assert_eq!(total.css_classes(), ["wide".to_string(), "bold".to_string()]);
    }

    #[test]
    fn canonical_form_is_stable_across_first_access() {
        let first = sample_form();
        let second = sample_form();
        second.field("1").expect("field").display_label();

        let raw_first = serde_json::to_value(&first).expect("serialize");
        let raw_second = serde_json::to_value(&second).expect("serialize");
        assert_ne!(raw_first, raw_second);

        assert_eq!(
            first.canonical().expect("canonical"),
            second.canonical().expect("canonical")
        );
    }

    #[test]
    fn attachments_skip_inactive_documents() {
        let form = sample_form();
        let entry = EntryRecord {
            id: 1,
            form_id: 3,
            values: Map::new(),
        };

        let ids: Vec<&str> = form
            .attachments_for("admin", &entry)
            .map(|document| document.id.as_str())
            .collect();
        assert_eq!(ids, ["invoice"]);
    }

    #[test]
    fn persisted_documents_include_attached_and_always_saved() {
        let form = sample_form();
        let ids: Vec<&str> = form
            .persisted_documents()
            .map(|document| document.id.as_str())
            .collect();
        assert_eq!(ids, ["invoice", "receipt", "archive"]);
    }

    #[test]
    fn entry_values_flatten_next_to_ids() {
        let entry: EntryRecord = serde_json::from_value(json!({
            "id": 9,
            "form_id": 3,
            "1": "Ada",
            "is_read": true
        }))
        .expect("valid entry");

        assert_eq!(entry.id, 9);
        assert_eq!(entry.value("1"), Some(&json!("Ada")));
        assert_eq!(entry.value("is_read"), Some(&json!(true)));
    }
}
