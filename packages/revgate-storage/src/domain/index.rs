//! Declarative secondary index definitions
//!
//! An index is described as data (filter predicates + emitted key + optional
//! built-in reducer) instead of executable code. The store adapter decides how
//! to interpret it; this crate only knows how to turn a definition into the
//! design document that gets installed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::Document;
use crate::{Result, StoreError};

/// Id prefix of installed index documents
pub const DESIGN_PREFIX: &str = "_design/";

/// Language tag written into design documents
pub const DECLARATIVE_LANGUAGE: &str = "declarative";

/// Filter applied to candidate documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldPredicate {
    /// `doc[field] == value`
    Equals { field: String, value: Value },
    /// Field present and not `false`, `null`, `0` or `""`
    Truthy { field: String },
    /// Negation of `Truthy` (missing fields are falsy)
    Falsy { field: String },
}

/// Key emitted for every matching document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "field", rename_all = "snake_case")]
pub enum EmitKey {
    /// Value of a body field
    Field(String),
    /// The document `_id`
    DocumentId,
}

/// Built-in reducers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    #[serde(rename = "_count")]
    Count,
    #[serde(rename = "_sum")]
    Sum,
    #[serde(rename = "_stats")]
    Stats,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Count => "_count",
            Reducer::Sum => "_sum",
            Reducer::Stats => "_stats",
        }
    }
}

/// A named secondary index
///
/// # Examples
///
/// ```rust
/// use revgate_storage::domain::{EmitKey, IndexDefinition};
///
/// let index = IndexDefinition::new("active_users")
///     .when_equals("type", "user")
///     .when_truthy("active")
///     .emit(EmitKey::Field("id".into()));
///
/// let design = index.design_document();
/// assert_eq!(design.id, "_design/active_users");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub filter: Vec<FieldPredicate>,
    pub key: EmitKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<Reducer>,
}

impl IndexDefinition {
    /// Index with no filter that emits the document id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: Vec::new(),
            key: EmitKey::DocumentId,
            reduce: None,
        }
    }

    pub fn when_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.push(FieldPredicate::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn when_truthy(mut self, field: impl Into<String>) -> Self {
        self.filter.push(FieldPredicate::Truthy {
            field: field.into(),
        });
        self
    }

    pub fn when_falsy(mut self, field: impl Into<String>) -> Self {
        self.filter.push(FieldPredicate::Falsy {
            field: field.into(),
        });
        self
    }

    pub fn emit(mut self, key: EmitKey) -> Self {
        self.key = key;
        self
    }

    pub fn reduce(mut self, reducer: Reducer) -> Self {
        self.reduce = Some(reducer);
        self
    }

    /// Id of the installed design document
    pub fn design_id(&self) -> String {
        format!("{}{}", DESIGN_PREFIX, self.name)
    }

    /// Build the design document for this index (no revision: always a create)
    pub fn design_document(&self) -> Document {
        let mut view = Map::new();
        view.insert(
            "map".to_string(),
            json!({ "filter": self.filter, "key": self.key }),
        );
        if let Some(reducer) = self.reduce {
            view.insert("reduce".to_string(), json!(reducer.as_str()));
        }

        let mut views = Map::new();
        views.insert(self.name.clone(), Value::Object(view));

        Document::new(self.design_id())
            .with_field("language", DECLARATIVE_LANGUAGE)
            .with_field("views", Value::Object(views))
    }
}

/// Ordered set of index definitions, unique by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexCatalog {
    definitions: Vec<IndexDefinition>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate names
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = IndexDefinition>,
    ) -> Result<Self> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.add(definition)?;
        }
        Ok(catalog)
    }

    pub fn add(&mut self, definition: IndexDefinition) -> Result<()> {
        if self.get(&definition.name).is_some() {
            return Err(StoreError::config(format!(
                "Duplicate index name: {}",
                definition.name
            )));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&IndexDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.definitions.iter()
    }

    /// Task/user lookups used by the task tracker front end
    pub fn task_tracker() -> Self {
        let asana_task = || {
            IndexDefinition::new("")
                .when_equals("type", "task")
                .when_equals("source", "asana")
        };
        let named = |base: IndexDefinition, name: &str| IndexDefinition {
            name: name.to_string(),
            ..base
        };
        let by_id = EmitKey::Field("id".into());
        let by_workspace = EmitKey::Field("workspaceId".into());

        let definitions = vec![
            named(asana_task().emit(by_id.clone()), "asana_tasks_index"),
            named(
                asana_task().emit(by_workspace.clone()),
                "asana_tasks_index_workspace",
            ),
            named(
                asana_task()
                    .when_falsy("completed")
                    .emit(by_workspace.clone()),
                "asana_tasks_index_workspace_incomplete",
            ),
            named(
                asana_task().when_falsy("active").emit(by_workspace.clone()),
                "asana_tasks_index_workspace_inactive_tasks",
            ),
            named(
                asana_task()
                    .when_falsy("active")
                    .when_falsy("completed")
                    .emit(by_workspace),
                "asana_tasks_index_workspace_inactive_tasks_incomplete",
            ),
            IndexDefinition::new("active_user_index")
                .when_equals("type", "user")
                .when_truthy("active")
                .emit(by_id.clone()),
            IndexDefinition::new("active_tasks")
                .when_equals("type", "task")
                .when_truthy("active"),
            IndexDefinition::new("active_uncompleted_tasks")
                .when_equals("type", "task")
                .when_truthy("active")
                .when_falsy("completed"),
            named(asana_task().emit(by_id.clone()), "task_by_asana_id"),
            named(
                asana_task().when_truthy("active").emit(by_id),
                "active_tasks_by_asana_id",
            ),
        ];

        Self { definitions }
    }
}

impl<'a> IntoIterator for &'a IndexCatalog {
    type Item = &'a IndexDefinition;
    type IntoIter = std::slice::Iter<'a, IndexDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_design_document_shape() {
        let index = IndexDefinition::new("open_tasks")
            .when_equals("type", "task")
            .when_falsy("completed")
            .emit(EmitKey::Field("workspaceId".into()))
            .reduce(Reducer::Count);

        let doc = index.design_document();
        assert_eq!(doc.id, "_design/open_tasks");
        assert!(doc.rev.is_none());
        assert_eq!(doc.get("language"), Some(&json!("declarative")));

        let view = &doc.get("views").unwrap()["open_tasks"];
        assert_eq!(view["reduce"], json!("_count"));
        assert_eq!(
            view["map"]["filter"],
            json!([
                {"op": "equals", "field": "type", "value": "task"},
                {"op": "falsy", "field": "completed"}
            ])
        );
        assert_eq!(
            view["map"]["key"],
            json!({"from": "field", "field": "workspaceId"})
        );
    }

    #[test]
    fn test_design_document_without_reducer() {
        let doc = IndexDefinition::new("all").design_document();
        let view = &doc.get("views").unwrap()["all"];
        assert!(view.get("reduce").is_none());
        assert_eq!(view["map"]["key"], json!({"from": "document_id"}));
    }

    #[test]
    fn test_catalog_rejects_duplicate_names() {
        let result = IndexCatalog::from_definitions(vec![
            IndexDefinition::new("a"),
            IndexDefinition::new("b"),
            IndexDefinition::new("a"),
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Config);
        assert!(err.message.contains("a"));
    }

    #[test]
    fn test_task_tracker_catalog() {
        let catalog = IndexCatalog::task_tracker();
        assert_eq!(catalog.len(), 10);

        let names: HashSet<_> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), 10);
        assert!(names.contains("active_user_index"));
        assert!(names.contains("asana_tasks_index_workspace_inactive_tasks_incomplete"));

        let incomplete = catalog
            .get("asana_tasks_index_workspace_incomplete")
            .unwrap();
        assert_eq!(incomplete.key, EmitKey::Field("workspaceId".into()));
        assert!(incomplete.filter.contains(&FieldPredicate::Falsy {
            field: "completed".into()
        }));
    }

    #[test]
    fn test_definition_serde() {
        let index = IndexDefinition::new("x").when_truthy("active");
        let json = serde_json::to_string(&index).unwrap();
        let back: IndexDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}
