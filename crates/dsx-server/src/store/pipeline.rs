//! Declarative aggregation pipelines over JSON documents
//!
//! List views describe what they want as a [`Pipeline`] of [`Stage`]s instead
//! of a query string. Every [`DatasetStore`](super::DatasetStore) backend runs
//! pipelines through [`execute`], so the matching, join and unwind semantics
//! are identical regardless of where documents live.
//!
//! Path semantics follow document-database conventions: dotted paths walk
//! nested objects, `Eq` against an array matches if any element is equal, and
//! `Eq(path, null)` matches both missing and null fields.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Document collections a pipeline can read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Folders,
    Users,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Match predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    Exists(String, bool),
    And(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    /// Some element of the array at the path satisfies the inner filter
    ElemMatch(String, Box<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    pub fn elem_match(path: impl Into<String>, inner: Filter) -> Self {
        Filter::ElemMatch(path.into(), Box::new(inner))
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(path, expected) => eq_matches(get_path(doc, path), expected),
            Filter::In(path, options) => {
                options.iter().any(|o| eq_matches(get_path(doc, path), o))
            },
            Filter::Exists(path, should_exist) => get_path(doc, path).is_some() == *should_exist,
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Nor(filters) => !filters.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
            Filter::ElemMatch(path, inner) => match get_path(doc, path) {
                Some(Value::Array(elements)) => elements.iter().any(|e| inner.matches(e)),
                _ => false,
            },
        }
    }
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort { field: String, direction: SortDirection },
    Skip(usize),
    Limit(usize),
    /// Join: set `as_field` to the array of `from` documents whose
    /// `foreign_field` equals this document's `local_field`
    Lookup {
        from: Collection,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// Replace the array at `field` with its first element (removed if empty)
    First(String),
    /// Set `field` to the value found at `path` (removed if absent)
    SetFromPath { field: String, path: String },
    /// One output document per element of the array at the path
    Unwind(String),
    /// Run independent sub-pipelines over the same input; emits a single
    /// document with one array field per facet
    Facet(Vec<(String, Vec<Stage>)>),
    /// Emit a single document `{ <field>: <number of input documents> }`,
    /// or nothing when the input is empty
    Count(String),
}

/// An ordered list of stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn extend(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Collections joined by any stage, including inside facets
    pub fn lookup_collections(&self) -> BTreeSet<Collection> {
        let mut found = BTreeSet::new();
        collect_lookups(&self.stages, &mut found);
        found
    }
}

fn collect_lookups(stages: &[Stage], found: &mut BTreeSet<Collection>) {
    for stage in stages {
        match stage {
            Stage::Lookup { from, .. } => {
                found.insert(*from);
            },
            Stage::Facet(facets) => {
                for (_, sub) in facets {
                    collect_lookups(sub, found);
                }
            },
            _ => {},
        }
    }
}

/// Source of documents for `Lookup` stages
pub trait LookupSource {
    fn documents(&self, collection: Collection) -> &[Value];
}

/// Documents of every collection a pipeline may touch, loaded up front
#[derive(Debug, Default)]
pub struct Snapshot {
    collections: BTreeMap<Collection, Vec<Value>>,
}

impl Snapshot {
    pub fn insert(&mut self, collection: Collection, docs: Vec<Value>) {
        self.collections.insert(collection, docs);
    }

    /// Run `pipeline` with `collection` as input
    pub fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Vec<Value> {
        execute(self.documents(collection).to_vec(), pipeline, self)
    }
}

impl LookupSource for Snapshot {
    fn documents(&self, collection: Collection) -> &[Value] {
        self.collections.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Run `pipeline` over `input`
pub fn execute(input: Vec<Value>, pipeline: &Pipeline, source: &dyn LookupSource) -> Vec<Value> {
    run_stages(input, &pipeline.stages, source)
}

fn run_stages(mut docs: Vec<Value>, stages: &[Stage], source: &dyn LookupSource) -> Vec<Value> {
    for stage in stages {
        docs = run_stage(docs, stage, source);
    }
    docs
}

fn run_stage(docs: Vec<Value>, stage: &Stage, source: &dyn LookupSource) -> Vec<Value> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
        Stage::Sort { field, direction } => {
            let mut docs = docs;
            docs.sort_by(|a, b| {
                let ord = compare_values(get_path(a, field), get_path(b, field));
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
            docs
        },
        Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
        Stage::Limit(n) => docs.into_iter().take(*n).collect(),
        Stage::Lookup {
            from,
            local_field,
            foreign_field,
            as_field,
        } => {
            let foreign = source.documents(*from);
            docs.into_iter()
                .map(|mut doc| {
                    let joined: Vec<Value> = match get_path(&doc, local_field) {
                        Some(local) if !local.is_null() => foreign
                            .iter()
                            .filter(|f| join_matches(local, get_path(f, foreign_field)))
                            .cloned()
                            .collect(),
                        _ => Vec::new(),
                    };
                    set_path(&mut doc, as_field, Some(Value::Array(joined)));
                    doc
                })
                .collect()
        },
        Stage::First(field) => docs
            .into_iter()
            .map(|mut doc| {
                let first = match get_path(&doc, field) {
                    Some(Value::Array(items)) => items.first().cloned(),
                    Some(other) => Some(other.clone()),
                    None => None,
                };
                set_path(&mut doc, field, first);
                doc
            })
            .collect(),
        Stage::SetFromPath { field, path } => docs
            .into_iter()
            .map(|mut doc| {
                let value = get_path(&doc, path).cloned();
                set_path(&mut doc, field, value);
                doc
            })
            .collect(),
        Stage::Unwind(path) => docs
            .into_iter()
            .flat_map(|doc| match get_path(&doc, path) {
                Some(Value::Array(elements)) => elements
                    .clone()
                    .into_iter()
                    .map(|element| {
                        let mut copy = doc.clone();
                        set_path(&mut copy, path, Some(element));
                        copy
                    })
                    .collect::<Vec<_>>(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => vec![doc],
            })
            .collect(),
        Stage::Facet(facets) => {
            let mut out = Map::new();
            for (name, sub) in facets {
                let result = run_stages(docs.clone(), sub, source);
                out.insert(name.clone(), Value::Array(result));
            }
            vec![Value::Object(out)]
        },
        Stage::Count(field) => {
            if docs.is_empty() {
                Vec::new()
            } else {
                let mut out = Map::new();
                out.insert(field.clone(), Value::from(docs.len()));
                vec![Value::Object(out)]
            }
        },
    }
}

/// Resolve a dotted path inside nested objects
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.as_object()?.get(key))
}

/// Set (or remove, for `None`) the value at a dotted path, creating objects as needed
pub fn set_path(doc: &mut Value, path: &str, value: Option<Value>) {
    let mut keys: Vec<&str> = path.split('.').collect();
    let Some(last) = keys.pop() else {
        return;
    };

    let mut current = doc;
    for key in keys {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        match value {
            Some(v) => {
                map.insert(last.to_string(), v);
            },
            None => {
                map.remove(last);
            },
        }
    }
}

fn eq_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), expected) if !expected.is_array() => {
            items.iter().any(|item| item == expected)
        },
        (Some(actual), expected) => actual == expected,
    }
}

fn join_matches(local: &Value, foreign: Option<&Value>) -> bool {
    let Some(foreign) = foreign else {
        return false;
    };
    match local {
        Value::Array(locals) => locals.iter().any(|l| l == foreign),
        _ => local == foreign,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Object(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Bool(_)) => 6,
    }
}

/// Total order over optional JSON values used by `Sort`
///
/// RFC 3339 timestamps compare chronologically rather than lexically.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        },
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        },
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Users(Vec<Value>);

    impl LookupSource for Users {
        fn documents(&self, collection: Collection) -> &[Value] {
            match collection {
                Collection::Users => &self.0,
                Collection::Folders => &[],
            }
        }
    }

    fn users() -> Users {
        Users(vec![
            json!({"_id": "u1", "login": "alice"}),
            json!({"_id": "u2", "login": "bob"}),
        ])
    }

    #[test]
    fn test_eq_null_matches_missing_and_null() {
        let missing = json!({"name": "a"});
        let null = json!({"creatorId": null});
        let set = json!({"creatorId": "u1"});
        let filter = Filter::eq("creatorId", Value::Null);
        assert!(filter.matches(&missing));
        assert!(filter.matches(&null));
        assert!(!filter.matches(&set));
    }

    #[test]
    fn test_nor_and_elem_match() {
        let doc = json!({
            "creatorId": "u1",
            "access": {"requests": [{"id": "u2", "status": "granted"}]}
        });
        let not_mine = Filter::Nor(vec![Filter::eq("creatorId", "u2"), Filter::eq("creatorId", Value::Null)]);
        assert!(not_mine.matches(&doc));

        let granted_to_u2 = Filter::elem_match(
            "access.requests",
            Filter::And(vec![Filter::eq("id", "u2"), Filter::eq("status", "granted")]),
        );
        assert!(granted_to_u2.matches(&doc));
        assert!(!Filter::not(granted_to_u2).matches(&doc));

        let no_requests = json!({"creatorId": "u1"});
        assert!(!Filter::elem_match("access.requests", Filter::eq("id", "u2")).matches(&no_requests));
    }

    #[test]
    fn test_sort_skip_limit() {
        let docs = vec![json!({"n": 3}), json!({"n": 1}), json!({"n": 2}), json!({})];
        let pipeline = Pipeline::new()
            .stage(Stage::Sort { field: "n".into(), direction: SortDirection::Descending })
            .stage(Stage::Skip(1))
            .stage(Stage::Limit(2));
        let out = execute(docs, &pipeline, &users());
        assert_eq!(out, vec![json!({"n": 2}), json!({"n": 1})]);
    }

    #[test]
    fn test_sort_timestamps_chronologically() {
        let docs = vec![
            json!({"created": "2024-01-01T00:00:00Z"}),
            json!({"created": "2024-01-01T00:00:00.500Z"}),
        ];
        let pipeline = Pipeline::new()
            .stage(Stage::Sort { field: "created".into(), direction: SortDirection::Ascending });
        let out = execute(docs, &pipeline, &users());
        assert_eq!(out[0]["created"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_unwind_drops_empty_and_expands_arrays() {
        let docs = vec![
            json!({"_id": "a", "access": {"requests": [{"id": "u1"}, {"id": "u2"}]}}),
            json!({"_id": "b", "access": {"requests": []}}),
            json!({"_id": "c"}),
        ];
        let pipeline = Pipeline::new().stage(Stage::Unwind("access.requests".into()));
        let out = execute(docs, &pipeline, &users());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["access"]["requests"]["id"], "u2");
    }

    #[test]
    fn test_lookup_first_and_pluck() {
        let docs = vec![json!({"creatorId": "u2"}), json!({"creatorId": "nobody"})];
        let pipeline = Pipeline::new()
            .stage(Stage::Lookup {
                from: Collection::Users,
                local_field: "creatorId".into(),
                foreign_field: "_id".into(),
                as_field: "ownerLogin".into(),
            })
            .stage(Stage::First("ownerLogin".into()))
            .stage(Stage::SetFromPath { field: "ownerLogin".into(), path: "ownerLogin.login".into() });
        let out = execute(docs, &pipeline, &users());
        assert_eq!(out[0]["ownerLogin"], "bob");
        assert!(out[1].get("ownerLogin").is_none());
    }

    #[test]
    fn test_facet_with_count() {
        let docs = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})];
        let pipeline = Pipeline::new().stage(Stage::Facet(vec![
            ("results".into(), vec![Stage::Skip(2)]),
            ("totalCount".into(), vec![Stage::Count("count".into())]),
        ]));
        let out = execute(docs, &pipeline, &users());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["results"], json!([{"n": 3}]));
        assert_eq!(out[0]["totalCount"], json!([{"count": 3}]));

        let empty = execute(Vec::new(), &pipeline, &users());
        assert_eq!(empty[0]["totalCount"], json!([]));
    }

    #[test]
    fn test_lookup_collections_descends_into_facets() {
        let pipeline = Pipeline::new().stage(Stage::Facet(vec![(
            "results".into(),
            vec![Stage::Lookup {
                from: Collection::Users,
                local_field: "creatorId".into(),
                foreign_field: "_id".into(),
                as_field: "owner".into(),
            }],
        )]));
        assert!(pipeline.lookup_collections().contains(&Collection::Users));
        assert!(!pipeline.lookup_collections().contains(&Collection::Folders));
    }

    #[test]
    fn test_set_path_creates_and_removes() {
        let mut doc = json!({});
        set_path(&mut doc, "a.b", Some(json!(1)));
        assert_eq!(doc, json!({"a": {"b": 1}}));
        set_path(&mut doc, "a.b", None);
        assert_eq!(doc, json!({"a": {}}));
    }
}
