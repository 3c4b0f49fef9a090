//! Pipelines behind the list views
//!
//! Every view is a match prefix followed by the same page facet: a sorted,
//! bounded `results` branch with login joins, and a `totalCount` branch.

use dsx_common::types::RequestStatus;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::features::shared::{PaginationParams, SortSpec};
use crate::store::{Collection, Filter, Pipeline, Stage, StoreResult};

pub const RESULTS: &str = "results";
pub const TOTAL_COUNT: &str = "totalCount";

/// Replace the id at `local_field` with the matching user's login in `as_field`
pub fn login_join(local_field: &str, as_field: &str) -> Vec<Stage> {
    vec![
        Stage::Lookup {
            from: Collection::Users,
            local_field: local_field.to_string(),
            foreign_field: "_id".to_string(),
            as_field: as_field.to_string(),
        },
        Stage::First(as_field.to_string()),
        Stage::SetFromPath {
            field: as_field.to_string(),
            path: format!("{as_field}.login"),
        },
    ]
}

/// Sorted page plus total count
pub fn page_facet(sort: &SortSpec, page: &PaginationParams, decorate: Vec<Stage>) -> Stage {
    let mut results = vec![
        Stage::Sort {
            field: sort.field.clone(),
            direction: sort.direction,
        },
        Stage::Skip(page.offset() as usize),
        Stage::Limit(page.limit() as usize),
    ];
    results.extend(decorate);

    Stage::Facet(vec![
        (RESULTS.to_string(), results),
        (TOTAL_COUNT.to_string(), vec![Stage::Count("count".to_string())]),
    ])
}

fn id(user: Uuid) -> Value {
    Value::String(user.to_string())
}

fn pending(path: &str) -> Stage {
    Stage::Match(Filter::eq(path, RequestStatus::Pending.as_str()))
}

/// Previews of other users' datasets visible to `user`
pub fn sharable_datasets(user: Uuid, exclude_granted: bool, sort: &SortSpec, page: &PaginationParams) -> Pipeline {
    let mut conditions = vec![
        Filter::eq("meta.annotate", true),
        Filter::Nor(vec![
            Filter::eq("creatorId", id(user)),
            Filter::eq("creatorId", Value::Null),
        ]),
        Filter::eq("meta.sharable", true),
    ];
    if exclude_granted {
        conditions.push(Filter::not(Filter::elem_match(
            "access.requests",
            Filter::And(vec![
                Filter::eq("id", id(user)),
                Filter::eq("status", RequestStatus::Granted.as_str()),
            ]),
        )));
    }

    Pipeline::new()
        .stage(Stage::Match(Filter::And(conditions)))
        .stage(page_facet(sort, page, login_join("creatorId", "ownerLogin")))
}

/// One row per pending request against previews `user` created
pub fn dataset_requests(user: Uuid, sort: &SortSpec, page: &PaginationParams) -> Pipeline {
    let mut decorate = login_join("access.requests.id", "requestingUserLogin");
    decorate.push(Stage::SetFromPath {
        field: "request".to_string(),
        path: "access.requests".to_string(),
    });

    Pipeline::new()
        .stage(Stage::Match(Filter::And(vec![
            Filter::eq("meta.annotate", true),
            Filter::eq("creatorId", id(user)),
            Filter::eq("meta.sharable", true),
        ])))
        .stage(Stage::Unwind("access.requests".to_string()))
        .stage(pending("access.requests.status"))
        .stage(page_facet(sort, page, decorate))
}

/// One row per pending request on the previews of datasets `user` created,
/// reached through each source's preview reference
pub fn requested_datasets(user: Uuid, sort: &SortSpec, page: &PaginationParams) -> Pipeline {
    let mut decorate = login_join("preview.access.requests.id", "requestingUserLogin");
    decorate.push(Stage::SetFromPath {
        field: "previewId".to_string(),
        path: "preview._id".to_string(),
    });
    decorate.push(Stage::SetFromPath {
        field: "request".to_string(),
        path: "preview.access.requests".to_string(),
    });

    Pipeline::new()
        .stage(Stage::Match(Filter::And(vec![
            Filter::eq("creatorId", id(user)),
            Filter::eq("meta.annotate", true),
            Filter::Exists("meta.sharableMediaId".to_string(), true),
            Filter::not(Filter::eq("meta.sharableMediaId", "")),
        ])))
        .stage(Stage::Lookup {
            from: Collection::Folders,
            local_field: "meta.sharableMediaId".to_string(),
            foreign_field: "_id".to_string(),
            as_field: "preview".to_string(),
        })
        .stage(Stage::Unwind("preview".to_string()))
        .stage(Stage::Unwind("preview.access.requests".to_string()))
        .stage(pending("preview.access.requests.status"))
        .stage(page_facet(sort, page, decorate))
}

/// Parse the single facet document into typed rows and the total count
pub fn read_page<T: DeserializeOwned>(output: Vec<Value>) -> StoreResult<(Vec<T>, i64)> {
    let Some(mut facet) = output.into_iter().next() else {
        return Ok((Vec::new(), 0));
    };

    let total = facet
        .get(TOTAL_COUNT)
        .and_then(|counts| counts.get(0))
        .and_then(|first| first.get("count"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let rows = match facet.get_mut(RESULTS).map(Value::take) {
        Some(Value::Array(results)) => results
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?,
        _ => Vec::new(),
    };
    Ok((rows, total))
}
