//! Generic resource handling shared by every resource
//!
//! `list` and `read_one` run a [`BaseRead`] through the query pipeline and
//! wrap the result in the success envelope. Mutations are resource-specific
//! and only borrow the envelope helpers from here.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tourdesk_common::query::pipeline::{build_query, BaseRead, PageWindow, QueryParams};

use super::error::{ApiError, ApiResult};
use crate::AppState;

/// `GET` on a collection: filter, sort, project and paginate from `params`
pub async fn list(state: &AppState, base: BaseRead, params: &QueryParams) -> ApiResult<Json<Value>> {
    let read = build_query(base, params);
    let collection = read.schema().collection;
    let window = read.window().unwrap_or_default();

    let total = read.count(&state.db).await?;
    let docs = read.execute(&state.db).await?;

    Ok(Json(list_envelope(collection, docs, total, window)))
}

/// `GET` on a single document; only `fields` is honored from `params`
pub async fn read_one(state: &AppState, base: BaseRead, params: &QueryParams) -> ApiResult<Json<Value>> {
    let document = base.schema().document;
    let shape: QueryParams = params
        .iter()
        .filter(|(key, _)| key.as_str() == "fields")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let doc = build_query(base, &shape)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No {} found with that ID", document)))?;

    Ok(Json(json!({
        "status": "success",
        "data": { document: doc },
    })))
}

/// Success envelope for a list read
pub fn list_envelope(collection: &str, docs: Vec<Value>, total: i64, window: PageWindow) -> Value {
    let mut pagination = Map::new();
    let next_page = window.page.checked_add(1);
    if let (Some(page), Some(end)) = (next_page, window.skip().checked_add(window.take())) {
        if end < total {
            pagination.insert("next".to_string(), json!({ "page": page, "limit": window.limit }));
        }
    }
    if window.skip() > 0 {
        pagination.insert(
            "prev".to_string(),
            json!({ "page": window.page - 1, "limit": window.limit }),
        );
    }

    json!({
        "status": "success",
        "results": docs.len(),
        "total": total,
        "pagination": pagination,
        "data": { collection: docs },
    })
}

/// 200 with a single document
pub fn single<T: Serialize>(document: &str, doc: T) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { document: doc },
    }))
}

/// 201 with the created document
pub fn created<T: Serialize>(document: &str, doc: T) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, single(document, doc))
}

/// 200 acknowledging a hard delete
pub fn deleted() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_only_next() {
        let window = PageWindow { page: 1, limit: 10 };
        let body = list_envelope("tours", vec![json!({}); 10], 25, window);

        assert_eq!(body["results"], 10);
        assert_eq!(body["total"], 25);
        assert_eq!(body["pagination"]["next"], json!({"page": 2, "limit": 10}));
        assert!(body["pagination"].get("prev").is_none());
    }

    #[test]
    fn test_middle_page_has_both_links() {
        let window = PageWindow { page: 2, limit: 10 };
        let body = list_envelope("tours", vec![json!({}); 10], 25, window);

        assert_eq!(body["pagination"]["next"], json!({"page": 3, "limit": 10}));
        assert_eq!(body["pagination"]["prev"], json!({"page": 1, "limit": 10}));
    }

    #[test]
    fn test_last_page_has_only_prev() {
        let window = PageWindow { page: 3, limit: 10 };
        let body = list_envelope("reviews", vec![json!({}); 5], 25, window);

        assert!(body["pagination"].get("next").is_none());
        assert_eq!(body["pagination"]["prev"], json!({"page": 2, "limit": 10}));
        assert_eq!(body["data"]["reviews"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_page_far_past_the_end_has_no_next() {
        let window = PageWindow { page: i64::MAX, limit: 10 };
        let body = list_envelope("tours", Vec::new(), 25, window);

        assert_eq!(body["results"], 0);
        assert!(body["pagination"].get("next").is_none());
        assert_eq!(body["pagination"]["prev"], json!({"page": i64::MAX - 1, "limit": 10}));
    }

    #[test]
    fn test_single_envelope_uses_document_key() {
        let Json(body) = single("tour", json!({"name": "The Forest Hiker"}));
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["tour"]["name"], "The Forest Hiker");
    }
}
