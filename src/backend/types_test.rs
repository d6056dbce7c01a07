use super::*;

fn project_json() -> serde_json::Value {
    serde_json::json!({
        "id": "p1",
        "slug": "better-caves",
        "title": "Better Caves",
        "type": "addon",
        "author": "steve",
        "downloads": 1200,
        "ratingAvg": 4.5,
        "ratingCount": 8
    })
}

// =============================================================================
// parse_envelope
// =============================================================================

#[test]
fn parse_success_envelope() {
    let body = serde_json::json!({ "status": "success", "data": { "ratingAvg": 3.33, "ratingCount": 13 } }).to_string();
    let summary: RatingSummary = parse_envelope(200, &body).unwrap();
    assert!((summary.rating_avg - 3.33).abs() < f64::EPSILON);
    assert_eq!(summary.rating_count, 13);
}

#[test]
fn parse_401_is_unauthorized_regardless_of_body() {
    let err = parse_envelope::<RatingSummary>(401, "not json").unwrap_err();
    assert_eq!(err, BackendError::Unauthorized);
}

#[test]
fn parse_error_envelope_keeps_message() {
    let body = serde_json::json!({ "status": "error", "message": "rating out of range" }).to_string();
    let err = parse_envelope::<RatingSummary>(400, &body).unwrap_err();
    assert_eq!(err, BackendError::Api { status: 400, message: "rating out of range".into() });
}

#[test]
fn parse_error_status_with_200_is_api_error() {
    let body = serde_json::json!({ "status": "error", "message": "nope" }).to_string();
    let err = parse_envelope::<RatingSummary>(200, &body).unwrap_err();
    assert!(matches!(err, BackendError::Api { status: 200, .. }));
}

#[test]
fn parse_error_without_message_uses_status_text() {
    let body = serde_json::json!({ "status": "fail" }).to_string();
    let err = parse_envelope::<RatingSummary>(422, &body).unwrap_err();
    let BackendError::Api { message, .. } = err else { panic!("expected api error") };
    assert!(message.contains("fail"));
}

#[test]
fn parse_non_json_error_body_is_truncated() {
    let body = "x".repeat(1000);
    let err = parse_envelope::<RatingSummary>(502, &body).unwrap_err();
    let BackendError::Api { status, message } = err else { panic!("expected api error") };
    assert_eq!(status, 502);
    assert_eq!(message.len(), 200);
}

#[test]
fn parse_non_json_success_body_is_schema_error() {
    let err = parse_envelope::<RatingSummary>(200, "<html>").unwrap_err();
    assert!(matches!(err, BackendError::Schema(_)));
}

#[test]
fn parse_bare_array_is_schema_error() {
    let body = serde_json::json!([project_json()]).to_string();
    let err = parse_envelope::<ProjectPage>(200, &body).unwrap_err();
    assert!(matches!(err, BackendError::Schema(_)));
}

#[test]
fn parse_nested_alternate_shape_is_schema_error() {
    let body = serde_json::json!({
        "status": "success",
        "data": { "data": { "projects": [project_json()] } }
    })
    .to_string();
    let err = parse_envelope::<ProjectPage>(200, &body).unwrap_err();
    assert!(matches!(err, BackendError::Schema(_)));
}

#[test]
fn parse_missing_data_into_struct_is_schema_error() {
    let body = serde_json::json!({ "status": "success" }).to_string();
    let err = parse_envelope::<RatingSummary>(200, &body).unwrap_err();
    assert!(matches!(err, BackendError::Schema(_)));
}

#[test]
fn parse_missing_data_into_option_is_none() {
    let body = serde_json::json!({ "status": "success" }).to_string();
    let grant: Option<LoginGrant> = parse_envelope(200, &body).unwrap();
    assert!(grant.is_none());
}

#[test]
fn parse_missing_data_into_unit_is_ok() {
    let body = serde_json::json!({ "status": "success" }).to_string();
    parse_envelope::<()>(201, &body).unwrap();
}

// =============================================================================
// wire types
// =============================================================================

#[test]
fn project_page_parses_camel_case() {
    let body = serde_json::json!({
        "status": "success",
        "data": { "projects": [project_json()], "total": 1, "page": 1, "totalPages": 1 }
    })
    .to_string();
    let page: ProjectPage = parse_envelope(200, &body).unwrap();
    assert_eq!(page.projects.len(), 1);
    assert_eq!(page.projects[0].kind, "addon");
    assert_eq!(page.projects[0].rating_count, 8);
    assert!(page.projects[0].tags.is_empty());
}

#[test]
fn project_detail_flattens_summary() {
    let mut detail = project_json();
    detail["description"] = "Deeper caves".into();
    detail["userRating"] = 4.into();
    let parsed: ProjectDetail = serde_json::from_value(detail).unwrap();
    assert_eq!(parsed.summary.slug, "better-caves");
    assert_eq!(parsed.user_rating, Some(4));
    assert!(parsed.versions.is_empty());
}

#[test]
fn comment_pending_is_omitted_when_false() {
    let comment = Comment {
        id: "c1".into(),
        author: "alex".into(),
        content: "nice".into(),
        created_at: "2024-01-01T00:00:00Z".into(),
        parent_id: None,
        pending: false,
    };
    let json = serde_json::to_value(&comment).unwrap();
    assert!(json.get("pending").is_none());
    assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
}

#[test]
fn listing_query_skips_unset_fields() {
    let query = ListingQuery { search: Some("caves".into()), ..ListingQuery::default() };
    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(json, serde_json::json!({ "search": "caves" }));
}

#[test]
fn upstream_failure_classification() {
    assert!(BackendError::Transport("refused".into()).is_upstream_failure());
    assert!(BackendError::Api { status: 503, message: String::new() }.is_upstream_failure());
    assert!(!BackendError::Api { status: 400, message: String::new() }.is_upstream_failure());
    assert!(!BackendError::Unauthorized.is_upstream_failure());
}
