// REST API over the store
// Every route lives under /api; failures answer {"detail": "..."}.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::dashboard::{dashboard_stats, DashboardStats};
use crate::db::{get_events_for_entity, Event};
use crate::entities::{auction, group, ledger, member, payment};
use crate::entities::{
    Auction, AuctionInput, BcTransfer, Group, GroupUpdate, LedgerEntry, LedgerScope, LedgerView, Member,
    MemberUpdate, NewGroup, NewLedgerEntry, NewMember, NewPayment, Payment, PendingEdit,
};
use crate::error::{AppError, Result};
use crate::reminder::{list_reminders, schedule_reminder, Reminder, ReminderAck, ReminderRequest};
use crate::tally::{build_rows, tally_sheet, TallyFilter, TallySheet};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub business_name: String,
}

impl AppState {
    pub fn new(conn: Connection, business_name: impl Into<String>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            business_name: business_name.into(),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn deleted(message: &str) -> Json<Value> {
    Json(json!({ "message": message, "deleted": true }))
}

fn parse_scope(scope: &str) -> Result<LedgerScope> {
    LedgerScope::parse(scope).ok_or_else(|| AppError::not_found("Ledger"))
}

// ============================================================================
// Service
// ============================================================================

/// GET /api
async fn root() -> Json<Value> {
    Json(json!({
        "message": "Chit Fund BC Management API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

/// GET /api/health
async fn health_check(State(state): State<AppState>) -> Result<Json<Value>> {
    let conn = state.conn()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(Json(json!({ "status": "ok" })))
}

// ============================================================================
// Groups
// ============================================================================

async fn get_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>> {
    let conn = state.conn()?;
    Ok(Json(group::list_groups(&conn)?))
}

async fn get_group(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Group>> {
    let conn = state.conn()?;
    Ok(Json(group::get_group(&conn, &id)?))
}

async fn create_group(State(state): State<AppState>, Json(body): Json<NewGroup>) -> Result<Json<Group>> {
    let conn = state.conn()?;
    Ok(Json(group::create_group(&conn, &body)?))
}

async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GroupUpdate>,
) -> Result<Json<Group>> {
    let conn = state.conn()?;
    Ok(Json(group::update_group(&conn, &id, &body)?))
}

async fn delete_group(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let conn = state.conn()?;
    group::delete_group(&conn, &id)?;
    Ok(deleted("Group deleted successfully"))
}

// ============================================================================
// Members
// ============================================================================

async fn get_members(State(state): State<AppState>) -> Result<Json<Vec<Member>>> {
    let conn = state.conn()?;
    Ok(Json(member::list_members(&conn)?))
}

async fn get_members_by_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Member>>> {
    let conn = state.conn()?;
    Ok(Json(member::list_members_by_group(&conn, &group_id)?))
}

async fn get_member(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Member>> {
    let conn = state.conn()?;
    Ok(Json(member::get_member(&conn, &id)?))
}

async fn create_member(State(state): State<AppState>, Json(body): Json<NewMember>) -> Result<Json<Member>> {
    let conn = state.conn()?;
    Ok(Json(member::create_member(&conn, &body, today())?))
}

async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MemberUpdate>,
) -> Result<Json<Member>> {
    let conn = state.conn()?;
    Ok(Json(member::update_member(&conn, &id, &body, today())?))
}

async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let conn = state.conn()?;
    member::delete_member(&conn, &id)?;
    Ok(deleted("Member deleted successfully"))
}

async fn transfer_bc(State(state): State<AppState>, Json(body): Json<BcTransfer>) -> Result<Json<Member>> {
    let conn = state.conn()?;
    Ok(Json(member::transfer_bc(&conn, &body)?))
}

async fn edit_pending(State(state): State<AppState>, Json(body): Json<PendingEdit>) -> Result<Json<Member>> {
    let conn = state.conn()?;
    Ok(Json(member::edit_pending(&conn, &body)?))
}

// ============================================================================
// Payments
// ============================================================================

async fn get_payments(State(state): State<AppState>) -> Result<Json<Vec<Payment>>> {
    let conn = state.conn()?;
    Ok(Json(payment::list_payments(&conn)?))
}

async fn get_member_payments(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<Json<Vec<Payment>>> {
    let conn = state.conn()?;
    Ok(Json(payment::list_payments_by_member(&conn, &member_id)?))
}

async fn create_payment(State(state): State<AppState>, Json(body): Json<NewPayment>) -> Result<Json<Payment>> {
    let conn = state.conn()?;
    Ok(Json(payment::create_payment(&conn, &body, today())?))
}

async fn delete_payment(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let conn = state.conn()?;
    payment::delete_payment(&conn, &id, today())?;
    Ok(deleted("Payment deleted successfully"))
}

// ============================================================================
// Auctions
// ============================================================================

#[derive(Debug, Deserialize)]
struct AuctionQuery {
    #[serde(rename = "groupNo")]
    group_no: Option<String>,
}

async fn get_auctions(
    State(state): State<AppState>,
    Query(query): Query<AuctionQuery>,
) -> Result<Json<Vec<Auction>>> {
    let conn = state.conn()?;
    let group_no = query.group_no.as_deref().filter(|g| !g.is_empty());
    Ok(Json(auction::list_auctions(&conn, group_no)?))
}

async fn get_auction(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Auction>> {
    let conn = state.conn()?;
    Ok(Json(auction::get_auction(&conn, &id)?))
}

async fn create_auction(State(state): State<AppState>, Json(body): Json<AuctionInput>) -> Result<Json<Auction>> {
    let conn = state.conn()?;
    Ok(Json(auction::create_auction(&conn, &body)?))
}

async fn update_auction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AuctionInput>,
) -> Result<Json<Auction>> {
    let conn = state.conn()?;
    Ok(Json(auction::update_auction(&conn, &id, &body)?))
}

async fn delete_auction(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let conn = state.conn()?;
    auction::delete_auction(&conn, &id)?;
    Ok(deleted("Auction deleted successfully"))
}

/// POST /api/auctions/:id/prize - returns the group's auctions after the change
async fn prize_auction(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<Auction>>> {
    let conn = state.conn()?;
    Ok(Json(auction::mark_prized(&conn, &id)?))
}

// ============================================================================
// Dashboard, ledger, tally, reminders
// ============================================================================

/// GET /api/dashboard/stats - zeros when the store cannot be read
async fn get_dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    let stats = state.conn().and_then(|conn| dashboard_stats(&conn));
    match stats {
        Ok(stats) => Json(stats),
        Err(e) => {
            tracing::error!(error = %e, "dashboard stats unavailable");
            Json(DashboardStats::default())
        }
    }
}

async fn get_ledger(State(state): State<AppState>, Path(scope): Path<String>) -> Result<Json<LedgerView>> {
    let scope = parse_scope(&scope)?;
    let conn = state.conn()?;
    Ok(Json(ledger::ledger_view(&conn, scope)?))
}

async fn create_ledger_entry(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Json(body): Json<NewLedgerEntry>,
) -> Result<Json<LedgerEntry>> {
    let scope = parse_scope(&scope)?;
    let conn = state.conn()?;
    Ok(Json(ledger::create_entry(&conn, scope, &body)?))
}

async fn delete_ledger_entry(
    State(state): State<AppState>,
    Path((scope, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let scope = parse_scope(&scope)?;
    let conn = state.conn()?;
    ledger::delete_entry(&conn, scope, &id)?;
    Ok(deleted("Ledger entry deleted successfully"))
}

async fn get_tally(State(state): State<AppState>, Query(filter): Query<TallyFilter>) -> Result<Json<TallySheet>> {
    let conn = state.conn()?;
    let members = member::list_members(&conn)?;
    let groups = group::list_groups(&conn)?;
    Ok(Json(tally_sheet(&members, &groups, &filter, today())))
}

/// GET /api/tally/:member_id/reminder - the default reminder draft
async fn get_reminder_draft(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<Json<ReminderRequest>> {
    let conn = state.conn()?;
    let member = member::get_member(&conn, &member_id)?;
    let groups = group::list_groups(&conn)?;
    let today = today();

    let rows = build_rows(std::slice::from_ref(&member), &groups, today);
    let row = rows.first().ok_or_else(|| AppError::not_found("Member"))?;
    Ok(Json(ReminderRequest::draft(row, &state.business_name, today)))
}

#[derive(Debug, Deserialize)]
struct ReminderQuery {
    #[serde(rename = "memberId")]
    member_id: Option<String>,
}

async fn get_reminders(
    State(state): State<AppState>,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Vec<Reminder>>> {
    let conn = state.conn()?;
    Ok(Json(list_reminders(&conn, query.member_id.as_deref())?))
}

async fn create_reminder(
    State(state): State<AppState>,
    Json(body): Json<ReminderRequest>,
) -> Result<Json<ReminderAck>> {
    let conn = state.conn()?;
    Ok(Json(schedule_reminder(&conn, &body)?))
}

async fn get_events(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<Vec<Event>>> {
    let conn = state.conn()?;
    Ok(Json(get_events_for_entity(&conn, &entity_type, &entity_id)?))
}

// ============================================================================
// Router
// ============================================================================

fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState, settings: &Settings) -> Router {
    let api_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/groups", get(get_groups).post(create_group))
        .route("/groups/:id", get(get_group).put(update_group).delete(delete_group))
        .route("/members", get(get_members).post(create_member))
        .route("/members/group/:group_id", get(get_members_by_group))
        .route("/members/transfer-bc", post(transfer_bc))
        .route("/members/edit-pending", post(edit_pending))
        .route("/members/:id", get(get_member).put(update_member).delete(delete_member))
        .route("/payments", get(get_payments).post(create_payment))
        .route("/payments/member/:member_id", get(get_member_payments))
        .route("/payments/:id", axum::routing::delete(delete_payment))
        .route("/auctions", get(get_auctions).post(create_auction))
        .route("/auctions/:id", get(get_auction).put(update_auction).delete(delete_auction))
        .route("/auctions/:id/prize", post(prize_auction))
        .route("/dashboard/stats", get(get_dashboard_stats))
        .route("/ledger/:scope", get(get_ledger).post(create_ledger_entry))
        .route("/ledger/:scope/:id", axum::routing::delete(delete_ledger_entry))
        .route("/tally", get(get_tally))
        .route("/tally/:member_id/reminder", get(get_reminder_draft))
        .route("/reminders", get(get_reminders).post(create_reminder))
        .route("/events/:entity_type/:entity_id", get(get_events))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        build_router(AppState::new(conn, "KA Associates"), &Settings::default())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn seed_group(app: &Router) -> String {
        let (status, group) = send(
            app,
            "POST",
            "/api/groups",
            Some(json!({ "name": "ATL G1", "totalChitAmount": 100000.0, "maxMembers": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        group["id"].as_str().unwrap().to_string()
    }

    fn member_body(group_id: &str, name: &str) -> Value {
        json!({
            "name": name,
            "phone": "9800000000",
            "groupId": group_id,
            "bcHolder": "RAJESH PATEL (N08554)",
            "joinDate": today().format("%Y-%m-%d").to_string(),
        })
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");

        let (status, _) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_group_lifecycle() {
        let app = app();
        let id = seed_group(&app).await;

        let (status, group) = send(&app, "GET", &format!("/api/groups/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(group["vacancies"], 2);

        let (status, body) = send(&app, "PUT", &format!("/api/groups/{}", id), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No fields to update");

        let (status, _) = send(&app, "DELETE", &format!("/api/groups/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", &format!("/api/groups/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Group not found");
    }

    #[tokio::test]
    async fn test_member_rules() {
        let app = app();

        let (status, body) = send(&app, "POST", "/api/members", Some(member_body("missing", "Raj Sharma"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid group");

        let group_id = seed_group(&app).await;
        let (status, member) = send(&app, "POST", "/api/members", Some(member_body(&group_id, "Raj Sharma"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(member["pendingAmount"], 100000.0);

        send(&app, "POST", "/api/members", Some(member_body(&group_id, "Priya Patel"))).await;
        let (status, _) = send(&app, "POST", "/api/members", Some(member_body(&group_id, "Amit Kumar"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, members) = send(&app, "GET", &format!("/api/members/group/{}", group_id), None).await;
        assert_eq!(members.as_array().unwrap().len(), 2);

        let member_id = member["id"].as_str().unwrap();
        let (status, edited) = send(
            &app,
            "POST",
            "/api/members/edit-pending",
            Some(json!({ "memberId": member_id, "pendingAmount": 1234.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["manualPendingOverride"], true);
    }

    #[tokio::test]
    async fn test_prize_route_keeps_one_prized() {
        let app = app();
        let auction = |ticket: &str, status: &str| {
            json!({
                "groupNo": "ATL G1",
                "ticketNo": ticket,
                "customerName": "PRITT C UNADECZOO",
                "mobileNo": "9430538549",
                "appuiDate": "06-12-2021",
                "instOngoing": 48,
                "status": status,
            })
        };

        let (_, first) = send(&app, "POST", "/api/auctions", Some(auction("67661 2", "Prized"))).await;
        let (_, second) = send(&app, "POST", "/api/auctions", Some(auction("67661 3", "Non-Prx"))).await;
        assert_eq!(second["srNo"], 2);

        let uri = format!("/api/auctions/{}/prize", second["id"].as_str().unwrap());
        let (status, _) = send(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, list) = send(&app, "GET", "/api/auctions?groupNo=ATL%20G1", None).await;
        let prized: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["status"] == "Prized")
            .map(|a| a["id"].clone())
            .collect();
        assert_eq!(prized, vec![second["id"].clone()]);
        assert_ne!(first["id"], second["id"]);

        let (status, _) = send(&app, "POST", "/api/auctions/nope/prize", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ledger_routes() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/api/ledger/business",
            Some(json!({ "type": "received", "amount": 50000.0, "description": "EMI Collection", "date": "2025-12-20" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, view) = send(&app, "GET", "/api/ledger/business", None).await;
        assert_eq!(view["balance"], 50000.0);
        assert_eq!(view["transactions"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/api/ledger/savings", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tally_and_reminder() {
        let app = app();
        let group_id = seed_group(&app).await;
        let (_, member) = send(&app, "POST", "/api/members", Some(member_body(&group_id, "Raj Sharma"))).await;
        let member_id = member["id"].as_str().unwrap();

        let (status, sheet) = send(&app, "GET", "/api/tally?name=raj", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sheet["summary"]["memberCount"], 1);

        let (_, sheet) = send(&app, "GET", "/api/tally?group=ATL%20G2", None).await;
        assert_eq!(sheet["rows"].as_array().unwrap().len(), 0);

        let (status, mut draft) = send(&app, "GET", &format!("/api/tally/{}/reminder", member_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(draft["message"].as_str().unwrap().ends_with("KA Associates"));

        draft["channel"] = json!("whatsapp");
        let (status, ack) = send(&app, "POST", "/api/reminders", Some(draft)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ack["acknowledgment"].as_str().unwrap().contains("WHATSAPP"));

        let (_, reminders) = send(&app, "GET", &format!("/api/reminders?memberId={}", member_id), None).await;
        assert_eq!(reminders.as_array().unwrap().len(), 1);

        let (_, events) = send(&app, "GET", &format!("/api/events/member/{}", member_id), None).await;
        assert!(!events.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_stats_route() {
        let app = app();
        let (status, stats) = send(&app, "GET", "/api/dashboard/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalGroups"], 0);
    }
}
