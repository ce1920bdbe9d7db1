// Typed HTTP client for the REST API

use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dashboard::DashboardStats;
use crate::db::Event;
use crate::entities::{
    Auction, AuctionInput, BcTransfer, Group, GroupUpdate, LedgerEntry, LedgerScope, LedgerView, Member,
    MemberUpdate, NewGroup, NewLedgerEntry, NewMember, NewPayment, Payment, PendingEdit,
};
use crate::reminder::{Reminder, ReminderAck, ReminderRequest};
use crate::tally::{tally_sheet, TallyFilter, TallySheet};

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded {status} {status_text}")]
    Server {
        status: u16,
        status_text: String,
        detail: Option<String>,
    },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// The text to show an operator: the server's detail when it sent one,
    /// then the HTTP status text, then the raw error.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { detail: Some(detail), .. } if !detail.is_empty() => detail.clone(),
            ClientError::Server { status_text, .. } if !status_text.is_empty() => status_text.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Value,
}

/// Groups, members and dashboard figures read together for the tally view.
/// Reads that failed come back empty and leave a warning.
#[derive(Debug, Default)]
pub struct TallySnapshot {
    pub groups: Vec<Group>,
    pub members: Vec<Member>,
    pub stats: DashboardStats,
    pub warnings: Vec<String>,
}

impl TallySnapshot {
    pub fn sheet(&self, filter: &TallyFilter, as_of: NaiveDate) -> TallySheet {
        tally_sheet(&self.members, &self.groups, filter, as_of)
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:8001`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body).ok().map(|b| match b.detail {
            Value::String(s) => s,
            other => other.to_string(),
        });

        tracing::debug!(status = status.as_u16(), ?detail, "server error response");
        Err(ClientError::Server { status: status.as_u16(), status_text, detail })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self.http.put(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.http.delete(self.url(path)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn health(&self) -> ClientResult<Value> {
        self.get("/health").await
    }

    // ------------------------------------------------------------------ groups

    pub async fn list_groups(&self) -> ClientResult<Vec<Group>> {
        self.get("/groups").await
    }

    pub async fn get_group(&self, id: &str) -> ClientResult<Group> {
        self.get(&format!("/groups/{}", urlencoding::encode(id))).await
    }

    pub async fn create_group(&self, group: &NewGroup) -> ClientResult<Group> {
        self.post("/groups", group).await
    }

    pub async fn update_group(&self, id: &str, update: &GroupUpdate) -> ClientResult<Group> {
        self.put(&format!("/groups/{}", urlencoding::encode(id)), update).await
    }

    pub async fn delete_group(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/groups/{}", urlencoding::encode(id))).await
    }

    // ----------------------------------------------------------------- members

    pub async fn list_members(&self) -> ClientResult<Vec<Member>> {
        self.get("/members").await
    }

    pub async fn list_members_by_group(&self, group_id: &str) -> ClientResult<Vec<Member>> {
        self.get(&format!("/members/group/{}", urlencoding::encode(group_id))).await
    }

    pub async fn get_member(&self, id: &str) -> ClientResult<Member> {
        self.get(&format!("/members/{}", urlencoding::encode(id))).await
    }

    pub async fn create_member(&self, member: &NewMember) -> ClientResult<Member> {
        self.post("/members", member).await
    }

    pub async fn update_member(&self, id: &str, update: &MemberUpdate) -> ClientResult<Member> {
        self.put(&format!("/members/{}", urlencoding::encode(id)), update).await
    }

    pub async fn delete_member(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/members/{}", urlencoding::encode(id))).await
    }

    pub async fn transfer_bc(&self, transfer: &BcTransfer) -> ClientResult<Member> {
        self.post("/members/transfer-bc", transfer).await
    }

    pub async fn edit_pending(&self, edit: &PendingEdit) -> ClientResult<Member> {
        self.post("/members/edit-pending", edit).await
    }

    // ---------------------------------------------------------------- payments

    pub async fn list_payments(&self) -> ClientResult<Vec<Payment>> {
        self.get("/payments").await
    }

    pub async fn list_member_payments(&self, member_id: &str) -> ClientResult<Vec<Payment>> {
        self.get(&format!("/payments/member/{}", urlencoding::encode(member_id))).await
    }

    pub async fn create_payment(&self, payment: &NewPayment) -> ClientResult<Payment> {
        self.post("/payments", payment).await
    }

    pub async fn delete_payment(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/payments/{}", urlencoding::encode(id))).await
    }

    // ---------------------------------------------------------------- auctions

    pub async fn list_auctions(&self, group_no: Option<&str>) -> ClientResult<Vec<Auction>> {
        match group_no {
            Some(group) => self.get(&format!("/auctions?groupNo={}", urlencoding::encode(group))).await,
            None => self.get("/auctions").await,
        }
    }

    pub async fn get_auction(&self, id: &str) -> ClientResult<Auction> {
        self.get(&format!("/auctions/{}", urlencoding::encode(id))).await
    }

    pub async fn create_auction(&self, input: &AuctionInput) -> ClientResult<Auction> {
        self.post("/auctions", input).await
    }

    pub async fn update_auction(&self, id: &str, input: &AuctionInput) -> ClientResult<Auction> {
        self.put(&format!("/auctions/{}", urlencoding::encode(id)), input).await
    }

    pub async fn delete_auction(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/auctions/{}", urlencoding::encode(id))).await
    }

    /// Mark an auction Prized; the server demotes the rest of its group in the same transaction
    pub async fn prize_auction(&self, id: &str) -> ClientResult<Vec<Auction>> {
        self.post(&format!("/auctions/{}/prize", urlencoding::encode(id)), &Value::Null).await
    }

    // ------------------------------------------------------- ledger, reminders

    pub async fn ledger(&self, scope: LedgerScope) -> ClientResult<LedgerView> {
        self.get(&format!("/ledger/{}", scope.as_str())).await
    }

    pub async fn create_ledger_entry(&self, scope: LedgerScope, entry: &NewLedgerEntry) -> ClientResult<LedgerEntry> {
        self.post(&format!("/ledger/{}", scope.as_str()), entry).await
    }

    pub async fn delete_ledger_entry(&self, scope: LedgerScope, id: &str) -> ClientResult<()> {
        self.delete(&format!("/ledger/{}/{}", scope.as_str(), urlencoding::encode(id))).await
    }

    pub async fn tally(&self, filter: &TallyFilter) -> ClientResult<TallySheet> {
        let mut params = Vec::new();
        if let Some(group) = filter.group.as_deref().filter(|g| !g.is_empty()) {
            params.push(format!("group={}", urlencoding::encode(group)));
        }
        if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
            params.push(format!("name={}", urlencoding::encode(name)));
        }

        if params.is_empty() {
            self.get("/tally").await
        } else {
            self.get(&format!("/tally?{}", params.join("&"))).await
        }
    }

    pub async fn reminder_draft(&self, member_id: &str) -> ClientResult<ReminderRequest> {
        self.get(&format!("/tally/{}/reminder", urlencoding::encode(member_id))).await
    }

    pub async fn schedule_reminder(&self, request: &ReminderRequest) -> ClientResult<ReminderAck> {
        self.post("/reminders", request).await
    }

    pub async fn list_reminders(&self) -> ClientResult<Vec<Reminder>> {
        self.get("/reminders").await
    }

    pub async fn events(&self, entity_type: &str, entity_id: &str) -> ClientResult<Vec<Event>> {
        self.get(&format!(
            "/events/{}/{}",
            urlencoding::encode(entity_type),
            urlencoding::encode(entity_id)
        ))
        .await
    }

    // -------------------------------------------------------------- dashboard

    pub async fn dashboard_stats(&self) -> ClientResult<DashboardStats> {
        self.get("/dashboard/stats").await
    }

    pub async fn dashboard_stats_or_default(&self) -> DashboardStats {
        match self.dashboard_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "dashboard stats unavailable, showing zeros");
                DashboardStats::default()
            }
        }
    }

    /// Read groups, members and stats concurrently. Each failed read falls
    /// back to its empty value on its own.
    pub async fn fetch_tally(&self) -> TallySnapshot {
        let (groups, members, stats) = tokio::join!(self.list_groups(), self.list_members(), self.dashboard_stats());

        let mut snapshot = TallySnapshot::default();

        match groups {
            Ok(groups) => snapshot.groups = groups,
            Err(e) => snapshot.warnings.push(format!("Groups: {}", e.user_message())),
        }
        match members {
            Ok(members) => snapshot.members = members,
            Err(e) => snapshot.warnings.push(format!("Members: {}", e.user_message())),
        }
        match stats {
            Ok(stats) => snapshot.stats = stats,
            Err(e) => snapshot.warnings.push(format!("Stats: {}", e.user_message())),
        }

        for warning in &snapshot.warnings {
            tracing::warn!(%warning, "partial tally data");
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_text: &str, detail: Option<&str>) -> ClientError {
        ClientError::Server {
            status: 400,
            status_text: status_text.to_string(),
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn test_message_prefers_server_detail() {
        let err = server_error("Bad Request", Some("Invalid group"));
        assert_eq!(err.user_message(), "Invalid group");
    }

    #[test]
    fn test_message_falls_back_to_status_text() {
        assert_eq!(server_error("Bad Request", None).user_message(), "Bad Request");
        assert_eq!(server_error("Bad Request", Some("")).user_message(), "Bad Request");
    }

    #[test]
    fn test_message_falls_back_to_raw_error() {
        assert_eq!(server_error("", None).user_message(), "Server responded 400 ");
        let err = ClientError::Decode("expected value".to_string());
        assert_eq!(err.user_message(), "Unexpected response body: expected value");
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades() {
        // nothing listens on port 9 locally
        let client = ApiClient::new("http://127.0.0.1:9/");
        assert!(matches!(client.list_groups().await, Err(ClientError::Transport(_))));

        let snapshot = client.fetch_tally().await;
        assert!(snapshot.groups.is_empty());
        assert_eq!(snapshot.stats, DashboardStats::default());
        assert_eq!(snapshot.warnings.len(), 3);
    }

    #[cfg(feature = "server")]
    mod live {
        use super::*;
        use crate::api::{build_router, AppState};
        use crate::config::Settings;
        use crate::db::test_connection;

        async fn spawn_server() -> ApiClient {
            let app = build_router(AppState::new(test_connection(), "KA Associates"), &Settings::default());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            ApiClient::new(format!("http://{}", addr))
        }

        #[tokio::test]
        async fn test_round_trip_against_server() {
            let client = spawn_server().await;

            let group = client
                .create_group(&NewGroup {
                    name: "ATL G1".to_string(),
                    total_chit_amount: 500000.0,
                    max_members: 25,
                    description: String::new(),
                })
                .await
                .unwrap();
            assert_eq!(client.list_groups().await.unwrap().len(), 1);

            let err = client.get_member("missing").await.unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(err.user_message(), "Member not found");

            let snapshot = client.fetch_tally().await;
            assert!(snapshot.warnings.is_empty());
            assert_eq!(snapshot.stats.total_groups, 1);
            assert_eq!(snapshot.groups[0].id, group.id);

            let sheet = client.tally(&TallyFilter::new(Some("ATL G1"), None)).await.unwrap();
            assert_eq!(sheet.summary.member_count, 0);
        }
    }
}
