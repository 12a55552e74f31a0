//! HTTP surface: JSON API, live status WebSocket and Prometheus metrics.

use crate::api::{parse_id, CreateWebsiteRequest, MonitoringService, RouteView, UpdateWebsiteRequest};
use crate::broadcaster::StatusBroadcaster;
use crate::metrics::MetricsRegistry;
use crate::types::{Page, StatusEvent, Website, WebsiteFilter};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use common::Error;
use futures::{SinkExt, StreamExt};
use probe::SiteState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonitoringService>,
    pub broadcaster: Arc<StatusBroadcaster>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

/// Maps registry and validation errors onto HTTP statuses
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageParams {
    page: Option<usize>,
    items_per_page: Option<usize>,
    search: Option<String>,
    user_id: Option<String>,
}

impl PageParams {
    fn page(&self) -> common::Result<Page> {
        let default = Page::default();
        Page::new(
            self.page.unwrap_or(default.page),
            self.items_per_page.unwrap_or(default.items_per_page),
        )
    }
}

#[derive(Debug, Deserialize)]
struct CheckParams {
    url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeParams {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    status: SiteState,
}

#[derive(Debug, Serialize)]
struct WebsitePage {
    total: usize,
    websites: Vec<Website>,
}

#[derive(Debug, Serialize)]
struct RoutePage {
    total: usize,
    routes: Vec<RouteView>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'static str,
    data: &'a StatusEvent,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let monitoring = Router::new()
        .route("/", post(create_website))
        .route("/check", get(check_url))
        .route("/listAllWebSites", get(list_websites))
        .route("/listAllRoutes", get(list_routes))
        .route("/user/:owner_id", get(list_owner_websites))
        .route("/update-status/:id", post(check_now))
        .route("/routes/:route_id", delete(delete_route))
        .route(
            "/:id",
            get(get_website).delete(delete_website).patch(update_website),
        );

    let mut app = Router::new()
        .nest("/website-monitoring", monitoring)
        .route("/ws", get(subscribe));

    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn check_url(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> ApiResult<Json<CheckResponse>> {
    let status = state
        .service
        .check_url(&params.url, params.token.as_deref())
        .await?;
    Ok(Json(CheckResponse { status }))
}

async fn create_website(
    State(state): State<AppState>,
    Json(request): Json<CreateWebsiteRequest>,
) -> ApiResult<(StatusCode, Json<Website>)> {
    let website = state.service.create_website(request).await?;
    Ok((StatusCode::CREATED, Json(website)))
}

async fn get_website(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Website>> {
    let id = parse_id(&id, "website")?;
    Ok(Json(state.service.get_website(id).await?))
}

async fn delete_website(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "website")?;
    state.service.delete_website(id).await?;
    Ok(Json(MessageResponse {
        message: "Website deleted successfully",
    }))
}

async fn update_website(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateWebsiteRequest>,
) -> ApiResult<Json<Website>> {
    let id = parse_id(&id, "website")?;
    Ok(Json(state.service.update_website(id, request).await?))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let route_id = parse_id(&route_id, "route")?;
    state.service.delete_route(route_id).await?;
    Ok(Json(MessageResponse {
        message: "Route deleted successfully",
    }))
}

async fn check_now(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<StatusEvent>> {
    let id = parse_id(&id, "website")?;
    Ok(Json(state.service.check_now(id).await?))
}

async fn list_websites(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<WebsitePage>> {
    let page = params.page()?;
    let filter = WebsiteFilter {
        owner_id: params.user_id,
        search: params.search,
    };
    let result = state.service.list_websites(filter, page).await?;
    Ok(Json(WebsitePage {
        total: result.total,
        websites: result.items,
    }))
}

async fn list_owner_websites(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<WebsitePage>> {
    let page = params.page()?;
    let result = state
        .service
        .list_websites_by_owner(&owner_id, page, params.search.as_deref())
        .await?;
    Ok(Json(WebsitePage {
        total: result.total,
        websites: result.items,
    }))
}

async fn list_routes(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<RoutePage>> {
    let page = params.page()?;
    let result = state.service.list_routes(page).await?;
    Ok(Json(RoutePage {
        total: result.total,
        routes: result.items,
    }))
}

/// Upgrade to a WebSocket that streams the owner's status events
async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Response {
    let receiver = state.broadcaster.subscribe(&params.user_id);
    info!(owner_id = %params.user_id, "Status subscriber connected");
    ws.on_upgrade(move |socket| forward_events(socket, receiver, params.user_id))
}

async fn forward_events(socket: WebSocket, receiver: broadcast::Receiver<StatusEvent>, owner_id: String) {
    let (mut sender, mut incoming) = socket.split();
    let mut events = BroadcastStream::new(receiver);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let text = match serde_json::to_string(&Envelope { event: "statusUpdate", data: &event }) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode status event");
                            continue;
                        }
                    };
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        debug!(owner_id = %owner_id, error = %e, "Status subscriber send failed");
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(owner_id = %owner_id, skipped, "Status subscriber lagging, events dropped");
                }
                None => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!(owner_id = %owner_id, "Status subscriber disconnected");
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
