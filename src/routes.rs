use actix_web::{web, Either, HttpRequest, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;

use crate::board::{BoardStore, DeleteOutcome};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;

// Both slash forms are routed; board links are usually written `/api/threads/{board}/`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource(["/threads/{board}", "/threads/{board}/"])
                    .route(web::get().to(list_threads))
                    .route(web::post().to(create_thread))
                    .route(web::put().to(report_thread))
                    .route(web::delete().to(delete_thread)),
            )
            .service(
                web::resource(["/replies/{board}", "/replies/{board}/"])
                    .route(web::get().to(get_replies))
                    .route(web::post().to(create_reply))
                    .route(web::put().to(report_reply))
                    .route(web::delete().to(delete_reply)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState { pub board: BoardStore, pub rate_limiter: Option<RateLimiterFacade> }

// HTML forms post urlencoded bodies, API clients send JSON.
type Body<T> = Either<web::Json<T>, web::Form<T>>;

fn body<T: DeserializeOwned>(b: Body<T>) -> T {
    match b {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    }
}

fn client_key(req: &HttpRequest) -> String {
    req.peer_addr().map(|a| a.ip().to_string()).unwrap_or_else(|| "unknown".into())
}

fn rate_check(data: &AppState, req: &HttpRequest, allow: fn(&RateLimiterFacade, &str) -> bool) -> Result<(), ApiError> {
    match &data.rate_limiter {
        Some(rl) if !allow(rl, &client_key(req)) => Err(ApiError::RateLimited),
        _ => Ok(()),
    }
}

fn text(body: &'static str) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(body)
}

fn deleted(outcome: DeleteOutcome) -> HttpResponse { text(outcome.as_str()) }

// Browser flow: after a post, go back to the board (or thread) page.
fn see_other(location: String, view: ThreadView) -> HttpResponse {
    HttpResponse::SeeOther().insert_header(("Location", location)).json(view)
}

#[utoipa::path(
    get,
    path = "/api/threads/{board}",
    tag = "threads",
    params(("board" = String, Path, description = "Board name")),
    responses(
        (status = 200, description = "Up to 10 most recently bumped threads", body = [ThreadSummary])
    )
)]
pub async fn list_threads(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let threads = data.board.list_threads(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(threads))
}

#[utoipa::path(
    post,
    path = "/api/threads/{board}",
    tag = "threads",
    params(("board" = String, Path, description = "Board name")),
    request_body = NewThread,
    responses(
        (status = 303, description = "Thread created; redirects to the board page", body = ThreadView),
        (status = 400, description = "Missing field", body = ApiErrorBody),
        (status = 429, description = "Rate limited", body = ApiErrorBody)
    )
)]
pub async fn create_thread(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: Body<NewThread>,
) -> Result<HttpResponse, ApiError> {
    rate_check(&data, &req, RateLimiterFacade::allow_thread)?;
    let board = path.into_inner();
    let p = body(payload);
    let thread = data.board.create_thread(&board, p.text.as_deref(), p.delete_password.as_deref()).await?;
    Ok(see_other(format!("/b/{}/", urlencoding::encode(&board)), thread.view()))
}

#[utoipa::path(
    put,
    path = "/api/threads/{board}",
    tag = "threads",
    params(("board" = String, Path, description = "Board name")),
    request_body = ReportThread,
    responses(
        (status = 200, description = "Plain text `success`", body = String),
        (status = 404, description = "Thread not found", body = ApiErrorBody)
    )
)]
pub async fn report_thread(req: HttpRequest, data: web::Data<AppState>, payload: Body<ReportThread>) -> Result<HttpResponse, ApiError> {
    rate_check(&data, &req, RateLimiterFacade::allow_report)?;
    let p = body(payload);
    data.board.report_thread(p.thread_id.as_deref()).await?;
    Ok(text("success"))
}

#[utoipa::path(
    delete,
    path = "/api/threads/{board}",
    tag = "threads",
    params(("board" = String, Path, description = "Board name")),
    request_body = DeleteThread,
    responses(
        (status = 200, description = "Plain text `success` or `incorrect password`", body = String),
        (status = 404, description = "Thread not found", body = ApiErrorBody)
    )
)]
pub async fn delete_thread(data: web::Data<AppState>, payload: Body<DeleteThread>) -> Result<HttpResponse, ApiError> {
    let p = body(payload);
    let outcome = data.board.delete_thread(p.thread_id.as_deref(), p.delete_password.as_deref()).await?;
    Ok(deleted(outcome))
}

#[utoipa::path(
    get,
    path = "/api/replies/{board}",
    tag = "replies",
    params(("board" = String, Path, description = "Board name"), RepliesQuery),
    responses(
        (status = 200, description = "Thread with every reply", body = ThreadView),
        (status = 400, description = "Missing thread_id", body = ApiErrorBody),
        (status = 404, description = "Thread not found", body = ApiErrorBody)
    )
)]
pub async fn get_replies(data: web::Data<AppState>, query: web::Query<RepliesQuery>) -> Result<HttpResponse, ApiError> {
    let thread = data.board.get_thread_with_replies(query.thread_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    post,
    path = "/api/replies/{board}",
    tag = "replies",
    params(("board" = String, Path, description = "Board name")),
    request_body = NewReply,
    responses(
        (status = 303, description = "Reply added; redirects to the thread page", body = ThreadView),
        (status = 400, description = "Missing field", body = ApiErrorBody),
        (status = 404, description = "Thread not found", body = ApiErrorBody),
        (status = 429, description = "Rate limited", body = ApiErrorBody)
    )
)]
pub async fn create_reply(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: Body<NewReply>,
) -> Result<HttpResponse, ApiError> {
    rate_check(&data, &req, RateLimiterFacade::allow_reply)?;
    let board = path.into_inner();
    let p = body(payload);
    let thread = data.board
        .create_reply(p.thread_id.as_deref(), p.text.as_deref(), p.delete_password.as_deref())
        .await?;
    Ok(see_other(format!("/b/{}/{}", urlencoding::encode(&board), thread.id), thread.view()))
}

#[utoipa::path(
    put,
    path = "/api/replies/{board}",
    tag = "replies",
    params(("board" = String, Path, description = "Board name")),
    request_body = ReportReply,
    responses(
        (status = 200, description = "Plain text `success`", body = String),
        (status = 404, description = "Thread or reply not found", body = ApiErrorBody)
    )
)]
pub async fn report_reply(req: HttpRequest, data: web::Data<AppState>, payload: Body<ReportReply>) -> Result<HttpResponse, ApiError> {
    rate_check(&data, &req, RateLimiterFacade::allow_report)?;
    let p = body(payload);
    data.board.report_reply(p.thread_id.as_deref(), p.reply_id.as_deref()).await?;
    Ok(text("success"))
}

#[utoipa::path(
    delete,
    path = "/api/replies/{board}",
    tag = "replies",
    params(("board" = String, Path, description = "Board name")),
    request_body = DeleteReply,
    responses(
        (status = 200, description = "Plain text `success` or `incorrect password`", body = String),
        (status = 404, description = "Thread or reply not found", body = ApiErrorBody)
    )
)]
pub async fn delete_reply(data: web::Data<AppState>, payload: Body<DeleteReply>) -> Result<HttpResponse, ApiError> {
    let p = body(payload);
    let outcome = data.board
        .delete_reply(p.thread_id.as_deref(), p.reply_id.as_deref(), p.delete_password.as_deref())
        .await?;
    Ok(deleted(outcome))
}

/// Prometheus scrape endpoint; only mounted when a recorder is installed.
pub async fn metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}
