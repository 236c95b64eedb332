use crate::error::ApiErrorBody;
use crate::models::{DeleteReply, DeleteThread, NewReply, NewThread, ReplyView, ReportReply, ReportThread, ThreadSummary, ThreadView};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_threads,
        crate::routes::create_thread,
        crate::routes::report_thread,
        crate::routes::delete_thread,
        crate::routes::get_replies,
        crate::routes::create_reply,
        crate::routes::report_reply,
        crate::routes::delete_reply,
    ),
    components(schemas(
        ThreadSummary, ThreadView, ReplyView,
        NewThread, ReportThread, DeleteThread,
        NewReply, ReportReply, DeleteReply,
        ApiErrorBody
    )),
    tags(
        (name = "threads", description = "Thread operations"),
        (name = "replies", description = "Reply operations"),
    )
)]
pub struct ApiDoc;
