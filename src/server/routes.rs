//! Routing over a transport-independent request, so handlers can be driven without a socket.

use serde::Deserialize;

use crate::orchestrator::{Orchestrator, UploadRequest, UploadedFile};
use crate::server::multipart;
use crate::server::response::{
    ApiResponse, answer_response, courses_response, ingest_response,
};
use crate::utils::config::Messages;

/// The parts of an HTTP request the handlers look at.
#[derive(Clone, Copy, Debug)]
pub struct ApiRequest<'a> {
    pub method: &'a str,
    /// Request target; a query string is ignored.
    pub url: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

pub fn dispatch(app: &Orchestrator, req: &ApiRequest<'_>) -> ApiResponse {
    let path = req.url.split('?').next().unwrap_or_default();
    let method = req.method.to_ascii_uppercase();
    match (method.as_str(), path) {
        ("POST", "/videos") => upload_video(app, req),
        ("GET", "/courses") => courses_response(app.list_courses()),
        ("POST", "/student-query") => student_query(app, req),
        (_, "/videos" | "/courses" | "/student-query") => {
            ApiResponse::error(405, "Method not allowed.")
        }
        _ => ApiResponse::error(404, "Not found."),
    }
}

fn upload_video(app: &Orchestrator, req: &ApiRequest<'_>) -> ApiResponse {
    let form = match req
        .content_type
        .ok_or(multipart::MultipartError::NotMultipart)
        .and_then(multipart::boundary)
        .and_then(|b| multipart::parse(req.body, b))
    {
        Ok(form) => form,
        Err(e) => {
            log::debug!("Rejected upload body: {}", e);
            return ApiResponse::error(400, Messages::MISSING_FIELDS);
        }
    };

    let video = match form.part("video") {
        Some(part) if part.file_name.is_none() => {
            return ApiResponse::error(400, Messages::INVALID_VIDEO);
        }
        Some(part) => Some(UploadedFile {
            file_name: part.file_name.as_deref(),
            data: part.data,
        }),
        None => None,
    };
    let request = UploadRequest {
        video,
        title: form.text("title"),
        number: form.text("number"),
        course: form.text("course"),
    };
    ingest_response(app.ingest(request))
}

#[derive(Debug, Default, Deserialize)]
struct StudentQuery {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    course: Option<String>,
}

fn student_query(app: &Orchestrator, req: &ApiRequest<'_>) -> ApiResponse {
    let query: StudentQuery = serde_json::from_slice(req.body).unwrap_or_default();
    let course = query.course.unwrap_or_default();
    let question = query.question.unwrap_or_default();
    answer_response(app.answer(&course, &question))
}
