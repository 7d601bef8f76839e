//! Client for the blog REST backend.
//!
//! [`ApiClient`] knows the routes and the JSON shapes; moving bytes is left to
//! a [`Transport`], which is `window.fetch` in the browser
//! ([`fetch::FetchTransport`]) and an in-process store in tests
//! (`memory::MemoryTransport`, behind the `test-support` feature).

pub mod fetch;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::{Comment, NewComment, Post, PostFields};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Performs one HTTP exchange. Only failures to get any response at all
    /// are errors here; status handling belongs to the caller.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// What a cascading post delete got through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Comments gone after the cascade, including ones that were already
    /// deleted (404) by the time their delete was sent.
    pub deleted_comments: Vec<String>,
    /// Comments whose delete failed; they are left behind.
    pub failed_comments: Vec<(String, ApiError)>,
    /// Set when the comments could not be listed, so none were deleted.
    pub listing_error: Option<ApiError>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failed_comments.is_empty() && self.listing_error.is_none()
    }
}

pub struct ApiClient<T> {
    config: ClientConfig,
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        ApiClient { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>, ApiError> {
        logged("fetching posts", self.fetch_json(Method::Get, "/posts").await)
    }

    pub async fn create_post(&self, fields: &PostFields) -> Result<Post, ApiError> {
        logged(
            "creating post",
            self.send_json(Method::Post, "/posts", fields).await,
        )
    }

    pub async fn update_post(&self, id: &str, fields: &PostFields) -> Result<Post, ApiError> {
        logged(
            "updating post",
            self.send_json(Method::Put, &post_path(id), fields).await,
        )
    }

    /// Deletes every comment of the post, one request at a time, then the
    /// post itself. A failed comment delete does not stop the others, and the
    /// post delete is attempted whatever happened to the comments. Fails only
    /// if the post delete fails.
    pub async fn delete_post(&self, id: &str) -> Result<CascadeReport, ApiError> {
        let mut report = CascadeReport::default();

        match self.list_comments_by_post(id).await {
            Ok(comments) => {
                for comment in comments {
                    let path = comment_path(&comment.id);
                    match self.exchange(Method::Delete, &path, None).await {
                        Ok(_) => report.deleted_comments.push(comment.id),
                        Err(err) if err.is_not_found() => {
                            debug!("comment {} was already deleted", comment.id);
                            report.deleted_comments.push(comment.id);
                        }
                        Err(err) => {
                            error!("error deleting comment {}: {}", comment.id, err);
                            report.failed_comments.push((comment.id, err));
                        }
                    }
                }
            }
            Err(err) => report.listing_error = Some(err),
        }

        if !report.is_complete() {
            error!(
                "comments of post {} only partly deleted: {} deleted, {} failed",
                id,
                report.deleted_comments.len(),
                report.failed_comments.len()
            );
        }

        logged(
            "deleting post",
            self.exchange(Method::Delete, &post_path(id), None).await,
        )?;

        Ok(report)
    }

    pub async fn list_comments_by_post(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let path = format!("/comments?postId={}", urlencoding::encode(post_id));
        logged("fetching comments", self.fetch_json(Method::Get, &path).await)
    }

    pub async fn create_comment(&self, post_id: &str, comment: &str) -> Result<Comment, ApiError> {
        let body = NewComment {
            post_id: post_id.to_owned(),
            comment: comment.to_owned(),
        };
        logged(
            "adding comment",
            self.send_json(Method::Post, "/comments", &body).await,
        )
    }

    pub async fn delete_comment(&self, id: &str) -> Result<(), ApiError> {
        logged(
            "deleting comment",
            self.exchange(Method::Delete, &comment_path(id), None).await,
        )
        .map(|_| ())
    }

    async fn fetch_json<R: DeserializeOwned>(&self, method: Method, path: &str) -> Result<R, ApiError> {
        let response = self.exchange(method, path, None).await?;
        decode(&response)
    }

    async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(body).map_err(|err| ApiError::Encode(err.to_string()))?;
        let response = self.exchange(method, path, Some(body)).await?;
        decode(&response)
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method,
            url: self.config.url(path),
            body,
        };
        debug!("{} {}", request.method.as_str(), request.url);

        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }
}

fn post_path(id: &str) -> String {
    format!("/posts/{}", urlencoding::encode(id))
}

fn comment_path(id: &str) -> String {
    format!("/comments/{}", urlencoding::encode(id))
}

fn decode<R: DeserializeOwned>(response: &ApiResponse) -> Result<R, ApiError> {
    serde_json::from_str(&response.body).map_err(|err| ApiError::Decode(err.to_string()))
}

fn logged<V>(action: &str, result: Result<V, ApiError>) -> Result<V, ApiError> {
    if let Err(err) = &result {
        error!("error {}: {}", action, err);
    }
    result
}
