//! In-process stand-in for the REST backend, answering the same routes with
//! the same JSON shapes. Ids are handed out as `"1"`, `"2"`, ... for posts and
//! `"c1"`, `"c2"`, ... for comments and never reused.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::Serialize;

use super::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::ApiError;
use crate::model::{Comment, NewComment, Post, PostFields};

#[derive(Default)]
struct Store {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    next_post_id: u64,
    next_comment_id: u64,
}

#[derive(Default)]
pub struct MemoryTransport {
    store: RefCell<Store>,
    requests: RefCell<Vec<(Method, String)>>,
    canned: RefCell<Vec<(Method, String, ApiResponse)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        MemoryTransport::default()
    }

    /// Every request seen so far, as (method, full url).
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.borrow().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }

    /// Answers the next request for `path` (including any query) with a 500.
    pub fn fail_on(&self, method: Method, path: &str) {
        self.respond_raw(method, path, 500, "injected failure");
    }

    /// Answers the next request for `path` with the given status and body
    /// instead of routing it.
    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        self.canned.borrow_mut().push((
            method,
            path.to_owned(),
            ApiResponse {
                status,
                body: body.to_owned(),
            },
        ));
    }

    pub fn posts(&self) -> Vec<Post> {
        self.store.borrow().posts.clone()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.store.borrow().comments.clone()
    }

    fn take_canned(&self, method: Method, path: &str) -> Option<ApiResponse> {
        let mut canned = self.canned.borrow_mut();
        let index = canned
            .iter()
            .position(|(m, p, _)| *m == method && p == path)?;
        Some(canned.remove(index).2)
    }

    fn route(&self, method: Method, path: &str, body: Option<&str>) -> ApiResponse {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        let segments: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(decode)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut store = self.store.borrow_mut();
        match (method, segments.as_slice()) {
            (Method::Get, ["posts"]) => json(200, &store.posts),
            (Method::Post, ["posts"]) => match parse::<PostFields>(body) {
                Some(fields) => {
                    store.next_post_id += 1;
                    let post = Post {
                        id: store.next_post_id.to_string(),
                        title: fields.title,
                        content: fields.content,
                        image_url: Some(fields.image_url),
                    };
                    store.posts.push(post.clone());
                    json(201, &post)
                }
                None => bad_request(),
            },
            (Method::Put, ["posts", id]) => match parse::<PostFields>(body) {
                Some(fields) => match store.posts.iter_mut().find(|post| post.id == *id) {
                    Some(post) => {
                        post.title = fields.title;
                        post.content = fields.content;
                        post.image_url = Some(fields.image_url);
                        json(200, &*post)
                    }
                    None => not_found(),
                },
                None => bad_request(),
            },
            (Method::Delete, ["posts", id]) => {
                match store.posts.iter().position(|post| post.id == *id) {
                    Some(index) => {
                        store.posts.remove(index);
                        empty()
                    }
                    None => not_found(),
                }
            }
            (Method::Get, ["comments"]) => {
                let post_id = query.and_then(|query| query_param(query, "postId"));
                let comments: Vec<&Comment> = store
                    .comments
                    .iter()
                    .filter(|comment| match &post_id {
                        Some(post_id) => comment.post_id == *post_id,
                        None => true,
                    })
                    .collect();
                json(200, &comments)
            }
            (Method::Post, ["comments"]) => match parse::<NewComment>(body) {
                Some(new_comment) => {
                    store.next_comment_id += 1;
                    let comment = Comment {
                        id: format!("c{}", store.next_comment_id),
                        post_id: new_comment.post_id,
                        comment: new_comment.comment,
                    };
                    store.comments.push(comment.clone());
                    json(201, &comment)
                }
                None => bad_request(),
            },
            (Method::Delete, ["comments", id]) => {
                match store.comments.iter().position(|comment| comment.id == *id) {
                    Some(index) => {
                        store.comments.remove(index);
                        empty()
                    }
                    None => not_found(),
                }
            }
            _ => not_found(),
        }
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests
            .borrow_mut()
            .push((request.method, request.url.clone()));

        // a real network call suspends; let other handlers interleave here
        YieldOnce(false).await;

        let path = path_of(&request.url);
        if let Some(response) = self.take_canned(request.method, path) {
            return Ok(response);
        }
        Ok(self.route(request.method, path, request.body.as_deref()))
    }
}

struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

// "http://host:port/posts/1?x=y" -> "/posts/1?x=y"
fn path_of(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => "/",
            }
        }
        None => url,
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode(value))
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

fn parse<T: serde::de::DeserializeOwned>(body: Option<&str>) -> Option<T> {
    body.and_then(|body| serde_json::from_str(body).ok())
}

fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> ApiResponse {
    match serde_json::to_string(value) {
        Ok(body) => ApiResponse { status, body },
        Err(err) => ApiResponse {
            status: 500,
            body: err.to_string(),
        },
    }
}

fn empty() -> ApiResponse {
    ApiResponse {
        status: 200,
        body: "{}".into(),
    }
}

fn not_found() -> ApiResponse {
    ApiResponse {
        status: 404,
        body: "{}".into(),
    }
}

fn bad_request() -> ApiResponse {
    ApiResponse {
        status: 400,
        body: "{}".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, path: &str, body: Option<&str>) -> ApiRequest {
        ApiRequest {
            method,
            url: format!("http://localhost:3000{}", path),
            body: body.map(str::to_owned),
        }
    }

    #[test]
    fn path_of_strips_scheme_and_host() {
        assert_eq!(path_of("http://localhost:3000/posts/1"), "/posts/1");
        assert_eq!(path_of("https://a.b/comments?postId=2"), "/comments?postId=2");
        assert_eq!(path_of("http://a.b"), "/");
        assert_eq!(path_of("/posts"), "/posts");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let transport = MemoryTransport::new();
        let response = transport
            .send(request(Method::Get, "/users", None))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let transport = MemoryTransport::new();
        let response = transport
            .send(request(Method::Post, "/posts", Some("{\"title\":1}")))
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let transport = MemoryTransport::new();
        let body = r#"{"title":"t","content":"c","imageUrl":""}"#;
        transport
            .send(request(Method::Post, "/posts", Some(body)))
            .await
            .unwrap();
        transport
            .send(request(Method::Delete, "/posts/1", None))
            .await
            .unwrap();
        let response = transport
            .send(request(Method::Post, "/posts", Some(body)))
            .await
            .unwrap();

        let post: Post = serde_json::from_str(&response.body).unwrap();
        assert_eq!(post.id, "2");
    }

    #[tokio::test]
    async fn comments_without_post_filter_lists_all() {
        let transport = MemoryTransport::new();
        for post_id in ["1", "2"] {
            let body = format!(r#"{{"postId":"{}","comment":"hi"}}"#, post_id);
            transport
                .send(request(Method::Post, "/comments", Some(&body)))
                .await
                .unwrap();
        }

        let all = transport
            .send(request(Method::Get, "/comments", None))
            .await
            .unwrap();
        let comments: Vec<Comment> = serde_json::from_str(&all.body).unwrap();
        assert_eq!(comments.len(), 2);
    }

    #[tokio::test]
    async fn canned_responses_are_used_once() {
        let transport = MemoryTransport::new();
        transport.fail_on(Method::Get, "/posts");

        let first = transport
            .send(request(Method::Get, "/posts", None))
            .await
            .unwrap();
        let second = transport
            .send(request(Method::Get, "/posts", None))
            .await
            .unwrap();

        assert_eq!(first.status, 500);
        assert_eq!(second.status, 200);
        assert_eq!(transport.requests().len(), 2);
    }
}
