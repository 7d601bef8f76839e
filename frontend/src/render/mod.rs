//! Turns posts and comments into page content.
//!
//! Every render clears its target first, so calling it again with the same
//! data gives the same page.

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use futures_util::future::{join_all, LocalBoxFuture};
use futures_util::FutureExt;

use crate::api::{ApiClient, Transport};
use crate::error::ApiError;
use crate::model::{Comment, Post};

/// The parts of the page the client writes to.
pub trait PostsView {
    /// Empties the post container, comment lists included.
    fn clear_posts(&self);
    /// Appends one post card built by [`post_markup`].
    fn append_post(&self, post: &Post, markup: &str);
    /// Replaces the comment list of a rendered post.
    fn replace_comments(&self, post_id: &str, comments: &[Comment]);
    fn fill_post_form(&self, post: &Post);
    fn reset_post_form(&self);
    fn set_submit_label(&self, label: &str);
    fn reset_comment_form(&self, post_id: &str);
}

/// Comment loads started by a render, one per post, in render order.
pub struct CommentLoads<'a> {
    pending: Vec<(String, LocalBoxFuture<'a, Result<usize, ApiError>>)>,
}

impl<'a> CommentLoads<'a> {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn post_ids(&self) -> Vec<&str> {
        self.pending.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Runs all loads concurrently and waits for every one of them. Results
    /// come back in render order, whatever order the responses arrived in.
    pub async fn settle(self) -> Vec<(String, Result<usize, ApiError>)> {
        let (ids, loads): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        ids.into_iter().zip(join_all(loads).await).collect()
    }
}

pub fn render_posts<'a, T, V>(api: &'a ApiClient<T>, view: &'a V, posts: &[Post]) -> CommentLoads<'a>
where
    T: Transport + 'a,
    V: PostsView + 'a,
{
    view.clear_posts();

    let mut pending = Vec::with_capacity(posts.len());
    for post in posts {
        view.append_post(post, &post_markup(post));

        let post_id = post.id.clone();
        let load = async move { load_comments(api, view, &post_id).await };
        pending.push((post.id.clone(), load.boxed_local()));
    }

    CommentLoads { pending }
}

/// Fetches the comments of one post and redraws its list. Returns how many
/// comments were drawn.
pub async fn load_comments<T, V>(api: &ApiClient<T>, view: &V, post_id: &str) -> Result<usize, ApiError>
where
    T: Transport,
    V: PostsView,
{
    let comments = api.list_comments_by_post(post_id).await?;
    view.replace_comments(post_id, &comments);
    Ok(comments.len())
}

pub fn post_markup(post: &Post) -> String {
    let id = escape(&post.id);
    let image = match post.image() {
        Some(url) => format!(
            "\n  <img src=\"{}\" alt=\"Image\" style=\"max-width: 100%; height: auto;\">",
            escape(url)
        ),
        None => String::new(),
    };

    format!(
        r#"<div class="post" data-id="{id}">
  <h2>{title}</h2>
  <p>{content}</p>{image}
  <button class="editPostButton" data-id="{id}">Edit</button>
  <button class="deletePostButton" data-id="{id}">Delete</button>
  <div class="commentsContainer" data-id="{id}">
    <h3>Comments:</h3>
    <ul id="comments-{id}"></ul>
    <form class="createCommentForm" data-id="{id}">
      <input type="text" class="commentInput" placeholder="New comment" required>
      <button type="submit">Add comment</button>
    </form>
  </div>
</div>"#,
        id = id,
        title = escape(&post.title),
        content = escape(&post.content),
        image = image,
    )
}

/// Element id of a post's comment list.
pub fn comments_list_id(post_id: &str) -> String {
    format!("comments-{}", post_id)
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
