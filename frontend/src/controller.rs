use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures_util::lock::Mutex;
use log::{debug, warn};

use crate::api::{ApiClient, CascadeReport, Transport};
use crate::app::EditState;
use crate::error::ApiError;
use crate::model::{Comment, Post, PostFields};
use crate::render::{load_comments, render_posts, PostsView};

/// Posts whose title or content contains `query`, ignoring case. An empty
/// query keeps every post.
pub fn filter_posts(posts: Vec<Post>, query: &str) -> Vec<Post> {
    let query = query.to_lowercase();
    posts
        .into_iter()
        .filter(|post| {
            post.title.to_lowercase().contains(&query)
                || post.content.to_lowercase().contains(&query)
        })
        .collect()
}

/// Async locks keyed by post id. Handlers interleave at every await, so two
/// mutations of one post would otherwise run their requests interleaved.
#[derive(Default)]
pub struct PostLocks {
    locks: RefCell<HashMap<String, Rc<Mutex<()>>>>,
}

impl PostLocks {
    pub async fn exclusive<F: Future>(&self, post_id: &str, work: F) -> F::Output {
        let lock = self
            .locks
            .borrow_mut()
            .entry(post_id.to_owned())
            .or_insert_with(|| Rc::new(Mutex::new(())))
            .clone();

        let output = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        let mut locks = self.locks.borrow_mut();
        if locks.get(post_id).map_or(false, |lock| Rc::strong_count(lock) == 1) {
            locks.remove(post_id);
        }

        output
    }

    pub fn held(&self) -> usize {
        self.locks.borrow().len()
    }
}

/// Runs the user actions: each one calls the api, then redraws what changed.
pub struct Controller<T, V> {
    api: ApiClient<T>,
    view: V,
    locks: PostLocks,
}

impl<T: Transport, V: PostsView> Controller<T, V> {
    pub fn new(api: ApiClient<T>, view: V) -> Self {
        Controller {
            api,
            view,
            locks: PostLocks::default(),
        }
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn locks(&self) -> &PostLocks {
        &self.locks
    }

    pub async fn start(&self) -> Result<usize, ApiError> {
        self.refresh().await
    }

    /// Fetches every post and redraws the list, comments included. Returns
    /// the number of posts drawn.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let posts = self.api.list_posts().await?;
        self.show(&posts).await;
        Ok(posts.len())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Post>, ApiError> {
        let posts = filter_posts(self.api.list_posts().await?, query);
        debug!("search {:?} matched {} posts", query, posts.len());
        self.show(&posts).await;
        Ok(posts)
    }

    /// Creates a post, or updates the one being edited. Returns the state the
    /// form is in afterwards; on error the caller keeps its current state.
    pub async fn submit_post(
        &self,
        state: &EditState,
        fields: PostFields,
    ) -> Result<EditState, ApiError> {
        match state {
            EditState::Editing(post_id) => {
                self.locks
                    .exclusive(post_id, self.api.update_post(post_id, &fields))
                    .await?;
                self.view.set_submit_label(&self.api.config().create_label);
            }
            EditState::Idle => {
                self.api.create_post(&fields).await?;
            }
        }

        self.view.reset_post_form();
        self.redraw().await;
        Ok(EditState::Idle)
    }

    /// Loads the post into the form. A post that no longer exists leaves
    /// `state` as it was.
    pub async fn edit_post(&self, state: &EditState, post_id: &str) -> Result<EditState, ApiError> {
        let posts = self.api.list_posts().await?;

        match posts.into_iter().find(|post| post.id == post_id) {
            Some(post) => {
                self.view.fill_post_form(&post);
                self.view.set_submit_label(&self.api.config().update_label);
                Ok(EditState::Editing(post.id))
            }
            None => {
                debug!("post {} not found for editing", post_id);
                Ok(state.clone())
            }
        }
    }

    /// Deletes the post and its comments, then redraws whatever is left.
    pub async fn delete_post(&self, post_id: &str) -> Result<CascadeReport, ApiError> {
        let result = self
            .locks
            .exclusive(post_id, self.api.delete_post(post_id))
            .await;
        self.redraw().await;
        result
    }

    pub async fn submit_comment(&self, post_id: &str, comment: &str) -> Result<Comment, ApiError> {
        let created = self.api.create_comment(post_id, comment).await?;
        // failure is already logged; the new comment shows on the next redraw
        let _ = load_comments(&self.api, &self.view, post_id).await;
        self.view.reset_comment_form(post_id);
        Ok(created)
    }

    async fn show(&self, posts: &[Post]) {
        let loads = render_posts(&self.api, &self.view, posts);
        for (post_id, result) in loads.settle().await {
            if let Err(err) = result {
                warn!("comments of post {} not shown: {}", post_id, err);
            }
        }
    }

    async fn redraw(&self) {
        // a failed listing is logged by the client and leaves the old list up
        let _ = self.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryTransport;
    use crate::api::Method;
    use crate::config::{ClientConfig, CREATE_LABEL, UPDATE_LABEL};
    use crate::render::memory::MemoryView;
    use futures_util::future::join;

    fn controller() -> Controller<MemoryTransport, MemoryView> {
        let _ = env_logger::builder().is_test(true).try_init();
        Controller::new(
            ApiClient::new(ClientConfig::default(), MemoryTransport::new()),
            MemoryView::new(),
        )
    }

    fn post(id: &str, title: &str, content: &str) -> Post {
        Post {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            image_url: None,
        }
    }

    #[test]
    fn filter_matches_title_or_content_ignoring_case() {
        let posts = vec![
            post("1", "Rust Tips", "borrowing"),
            post("2", "Cooking", "Rusty pans"),
            post("3", "Travel", "trains"),
        ];

        let ids = |posts: Vec<Post>| posts.into_iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(filter_posts(posts.clone(), "rUsT")), vec!["1", "2"]);
        assert_eq!(ids(filter_posts(posts.clone(), "")), vec!["1", "2", "3"]);
        assert!(filter_posts(posts, "zebra").is_empty());
    }

    #[tokio::test]
    async fn search_renders_only_matches() {
        let controller = controller();
        let api = controller.api();
        api.create_post(&PostFields::new("Hello", "world", "")).await.unwrap();
        api.create_post(&PostFields::new("Other", "HELLO again", "")).await.unwrap();
        api.create_post(&PostFields::new("Nothing", "here", "")).await.unwrap();

        controller.search("hello").await.unwrap();
        assert_eq!(controller.view().rendered_post_ids(), vec!["1", "2"]);

        controller.search("no such text").await.unwrap();
        assert!(controller.view().rendered_post_ids().is_empty());
    }

    #[tokio::test]
    async fn submit_while_idle_creates_and_resets_form() {
        let controller = controller();

        let next = controller
            .submit_post(&EditState::Idle, PostFields::new("A", "x", ""))
            .await
            .unwrap();

        assert_eq!(next, EditState::Idle);
        assert_eq!(controller.view().rendered_post_ids(), vec!["1"]);
        assert_eq!(controller.view().snapshot().post_form_resets, 1);
    }

    #[tokio::test]
    async fn edit_then_submit_updates_in_place() {
        let controller = controller();
        let api = controller.api();
        let original = api.create_post(&PostFields::new("A", "x", "")).await.unwrap();

        let state = controller
            .edit_post(&EditState::Idle, &original.id)
            .await
            .unwrap();
        assert_eq!(state, EditState::Editing(original.id.clone()));
        assert_eq!(controller.view().form(), PostFields::new("A", "x", ""));
        assert_eq!(controller.view().submit_label().as_deref(), Some(UPDATE_LABEL));

        let state = controller
            .submit_post(&state, PostFields::new("B", "y", "pic.png"))
            .await
            .unwrap();

        assert_eq!(state, EditState::Idle);
        assert_eq!(controller.view().submit_label().as_deref(), Some(CREATE_LABEL));
        let posts = api.list_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, original.id);
        assert_eq!(posts[0].fields(), PostFields::new("B", "y", "pic.png"));
    }

    #[tokio::test]
    async fn edit_of_missing_post_keeps_state() {
        let controller = controller();
        let editing = EditState::Editing("3".into());

        assert_eq!(
            controller.edit_post(&EditState::Idle, "99").await.unwrap(),
            EditState::Idle
        );
        assert_eq!(controller.edit_post(&editing, "99").await.unwrap(), editing);
        assert_eq!(controller.view().submit_label(), None);
    }

    #[tokio::test]
    async fn failed_update_keeps_editing_and_form() {
        let controller = controller();
        let editing = EditState::Editing("gone".into());

        let err = controller
            .submit_post(&editing, PostFields::new("B", "y", ""))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(controller.view().snapshot().post_form_resets, 0);
        assert!(controller.api().list_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_redraws_without_the_post() {
        let controller = controller();
        let api = controller.api();
        let a = api.create_post(&PostFields::new("A", "x", "")).await.unwrap();
        api.create_post(&PostFields::new("B", "y", "")).await.unwrap();
        api.create_comment(&a.id, "hi").await.unwrap();
        controller.start().await.unwrap();
        assert_eq!(controller.view().comments_of("1"), vec!["hi"]);

        let report = controller.delete_post(&a.id).await.unwrap();

        assert_eq!(report.deleted_comments, vec!["c1"]);
        assert_eq!(controller.view().rendered_post_ids(), vec!["2"]);
        assert!(api.transport().comments().is_empty());
        assert_eq!(controller.locks().held(), 0);
    }

    #[tokio::test]
    async fn deletes_of_one_post_do_not_interleave() {
        let controller = controller();
        let api = controller.api();
        let post = api.create_post(&PostFields::new("A", "x", "")).await.unwrap();
        api.create_comment(&post.id, "one").await.unwrap();
        api.transport().clear_requests();

        let (first, second) = join(
            controller.delete_post(&post.id),
            controller.delete_post(&post.id),
        )
        .await;

        assert!(first.is_ok());
        assert!(second.unwrap_err().is_not_found());

        // redraws list posts in between; only the cascades matter here
        let base = "http://localhost:3000";
        let cascades: Vec<String> = api
            .transport()
            .requests()
            .into_iter()
            .map(|(method, url)| format!("{} {}", method.as_str(), url))
            .filter(|request| request != &format!("GET {}/posts", base))
            .collect();
        assert_eq!(
            cascades,
            vec![
                format!("GET {}/comments?postId=1", base),
                format!("DELETE {}/comments/c1", base),
                format!("DELETE {}/posts/1", base),
                // the second delete only starts once the first one is done
                format!("GET {}/comments?postId=1", base),
                format!("DELETE {}/posts/1", base),
            ]
        );
        assert_eq!(controller.locks().held(), 0);
    }

    #[tokio::test]
    async fn comment_submit_reloads_only_that_post() {
        let controller = controller();
        let api = controller.api();
        api.create_post(&PostFields::new("A", "x", "")).await.unwrap();
        api.create_post(&PostFields::new("B", "y", "")).await.unwrap();
        controller.start().await.unwrap();
        api.transport().clear_requests();

        let created = controller.submit_comment("2", "nice").await.unwrap();

        assert_eq!(created.post_id, "2");
        assert_eq!(controller.view().comments_of("2"), vec!["nice"]);
        assert!(controller.view().comments_of("1").is_empty());
        assert_eq!(controller.view().snapshot().comment_form_resets, vec!["2"]);
        assert_eq!(api.transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn failed_comment_keeps_the_form() {
        let controller = controller();
        controller
            .api()
            .transport()
            .fail_on(Method::Post, "/comments");

        assert!(controller.submit_comment("1", "hi").await.is_err());
        assert!(controller.view().snapshot().comment_form_resets.is_empty());
    }
}
