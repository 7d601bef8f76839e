use std::cell::RefCell;
use std::collections::BTreeMap;

use super::PostsView;
use crate::model::{Comment, Post, PostFields};

/// What a [`MemoryView`] currently shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    /// (post id, card markup) in page order.
    pub posts: Vec<(String, String)>,
    pub comments: BTreeMap<String, Vec<String>>,
    pub form: PostFields,
    pub submit_label: Option<String>,
    pub post_form_resets: usize,
    pub comment_form_resets: Vec<String>,
}

/// A [`PostsView`] that keeps the page in memory, for running the client
/// without a browser.
#[derive(Default)]
pub struct MemoryView {
    state: RefCell<ViewState>,
}

impl MemoryView {
    pub fn new() -> Self {
        MemoryView::default()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn rendered_post_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .posts
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn comments_of(&self, post_id: &str) -> Vec<String> {
        self.state
            .borrow()
            .comments
            .get(post_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn form(&self) -> PostFields {
        self.state.borrow().form.clone()
    }

    /// Types into the create/edit form.
    pub fn set_form(&self, fields: PostFields) {
        self.state.borrow_mut().form = fields;
    }

    pub fn submit_label(&self) -> Option<String> {
        self.state.borrow().submit_label.clone()
    }
}

impl PostsView for MemoryView {
    fn clear_posts(&self) {
        let mut state = self.state.borrow_mut();
        state.posts.clear();
        state.comments.clear();
    }

    fn append_post(&self, post: &Post, markup: &str) {
        let mut state = self.state.borrow_mut();
        state.posts.push((post.id.clone(), markup.to_owned()));
        state.comments.insert(post.id.clone(), Vec::new());
    }

    fn replace_comments(&self, post_id: &str, comments: &[Comment]) {
        // like the page, a list only exists while its post is rendered
        if let Some(list) = self.state.borrow_mut().comments.get_mut(post_id) {
            *list = comments.iter().map(|c| c.comment.clone()).collect();
        }
    }

    fn fill_post_form(&self, post: &Post) {
        self.state.borrow_mut().form = post.fields();
    }

    fn reset_post_form(&self) {
        let mut state = self.state.borrow_mut();
        state.form = PostFields::default();
        state.post_form_resets += 1;
    }

    fn set_submit_label(&self, label: &str) {
        self.state.borrow_mut().submit_label = Some(label.to_owned());
    }

    fn reset_comment_form(&self, post_id: &str) {
        self.state
            .borrow_mut()
            .comment_form_resets
            .push(post_id.to_owned());
    }
}
