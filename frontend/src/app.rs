use std::cell::RefCell;

use log::{debug, error};

use crate::api::Transport;
use crate::controller::Controller;
use crate::error::ApiError;
use crate::model::PostFields;
use crate::render::PostsView;

/// Whether the create/edit form creates a new post or updates an existing one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    Idle,
    Editing(String),
}

impl EditState {
    pub fn is_editing(&self) -> bool {
        matches!(self, EditState::Editing(_))
    }

    pub fn post_id(&self) -> Option<&str> {
        match self {
            EditState::Editing(post_id) => Some(post_id),
            EditState::Idle => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Search { query: String },
    SubmitPost(PostFields),
    EditClick { post_id: String },
    DeleteClick { post_id: String },
    SubmitComment { post_id: String, comment: String },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::Search { .. } => "search",
            UiEvent::SubmitPost(_) => "post submit",
            UiEvent::EditClick { .. } => "edit",
            UiEvent::DeleteClick { .. } => "delete",
            UiEvent::SubmitComment { .. } => "comment submit",
        }
    }
}

/// One page session: the controller plus the edit state of the form.
pub struct App<T, V> {
    controller: Controller<T, V>,
    edit: RefCell<EditState>,
}

impl<T: Transport, V: PostsView> App<T, V> {
    pub fn new(controller: Controller<T, V>) -> Self {
        App {
            controller,
            edit: RefCell::new(EditState::Idle),
        }
    }

    pub fn controller(&self) -> &Controller<T, V> {
        &self.controller
    }

    pub fn edit_state(&self) -> EditState {
        self.edit.borrow().clone()
    }

    pub async fn start(&self) -> Result<(), ApiError> {
        let result = self.controller.start().await;
        if let Err(err) = &result {
            error!("startup failed: {}", err);
        }
        result.map(|_| ())
    }

    pub async fn handle(&self, event: UiEvent) -> Result<(), ApiError> {
        let name = event.name();

        let result = match event {
            UiEvent::Search { query } => self.controller.search(&query).await.map(|_| ()),
            UiEvent::SubmitPost(fields) => {
                let state = self.edit_state();
                let next = self.controller.submit_post(&state, fields).await;
                next.map(|next| self.replace_edit_state(&state, next))
            }
            UiEvent::EditClick { post_id } => {
                let state = self.edit_state();
                let next = self.controller.edit_post(&state, &post_id).await;
                next.map(|next| self.set_edit_state(next))
            }
            UiEvent::DeleteClick { post_id } => {
                self.controller.delete_post(&post_id).await.map(|_| ())
            }
            UiEvent::SubmitComment { post_id, comment } => self
                .controller
                .submit_comment(&post_id, &comment)
                .await
                .map(|_| ()),
        };

        if let Err(err) = &result {
            error!("{} failed: {}", name, err);
        }
        result
    }

    fn set_edit_state(&self, state: EditState) {
        *self.edit.borrow_mut() = state;
    }

    // Only moves on from the state the handler started with; an edit click
    // that finished in the meantime wins.
    fn replace_edit_state(&self, expected: &EditState, next: EditState) {
        let mut edit = self.edit.borrow_mut();
        if *edit == *expected {
            *edit = next;
        } else {
            debug!("edit state changed to {:?} during submit, keeping it", *edit);
        }
    }
}
