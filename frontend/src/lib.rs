extern crate console_error_panic_hook;
extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod api;
pub mod app;
pub mod config;
pub mod controller;
pub mod dom;
pub mod error;
pub mod logger;
pub mod model;
pub mod render;

pub use api::{ApiClient, Transport};
pub use app::{App, EditState, UiEvent};
pub use config::ClientConfig;
pub use controller::Controller;
pub use error::ApiError;
pub use model::{Comment, NewComment, Post, PostFields};
pub use render::PostsView;

pub use dom::bootstrap;
