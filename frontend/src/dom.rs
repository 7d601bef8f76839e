//! Page wiring: a `PostsView` over the real document, the event listeners,
//! and the `bootstrap` entry point called from the page's script.

use std::rc::Rc;

use log::{error, info, warn, LevelFilter};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlFormElement, HtmlInputElement, HtmlTextAreaElement,
    Storage,
};

use crate::api::fetch::FetchTransport;
use crate::api::ApiClient;
use crate::app::{App, UiEvent};
use crate::config::{ClientConfig, API_URL_LOCAL_STORAGE_KEY};
use crate::controller::Controller;
use crate::logger;
use crate::model::{Comment, Post, PostFields};
use crate::render::{comments_list_id, PostsView};

pub const POSTS_CONTAINER_ID: &'static str = "postsContainer";
pub const SEARCH_FORM_ID: &'static str = "searchForm";
pub const SEARCH_INPUT_ID: &'static str = "searchInput";
pub const POST_FORM_ID: &'static str = "createPostForm";
pub const TITLE_INPUT_ID: &'static str = "titleInput";
pub const CONTENT_INPUT_ID: &'static str = "contentInput";
pub const IMAGE_URL_INPUT_ID: &'static str = "imageUrlInput";

pub const EDIT_BUTTON_CLASS: &'static str = "editPostButton";
pub const DELETE_BUTTON_CLASS: &'static str = "deletePostButton";
pub const COMMENT_FORM_CLASS: &'static str = "createCommentForm";
pub const COMMENT_INPUT_CLASS: &'static str = "commentInput";

pub type DomApp = App<FetchTransport, DomView>;

pub fn get_local_storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// Points the client at another backend. Takes effect on the next page load.
#[wasm_bindgen]
pub fn set_api_url(api_url: &str) {
    match get_local_storage() {
        Some(storage) => {
            if let Err(err) = storage.set_item(API_URL_LOCAL_STORAGE_KEY, api_url) {
                error!("could not store api url: {:?}", err);
            }
        }
        None => warn!("no local storage, api url not stored"),
    }
}

#[wasm_bindgen]
pub fn bootstrap() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    // a second bootstrap keeps the logger it already has
    let _ = logger::init(LevelFilter::Info);

    let document = match web_sys::window().and_then(|window| window.document()) {
        Some(document) => document,
        None => {
            error!("no document to attach to");
            return;
        }
    };

    let stored_api_url =
        get_local_storage().and_then(|storage| storage.get_item(API_URL_LOCAL_STORAGE_KEY).ok().flatten());
    let config = ClientConfig::resolve(stored_api_url);
    info!("using api at {}", config.api_url);

    let api = ApiClient::new(config, FetchTransport::new());
    let view = DomView::new(document.clone());
    let app = Rc::new(App::new(Controller::new(api, view)));

    if let Err(err) = install(&app, &document) {
        error!("could not bind page events: {:?}", err);
    }

    spawn_local(async move {
        // failures are logged by the app
        let _ = app.start().await;
    });
}

/// Registers the page's event listeners. Post buttons and comment forms are
/// redrawn on every render, so every event is handled by delegation on the
/// document.
pub fn install(app: &Rc<DomApp>, document: &Document) -> Result<(), JsValue> {
    for kind in ["submit", "click"] {
        let app = app.clone();
        listen(document, kind, move |event: Event| {
            if let Some(ui_event) = ui_event_for(app.controller().view(), &event) {
                dispatch(&app, ui_event);
            }
        })?;
    }
    Ok(())
}

/// Translates a bubbled DOM event into the app event it stands for. Form
/// submits that are recognised have their default navigation cancelled.
pub fn ui_event_for(view: &DomView, event: &Event) -> Option<UiEvent> {
    let target = event_target(event)?;
    match event.type_().as_str() {
        "click" => button_event(&target),
        "submit" => {
            let ui_event = form_event(view, &target)?;
            event.prevent_default();
            Some(ui_event)
        }
        _ => None,
    }
}

fn listen<F>(target: &EventTarget, kind: &str, handler: F) -> Result<(), JsValue>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn dispatch(app: &Rc<DomApp>, ui_event: UiEvent) {
    let app = app.clone();
    spawn_local(async move {
        let _ = app.handle(ui_event).await;
    });
}

fn event_target(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn button_event(target: &Element) -> Option<UiEvent> {
    let class_selector = |class: &str| format!(".{}", class);

    if let Some(button) = target.closest(&class_selector(EDIT_BUTTON_CLASS)).ok().flatten() {
        let post_id = button.get_attribute("data-id")?;
        return Some(UiEvent::EditClick { post_id });
    }
    if let Some(button) = target.closest(&class_selector(DELETE_BUTTON_CLASS)).ok().flatten() {
        let post_id = button.get_attribute("data-id")?;
        return Some(UiEvent::DeleteClick { post_id });
    }
    None
}

fn form_event(view: &DomView, target: &Element) -> Option<UiEvent> {
    match target.id().as_str() {
        SEARCH_FORM_ID => Some(UiEvent::Search {
            query: view.input_value(SEARCH_INPUT_ID),
        }),
        POST_FORM_ID => Some(UiEvent::SubmitPost(view.post_form_fields())),
        _ => comment_event(&comment_form(target)?),
    }
}

fn comment_form(target: &Element) -> Option<Element> {
    target
        .closest(&format!(".{}", COMMENT_FORM_CLASS))
        .ok()
        .flatten()
}

fn comment_event(form: &Element) -> Option<UiEvent> {
    let post_id = form.get_attribute("data-id")?;
    let comment = form
        .query_selector(&format!(".{}", COMMENT_INPUT_CLASS))
        .ok()
        .flatten()?
        .dyn_into::<HtmlInputElement>()
        .ok()?
        .value();
    Some(UiEvent::SubmitComment { post_id, comment })
}

pub struct DomView {
    document: Document,
}

impl DomView {
    pub fn new(document: Document) -> Self {
        DomView { document }
    }

    pub fn element(&self, id: &str) -> Option<Element> {
        let element = self.document.get_element_by_id(id);
        if element.is_none() {
            warn!("no #{} on the page", id);
        }
        element
    }

    pub fn input_value(&self, id: &str) -> String {
        let element = match self.element(id) {
            Some(element) => element,
            None => return String::new(),
        };
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.value()
        } else {
            warn!("#{} is not an input", id);
            String::new()
        }
    }

    fn set_input_value(&self, id: &str, value: &str) {
        if let Some(element) = self.element(id) {
            if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
                input.set_value(value);
            } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
                area.set_value(value);
            }
        }
    }

    pub fn post_form_fields(&self) -> PostFields {
        PostFields {
            title: self.input_value(TITLE_INPUT_ID),
            content: self.input_value(CONTENT_INPUT_ID),
            image_url: self.input_value(IMAGE_URL_INPUT_ID),
        }
    }

    fn query(&self, selector: &str) -> Option<Element> {
        let element = self.document.query_selector(selector).ok().flatten();
        if element.is_none() {
            warn!("nothing matches {} on the page", selector);
        }
        element
    }
}

fn reset_form(form: &Element) {
    match form.dyn_ref::<HtmlFormElement>() {
        Some(form) => form.reset(),
        None => warn!("{} is not a form", form.tag_name()),
    }
}

impl PostsView for DomView {
    fn clear_posts(&self) {
        if let Some(container) = self.element(POSTS_CONTAINER_ID) {
            container.set_inner_html("");
        }
    }

    fn append_post(&self, post: &Post, markup: &str) {
        if let Some(container) = self.element(POSTS_CONTAINER_ID) {
            if let Err(err) = container.insert_adjacent_html("beforeend", markup) {
                warn!("could not insert post {}: {:?}", post.id, err);
            }
        }
    }

    fn replace_comments(&self, post_id: &str, comments: &[Comment]) {
        let list = match self.element(&comments_list_id(post_id)) {
            Some(list) => list,
            None => return,
        };
        list.set_inner_html("");

        for comment in comments {
            let item = match self.document.create_element("li") {
                Ok(item) => item,
                Err(err) => {
                    warn!("could not create comment item: {:?}", err);
                    return;
                }
            };
            item.set_text_content(Some(&comment.comment));
            if let Err(err) = list.append_child(&item) {
                warn!("could not append comment {}: {:?}", comment.id, err);
            }
        }
    }

    fn fill_post_form(&self, post: &Post) {
        let fields = post.fields();
        self.set_input_value(TITLE_INPUT_ID, &fields.title);
        self.set_input_value(CONTENT_INPUT_ID, &fields.content);
        self.set_input_value(IMAGE_URL_INPUT_ID, &fields.image_url);
    }

    fn reset_post_form(&self) {
        if let Some(form) = self.element(POST_FORM_ID) {
            reset_form(&form);
        }
    }

    fn set_submit_label(&self, label: &str) {
        let selector = format!("#{} button[type=\"submit\"]", POST_FORM_ID);
        if let Some(button) = self.query(&selector) {
            button.set_text_content(Some(label));
        }
    }

    fn reset_comment_form(&self, post_id: &str) {
        let selector = format!(
            ".{}[data-id=\"{}\"]",
            COMMENT_FORM_CLASS,
            post_id.replace('\\', "\\\\").replace('"', "\\\"")
        );
        if let Some(form) = self.query(&selector) {
            reset_form(&form);
        }
    }
}
