pub const DEFAULT_API_URL: &'static str = "http://localhost:3000";
pub const API_URL_LOCAL_STORAGE_KEY: &'static str = "blog_api_url";

pub const CREATE_LABEL: &'static str = "Create post";
pub const UPDATE_LABEL: &'static str = "Update post";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    /// Submit button text while no post is being edited.
    pub create_label: String,
    /// Submit button text while a post is being edited.
    pub update_label: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_owned(),
            create_label: CREATE_LABEL.to_owned(),
            update_label: UPDATE_LABEL.to_owned(),
        }
    }
}

impl ClientConfig {
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        let trimmed = api_url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_url = trimmed.to_owned();
        }
        self
    }

    /// Defaults, with the api url replaced by a stored override if one is set.
    pub fn resolve(stored_api_url: Option<String>) -> Self {
        match stored_api_url {
            Some(api_url) => ClientConfig::default().with_api_url(&api_url),
            None => ClientConfig::default(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}
