use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

use super::{ApiRequest, ApiResponse, Transport};
use crate::error::ApiError;

/// Sends requests through `window.fetch`.
#[derive(Default)]
pub struct FetchTransport;

impl FetchTransport {
    pub fn new() -> Self {
        FetchTransport
    }
}

impl Transport for FetchTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let window =
            web_sys::window().ok_or_else(|| ApiError::Network("no window available".into()))?;

        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        if let Some(body) = &request.body {
            let headers = Headers::new()?;
            headers.set("Content-Type", "application/json")?;
            init.set_headers(&headers);
            init.set_body(&JsValue::from_str(body));
        }

        let js_request = Request::new_with_str_and_init(&request.url, &init)?;
        let js_response = JsFuture::from(window.fetch_with_request(&js_request)).await?;
        let response: Response = js_response.dyn_into()?;

        let body = JsFuture::from(response.text()?).await?;

        Ok(ApiResponse {
            status: response.status(),
            body: body.as_string().unwrap_or_default(),
        })
    }
}
