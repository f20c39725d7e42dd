use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Response};

const DELIVERY_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Network access carrying the viewer's Panopto credentials.
///
/// Whoever holds a `SiteSession` can make requests as the signed-in viewer,
/// so it is handed explicitly to the components that need it.
#[async_trait]
pub trait SiteSession: Send + Sync {
    /// POST a pre-encoded form body.
    async fn post_form(&self, url: &str, body: String) -> reqwest::Result<Response>;

    async fn get(&self, url: &str) -> reqwest::Result<Response>;
}

/// [`SiteSession`] that replays a browser `Cookie` header.
#[derive(Clone)]
pub struct CookieSession {
    client: Client,
    cookie: Option<String>,
}

impl CookieSession {
    pub fn new(cookie: Option<String>) -> Self {
        Self {
            client: Client::new(),
            cookie: cookie.filter(|c| !c.trim().is_empty()),
        }
    }

    fn with_cookie(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.cookie {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }
}

#[async_trait]
impl SiteSession for CookieSession {
    async fn post_form(&self, url: &str, body: String) -> reqwest::Result<Response> {
        self.with_cookie(self.client.post(url))
            .header(ACCEPT, DELIVERY_ACCEPT)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
    }

    async fn get(&self, url: &str) -> reqwest::Result<Response> {
        self.with_cookie(self.client.get(url)).send().await
    }
}
