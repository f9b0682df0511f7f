use cookie_store::{CookieStore, RawCookie};
use http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{Request, Response, StatusCode};
use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::debug;
use url::{Url, form_urlencoded};

use super::authorization::has_code;
use crate::config::FormLoginConfig;
use crate::http_client::{HttpClient, HttpClientError};

/// Redirects followed before and after submitting the login form.
const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("login page transport error: `{0}`")]
    Transport(String),
    #[error("unexpected login page response: Status code: `{0}`")]
    UnexpectedResponse(u16),
    #[error("login form not found: `{0}`")]
    FormNotFound(String),
    #[error("invalid url in login flow: `{0}`")]
    InvalidUrl(String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("credentials were not accepted")]
    LoginRejected,
    #[error("login cancelled")]
    Cancelled,
}

impl AutomationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AutomationError::Cancelled)
    }
}

impl From<HttpClientError> for AutomationError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Cancelled => AutomationError::Cancelled,
            e => AutomationError::Transport(e.to_string()),
        }
    }
}

/// Logs in at the identity provider's login page without operator interaction.
pub trait FormLogin {
    /// Returns the redirect url carrying the authorization code.
    fn login(
        &self,
        form: &FormLoginConfig,
        auth_url: &Url,
        username: &str,
        password: &str,
    ) -> Result<Url, AutomationError>;
}

/// Scripted browser: fetches the login page, submits its form and follows the redirects.
#[derive(Debug, Clone)]
pub struct HttpFormLogin<C> {
    http_client: C,
}

impl<C> HttpFormLogin<C> {
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }
}

impl<C> FormLogin for HttpFormLogin<C>
where
    C: HttpClient,
{
    fn login(
        &self,
        form: &FormLoginConfig,
        auth_url: &Url,
        username: &str,
        password: &str,
    ) -> Result<Url, AutomationError> {
        let mut session = Session::new(&self.http_client);

        let (page_url, page) = match session.follow(auth_url.clone())? {
            Landing::Code(redirect) => {
                debug!("provider session already authenticated");
                return Ok(redirect);
            }
            Landing::Page(url, body) => (url, body),
        };

        let html_form = select_form(&parse_forms(&page), form.form_id.as_deref())?;
        let action = if html_form.action.is_empty() {
            page_url.clone()
        } else {
            page_url
                .join(&html_form.action)
                .map_err(|e| AutomationError::InvalidUrl(e.to_string()))?
        };

        let mut fields = form_urlencoded::Serializer::new(String::new());
        for input in html_form.inputs.iter().filter(|i| i.kind == "hidden") {
            fields.append_pair(&input.name, &input.value);
        }
        fields.append_pair(&form.username_field, username);
        fields.append_pair(&form.password_field, password);
        for (name, value) in &form.extra_fields {
            fields.append_pair(name, value);
        }
        let fields = fields.finish();

        debug!("submitting login form to {action} with {}", html_form.method);
        if html_form.method == "get" {
            let mut target = action;
            target.set_query(Some(&fields));
            return match session.follow(target)? {
                Landing::Code(redirect) => Ok(redirect),
                Landing::Page(..) => Err(AutomationError::LoginRejected),
            };
        }
        let response = session.post_form(&action, fields)?;
        match redirect_location(&action, &response)? {
            Some(next) if has_code(&next) => Ok(next),
            Some(next) => match session.follow(next)? {
                Landing::Code(redirect) => Ok(redirect),
                Landing::Page(..) => Err(AutomationError::LoginRejected),
            },
            None if response.status() == StatusCode::OK => Err(AutomationError::LoginRejected),
            None => Err(AutomationError::UnexpectedResponse(
                response.status().as_u16(),
            )),
        }
    }
}

/// Where following a chain of redirects ended.
enum Landing {
    Code(Url),
    Page(Url, String),
}

/// Cookie jar shared by the requests of one login. Cookies are scoped by domain and path.
struct Session<'c, C> {
    http_client: &'c C,
    cookies: CookieStore,
}

impl<'c, C: HttpClient> Session<'c, C> {
    fn new(http_client: &'c C) -> Self {
        Self {
            http_client,
            cookies: CookieStore::default(),
        }
    }

    fn follow(&mut self, start: Url) -> Result<Landing, AutomationError> {
        let mut url = start;
        for _ in 0..MAX_REDIRECTS {
            if has_code(&url) {
                return Ok(Landing::Code(url));
            }
            let response = self.send(Request::get(url.as_str()), &url, Vec::new())?;
            match redirect_location(&url, &response)? {
                Some(next) => url = next,
                None if response.status() == StatusCode::OK => {
                    let body = String::from_utf8_lossy(response.body()).to_string();
                    return Ok(Landing::Page(url, body));
                }
                None => {
                    return Err(AutomationError::UnexpectedResponse(
                        response.status().as_u16(),
                    ));
                }
            }
        }
        Err(AutomationError::TooManyRedirects)
    }

    fn post_form(&mut self, url: &Url, body: String) -> Result<Response<Vec<u8>>, AutomationError> {
        let builder = Request::post(url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(builder, url, body.into_bytes())
    }

    fn send(
        &mut self,
        builder: http::request::Builder,
        url: &Url,
        body: Vec<u8>,
    ) -> Result<Response<Vec<u8>>, AutomationError> {
        let builder = match self.cookie_header(url) {
            Some(cookies) => builder.header(COOKIE, cookies),
            None => builder,
        };
        let request = builder
            .body(body)
            .map_err(|e| AutomationError::InvalidUrl(e.to_string()))?;

        let response = self.http_client.send(request)?;
        self.store_cookies(url, &response);
        Ok(response)
    }

    fn store_cookies(&mut self, url: &Url, response: &Response<Vec<u8>>) {
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| RawCookie::parse(value.to_string()).ok());
        self.cookies.store_response_cookies(cookies, url);
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        let header = self
            .cookies
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }
}

fn redirect_location(
    base: &Url,
    response: &Response<Vec<u8>>,
) -> Result<Option<Url>, AutomationError> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|e| AutomationError::InvalidUrl(e.to_string()))?;
    base.join(location)
        .map(Some)
        .map_err(|e| AutomationError::InvalidUrl(format!("{location}: {e}")))
}

#[derive(Debug, Clone, Default, PartialEq)]
struct HtmlForm {
    id: Option<String>,
    action: String,
    /// Lowercase submission method, `get` when the form does not set one.
    method: String,
    inputs: Vec<HtmlInput>,
}

#[derive(Debug, Clone, PartialEq)]
struct HtmlInput {
    name: String,
    kind: String,
    value: String,
}

fn select_form(forms: &[HtmlForm], form_id: Option<&str>) -> Result<HtmlForm, AutomationError> {
    match form_id {
        Some(id) => forms.iter().find(|f| f.id.as_deref() == Some(id)),
        None => forms.first(),
    }
    .cloned()
    .ok_or_else(|| AutomationError::FormNotFound(form_id.unwrap_or("<first>").to_string()))
}

fn parse_forms(html: &str) -> Vec<HtmlForm> {
    let document = Html::parse_document(html);
    elements(document.root_element(), "form")
        .map(|form| HtmlForm {
            id: form.value().attr("id").map(str::to_string),
            action: form.value().attr("action").unwrap_or_default().to_string(),
            method: form
                .value()
                .attr("method")
                .unwrap_or("get")
                .to_ascii_lowercase(),
            inputs: elements(form, "input")
                .filter_map(|input| {
                    let input = input.value();
                    Some(HtmlInput {
                        name: input.attr("name")?.to_string(),
                        kind: input.attr("type").unwrap_or("text").to_ascii_lowercase(),
                        value: input.attr("value").unwrap_or_default().to_string(),
                    })
                })
                .collect(),
        })
        .collect()
}

/// Elements named `name` below `root`, in document order.
fn elements<'a>(root: ElementRef<'a>, name: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |element| element.value().name() == name)
}
