//! Server-rendered CRM pages.
//!
//! - `GET       /`                               dashboard
//! - `GET|POST  /login`, `GET|POST /logout`      session entry and exit
//! - `GET       /customers?status=`              customer list
//! - `GET|POST  /customers/add`                  create customer
//! - `GET       /customers/{id}`                 customer detail with follow-ups
//! - `GET|POST  /customers/{id}/edit`            update customer
//! - `GET|POST  /customers/{id}/delete`          confirm, then delete
//! - `GET|POST  /followups/add`                  create follow-up
//! - `GET|POST  /customers/{id}/followups/add`   create follow-up, customer preselected

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::{DateTime, Local, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, warn};
use uuid::Uuid;

use crmlite_core::config::AuthConfig;
use crmlite_core::domain::customer::{Customer, CustomerFields, CustomerId, CustomerStatus};
use crmlite_core::domain::follow_up::{FollowUp, FollowUpFields, ScheduledFollowUp};
use crmlite_core::errors::{ApplicationError, InterfaceError};

use crate::boundary::CrmBoundary;
use crate::session::SessionToken;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../../templates/crm/base.html")),
    ("login.html", include_str!("../../../templates/crm/login.html")),
    ("dashboard.html", include_str!("../../../templates/crm/dashboard.html")),
    ("customer_list.html", include_str!("../../../templates/crm/customer_list.html")),
    ("customer_detail.html", include_str!("../../../templates/crm/customer_detail.html")),
    ("customer_form.html", include_str!("../../../templates/crm/customer_form.html")),
    (
        "customer_confirm_delete.html",
        include_str!("../../../templates/crm/customer_confirm_delete.html"),
    ),
    ("followup_form.html", include_str!("../../../templates/crm/followup_form.html")),
    ("error.html", include_str!("../../../templates/crm/error.html")),
];

pub fn init_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())?;
    Ok(tera)
}

#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl From<&AuthConfig> for CookieSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
            max_age_secs: config.session_ttl_secs,
        }
    }
}

impl CookieSettings {
    fn issue(&self, token: &SessionToken) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name,
            token.as_str(),
            self.max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn clear(&self) -> String {
        let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.name);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn token_from(&self, headers: &HeaderMap) -> Option<SessionToken> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.name && !value.is_empty())
            .map(|(_, value)| SessionToken::from(value.to_string()))
    }
}

#[derive(Clone)]
pub struct PageState {
    boundary: Arc<CrmBoundary>,
    templates: Arc<Tera>,
    cookie: CookieSettings,
}

impl PageState {
    pub fn new(boundary: Arc<CrmBoundary>, templates: Arc<Tera>, cookie: CookieSettings) -> Self {
        Self { boundary, templates, cookie }
    }

    fn render(&self, template: &str, mut context: Context, status: StatusCode) -> Response {
        context.insert("signed_in", &(template != "login.html"));
        match self.templates.render(template, &context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(render_error) => {
                error!(
                    event_name = "crm.page.template_error",
                    template,
                    error = ?render_error,
                    "template rendering failed"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
                    .into_response()
            }
        }
    }

    /// Maps an operation failure onto a page: sign-in redirect, 400, 404, or 500.
    fn fail(&self, failure: ApplicationError) -> Response {
        let correlation_id = Uuid::new_v4().simple().to_string();
        if let ApplicationError::Persistence(detail) = &failure {
            error!(
                event_name = "crm.page.store_error",
                correlation_id = %correlation_id,
                error = %detail,
                "store operation failed"
            );
        }

        self.error_page(failure.into_interface(correlation_id))
    }

    fn error_page(&self, interface: InterfaceError) -> Response {
        let (status, heading) = match &interface {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "Bad request"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "Not found"),
            InterfaceError::Unauthenticated { .. } => return to_login(),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
        };

        let mut context = Context::new();
        context.insert("heading", heading);
        context.insert("message", interface.user_message());
        context.insert("correlation_id", interface.correlation_id());
        self.render("error.html", context, status)
    }

    fn token(&self, headers: &HeaderMap) -> Option<SessionToken> {
        self.cookie.token_from(headers)
    }

    /// Resolves the session before the path id, so anonymous visitors are sent
    /// to sign in and an unparseable id is a missing record.
    async fn customer_scope(
        &self,
        headers: &HeaderMap,
        raw_id: &str,
    ) -> Result<(SessionToken, CustomerId), Response> {
        let token = self.token(headers).ok_or_else(to_login)?;
        if let Err(failure) = self.boundary.require_session(&token).await {
            return Err(self.fail(failure));
        }

        match raw_id.parse::<i64>() {
            Ok(id) => Ok((token, CustomerId(id))),
            Err(_) => Err(self.error_page(InterfaceError::NotFound {
                message: format!("customer `{raw_id}` not found"),
                correlation_id: Uuid::new_v4().simple().to_string(),
            })),
        }
    }
}

pub fn router(state: PageState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout).post(logout))
        .route("/customers", get(customer_list_page))
        .route("/customers/add", get(customer_add_page).post(customer_add_submit))
        .route("/customers/{id}", get(customer_detail_page))
        .route("/customers/{id}/edit", get(customer_edit_page).post(customer_edit_submit))
        .route("/customers/{id}/delete", get(customer_delete_page).post(customer_delete_submit))
        .route("/followups/add", get(follow_up_add_page).post(follow_up_add_submit))
        .route(
            "/customers/{id}/followups/add",
            get(customer_follow_up_add_page).post(customer_follow_up_add_submit),
        )
        .with_state(state)
}

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn local_display(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[derive(Serialize)]
struct StatusChoice {
    value: &'static str,
    label: &'static str,
}

fn status_choices() -> Vec<StatusChoice> {
    CustomerStatus::ALL
        .iter()
        .map(|status| StatusChoice { value: status.as_str(), label: status.label() })
        .collect()
}

#[derive(Serialize)]
struct CustomerView {
    id: i64,
    name: String,
    phone: String,
    email: String,
    address: String,
    status: &'static str,
    status_label: &'static str,
    created_at: String,
}

impl From<&Customer> for CustomerView {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.0,
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            address: customer.address.clone(),
            status: customer.status.as_str(),
            status_label: customer.status.label(),
            created_at: local_display(&customer.created_at),
        }
    }
}

#[derive(Serialize)]
struct FollowUpView {
    note: String,
    follow_up_date: String,
    next_follow_up_date: Option<String>,
    created_at: String,
}

impl From<&FollowUp> for FollowUpView {
    fn from(follow_up: &FollowUp) -> Self {
        Self {
            note: follow_up.note.clone(),
            follow_up_date: local_display(&follow_up.follow_up_date),
            next_follow_up_date: follow_up.next_follow_up_date.as_ref().map(local_display),
            created_at: local_display(&follow_up.created_at),
        }
    }
}

#[derive(Serialize)]
struct ScheduledView {
    customer_id: i64,
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    status: &'static str,
    status_label: &'static str,
    note: String,
    follow_up_date: String,
}

impl From<&ScheduledFollowUp> for ScheduledView {
    fn from(item: &ScheduledFollowUp) -> Self {
        Self {
            customer_id: item.follow_up.customer_id.0,
            customer_name: item.customer_name.clone(),
            customer_phone: item.customer_phone.clone(),
            customer_email: item.customer_email.clone(),
            status: item.customer_status.as_str(),
            status_label: item.customer_status.label(),
            note: item.follow_up.note.clone(),
            follow_up_date: local_display(&item.follow_up.follow_up_date),
        }
    }
}

#[derive(Serialize)]
struct StatusRow {
    value: &'static str,
    label: &'static str,
    count: i64,
}

async fn dashboard_page(State(state): State<PageState>, headers: HeaderMap) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };

    match state.boundary.dashboard_summary(&token, Local::now()).await {
        Ok(summary) => {
            let status_rows: Vec<StatusRow> = CustomerStatus::ALL
                .iter()
                .map(|status| StatusRow {
                    value: status.as_str(),
                    label: status.label(),
                    count: summary.status_counts.get(*status),
                })
                .collect();
            let follow_ups: Vec<ScheduledView> =
                summary.today_follow_ups.iter().map(ScheduledView::from).collect();

            let mut context = Context::new();
            context.insert("summary", &summary);
            context.insert("status_rows", &status_rows);
            context.insert("follow_ups", &follow_ups);
            state.render("dashboard.html", context, StatusCode::OK)
        }
        Err(failure) => state.fail(failure),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn login_form(
    state: &PageState,
    username: &str,
    error: Option<&str>,
    status: StatusCode,
) -> Response {
    let mut context = Context::new();
    context.insert("username", username);
    context.insert("error", &error);
    state.render("login.html", context, status)
}

async fn login_page(State(state): State<PageState>, headers: HeaderMap) -> Response {
    if let Some(token) = state.token(&headers) {
        if state.boundary.require_session(&token).await.is_ok() {
            return see_other("/");
        }
    }
    login_form(&state, "", None, StatusCode::OK)
}

async fn login_submit(State(state): State<PageState>, Form(form): Form<LoginForm>) -> Response {
    let password = SecretString::from(form.password);
    match state.boundary.authenticate(&form.username, &password).await {
        Ok(token) => with_cookie(see_other("/"), &state.cookie.issue(&token)),
        Err(ApplicationError::InvalidCredentials) => login_form(
            &state,
            form.username.trim(),
            Some("Invalid credentials"),
            StatusCode::UNAUTHORIZED,
        ),
        Err(failure) => state.fail(failure),
    }
}

async fn logout(State(state): State<PageState>, headers: HeaderMap) -> Response {
    let token = state.token(&headers);
    state.boundary.end_session(token.as_ref()).await;
    with_cookie(to_login(), &state.cookie.clear())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

async fn customer_list_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };

    match state.boundary.list_customers(&token, query.status.as_deref()).await {
        Ok(customers) => {
            let customers: Vec<CustomerView> = customers.iter().map(CustomerView::from).collect();
            let mut context = Context::new();
            context.insert("customers", &customers);
            context.insert("status_filter", query.status.as_deref().map(str::trim).unwrap_or(""));
            context.insert("status_choices", &status_choices());
            state.render("customer_list.html", context, StatusCode::OK)
        }
        Err(failure) => state.fail(failure),
    }
}

async fn customer_detail_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };

    let loaded = async {
        let customer = state.boundary.get_customer(&token, id).await?;
        let follow_ups = state.boundary.list_follow_ups_by_customer(&token, id).await?;
        Ok::<_, ApplicationError>((customer, follow_ups))
    }
    .await;

    match loaded {
        Ok((customer, follow_ups)) => {
            let follow_ups: Vec<FollowUpView> = follow_ups.iter().map(FollowUpView::from).collect();
            let mut context = Context::new();
            context.insert("customer", &CustomerView::from(&customer));
            context.insert("follow_ups", &follow_ups);
            state.render("customer_detail.html", context, StatusCode::OK)
        }
        Err(failure) => state.fail(failure),
    }
}

fn customer_form(
    state: &PageState,
    action: &str,
    form: &CustomerFields,
    is_edit: bool,
    error: Option<String>,
    status: StatusCode,
) -> Response {
    let mut context = Context::new();
    context.insert("action", action);
    context.insert("form", form);
    context.insert("is_edit", &is_edit);
    context.insert("error", &error);
    context.insert("status_choices", &status_choices());
    state.render("customer_form.html", context, status)
}

async fn customer_add_page(State(state): State<PageState>, headers: HeaderMap) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };
    if let Err(failure) = state.boundary.require_session(&token).await {
        return state.fail(failure);
    }

    let form = CustomerFields {
        status: Some(CustomerStatus::default().as_str().to_string()),
        ..CustomerFields::default()
    };
    customer_form(&state, "/customers/add", &form, false, None, StatusCode::OK)
}

async fn customer_add_submit(
    State(state): State<PageState>,
    headers: HeaderMap,
    Form(form): Form<CustomerFields>,
) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };

    match state.boundary.create_customer(&token, form.clone()).await {
        Ok(customer) => see_other(&format!("/customers/{}", customer.id)),
        Err(ApplicationError::Domain(invalid)) => customer_form(
            &state,
            "/customers/add",
            &form,
            false,
            Some(invalid.to_string()),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        Err(failure) => state.fail(failure),
    }
}

async fn customer_edit_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };

    match state.boundary.get_customer(&token, id).await {
        Ok(customer) => customer_form(
            &state,
            &format!("/customers/{id}/edit"),
            &CustomerFields::from(&customer),
            true,
            None,
            StatusCode::OK,
        ),
        Err(failure) => state.fail(failure),
    }
}

async fn customer_edit_submit(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Form(form): Form<CustomerFields>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };

    match state.boundary.update_customer(&token, id, form.clone()).await {
        Ok(customer) => see_other(&format!("/customers/{}", customer.id)),
        Err(ApplicationError::Domain(invalid)) => customer_form(
            &state,
            &format!("/customers/{id}/edit"),
            &form,
            true,
            Some(invalid.to_string()),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        Err(failure) => state.fail(failure),
    }
}

async fn customer_delete_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };

    match state.boundary.get_customer(&token, id).await {
        Ok(customer) => {
            let mut context = Context::new();
            context.insert("customer", &CustomerView::from(&customer));
            state.render("customer_confirm_delete.html", context, StatusCode::OK)
        }
        Err(failure) => state.fail(failure),
    }
}

async fn customer_delete_submit(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };

    match state.boundary.delete_customer(&token, id).await {
        Ok(()) => see_other("/customers"),
        Err(failure) => state.fail(failure),
    }
}

#[derive(Serialize)]
struct CustomerOption {
    id: i64,
    name: String,
}

async fn follow_up_form(
    state: &PageState,
    token: &SessionToken,
    preselected: Option<CustomerId>,
    form: &FollowUpFields,
    error: Option<String>,
    status: StatusCode,
) -> Response {
    let loaded = async {
        let customer = match preselected {
            Some(id) => Some(state.boundary.get_customer(token, id).await?),
            None => None,
        };
        let customers = state.boundary.list_customers(token, None).await?;
        Ok::<_, ApplicationError>((customer, customers))
    }
    .await;

    let (customer, customers) = match loaded {
        Ok(loaded) => loaded,
        Err(failure) => return state.fail(failure),
    };

    let options: Vec<CustomerOption> = customers
        .iter()
        .map(|customer| CustomerOption { id: customer.id.0, name: customer.name.clone() })
        .collect();
    let selected_customer = form
        .customer
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .or(preselected.map(|id| id.0));
    let action = match preselected {
        Some(id) => format!("/customers/{id}/followups/add"),
        None => "/followups/add".to_string(),
    };

    let mut context = Context::new();
    context.insert("action", &action);
    context.insert("customer", &customer.as_ref().map(CustomerView::from));
    context.insert("customers", &options);
    context.insert("selected_customer", &selected_customer);
    context.insert("form", form);
    context.insert("error", &error);
    state.render("followup_form.html", context, status)
}

async fn create_follow_up(
    state: &PageState,
    token: &SessionToken,
    preselected: Option<CustomerId>,
    mut form: FollowUpFields,
) -> Response {
    let customer_blank = form.customer.as_deref().map_or(true, |raw| raw.trim().is_empty());
    if customer_blank {
        if let Some(id) = preselected {
            form.customer = Some(id.to_string());
        }
    }

    match state.boundary.create_follow_up(token, form.clone()).await {
        Ok(follow_up) => see_other(&format!("/customers/{}", follow_up.customer_id)),
        Err(ApplicationError::Domain(invalid)) => {
            warn!(
                event_name = "crm.follow_up.rejected",
                error = %invalid,
                "follow-up form rejected"
            );
            follow_up_form(
                state,
                token,
                preselected,
                &form,
                Some(invalid.to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .await
        }
        Err(failure) => state.fail(failure),
    }
}

async fn follow_up_add_page(State(state): State<PageState>, headers: HeaderMap) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };
    follow_up_form(&state, &token, None, &FollowUpFields::default(), None, StatusCode::OK).await
}

async fn follow_up_add_submit(
    State(state): State<PageState>,
    headers: HeaderMap,
    Form(form): Form<FollowUpFields>,
) -> Response {
    let Some(token) = state.token(&headers) else {
        return to_login();
    };
    create_follow_up(&state, &token, None, form).await
}

async fn customer_follow_up_add_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    let form = FollowUpFields::default();
    follow_up_form(&state, &token, Some(id), &form, None, StatusCode::OK).await
}

async fn customer_follow_up_add_submit(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Form(form): Form<FollowUpFields>,
) -> Response {
    let (token, id) = match state.customer_scope(&headers, &raw_id).await {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    create_follow_up(&state, &token, Some(id), form).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use crmlite_core::auth::hash_password;
    use crmlite_core::domain::customer::{CustomerInput, CustomerStatus};
    use crmlite_db::repositories::{
        CustomerRepository, FollowUpRepository, InMemoryCrmStore, UserRepository,
    };

    use super::{init_templates, router, CookieSettings, PageState};
    use crate::boundary::CrmBoundary;
    use crate::session::SessionStore;

    const COOKIE: &str = "crmlite_session";

    async fn app() -> (Router, Arc<InMemoryCrmStore>) {
        let store = Arc::new(InMemoryCrmStore::default());
        let hash = hash_password(&SecretString::from("s3cret".to_string())).expect("hash");
        UserRepository::create(store.as_ref(), "admin", &hash).await.expect("user");

        let boundary =
            CrmBoundary::in_memory(store.clone(), Arc::new(SessionStore::new(3600)));
        let cookie =
            CookieSettings { name: COOKIE.to_string(), secure: false, max_age_secs: 3600 };
        let state = PageState::new(
            Arc::new(boundary),
            Arc::new(init_templates().expect("templates")),
            cookie,
        );
        (router(state), store)
    }

    fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn sign_in(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(form_post("/login", "username=admin&password=s3cret", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("session cookie");
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        set_cookie.split(';').next().expect("pair").to_string()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location")
    }

    #[tokio::test]
    async fn anonymous_requests_redirect_to_login() {
        let (app, _) = app().await;

        for uri in [
            "/",
            "/customers",
            "/customers/1",
            "/customers/abc",
            "/customers/abc/edit",
            "/customers/abc/followups/add",
            "/followups/add",
        ] {
            let response = app.clone().oneshot(get(uri, None)).await.expect("response");
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/login");
        }

        let delete = app
            .clone()
            .oneshot(form_post("/customers/abc/delete", "", None))
            .await
            .expect("response");
        assert_eq!(delete.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&delete), "/login");

        let forged = format!("{COOKIE}=forged");
        let response = app.clone().oneshot(get("/", Some(&forged))).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn bad_credentials_re_render_login() {
        let (app, _) = app().await;

        let response = app
            .oneshot(form_post("/login", "username=admin&password=wrong", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("Invalid credentials"));
    }

    #[tokio::test]
    async fn customer_add_redirects_to_detail_and_rejects_bad_status() {
        let (app, store) = app().await;
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/customers/add",
                "name=Ada&phone=555-0100&email=ada%40example.com&address=&status=contacted",
                Some(&cookie),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/customers/1");

        let detail = app.clone().oneshot(get("/customers/1", Some(&cookie))).await.expect("detail");
        assert_eq!(detail.status(), StatusCode::OK);
        assert!(body_text(detail).await.contains("Ada"));

        let rejected = app
            .clone()
            .oneshot(form_post(
                "/customers/add",
                "name=Bob&phone=&email=&address=&status=pending",
                Some(&cookie),
            ))
            .await
            .expect("response");
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(rejected).await.contains("pending"));
        assert_eq!(CustomerRepository::count(store.as_ref(), None).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn list_filter_and_missing_customer_statuses() {
        let (app, store) = app().await;
        let cookie = sign_in(&app).await;
        CustomerRepository::create(
            store.as_ref(),
            CustomerInput::new("Grace", "", "", "").with_status(CustomerStatus::Lost),
        )
        .await
        .expect("create");

        let listed =
            app.clone().oneshot(get("/customers?status=lost", Some(&cookie))).await.expect("list");
        assert_eq!(listed.status(), StatusCode::OK);
        assert!(body_text(listed).await.contains("Grace"));

        let bad_filter =
            app.clone().oneshot(get("/customers?status=vip", Some(&cookie))).await.expect("list");
        assert_eq!(bad_filter.status(), StatusCode::BAD_REQUEST);

        let missing = app.clone().oneshot(get("/customers/99", Some(&cookie))).await.expect("get");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        for uri in ["/customers/abc", "/customers/abc/edit", "/customers/1.5/delete"] {
            let response = app.clone().oneshot(get(uri, Some(&cookie))).await.expect("get");
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(body_text(response).await.contains("does not exist"), "{uri}");
        }
    }

    #[tokio::test]
    async fn follow_up_from_customer_page_and_delete_cascade() {
        let (app, store) = app().await;
        let cookie = sign_in(&app).await;
        let customer = CustomerRepository::create(
            store.as_ref(),
            CustomerInput::new("Ada", "555-0100", "ada@example.com", ""),
        )
        .await
        .expect("create");

        let uri = format!("/customers/{}/followups/add", customer.id);
        let form_page = app.clone().oneshot(get(&uri, Some(&cookie))).await.expect("form");
        assert_eq!(form_page.status(), StatusCode::OK);

        let created = app
            .clone()
            .oneshot(form_post(
                &uri,
                "note=Call+back&follow_up_date=2024-05-01T09%3A30&next_follow_up_date=",
                Some(&cookie),
            ))
            .await
            .expect("response");
        assert_eq!(created.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&created), format!("/customers/{}", customer.id));
        assert_eq!(FollowUpRepository::count(store.as_ref()).await.expect("count"), 1);

        let missing_date = app
            .clone()
            .oneshot(form_post(&uri, "note=Again&follow_up_date=", Some(&cookie)))
            .await
            .expect("response");
        assert_eq!(missing_date.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let deleted = app
            .clone()
            .oneshot(form_post(&format!("/customers/{}/delete", customer.id), "", Some(&cookie)))
            .await
            .expect("delete");
        assert_eq!(deleted.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&deleted), "/customers");
        assert_eq!(FollowUpRepository::count(store.as_ref()).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_ends_session() {
        let (app, _) = app().await;
        let cookie = sign_in(&app).await;

        let dashboard = app.clone().oneshot(get("/", Some(&cookie))).await.expect("dashboard");
        assert_eq!(dashboard.status(), StatusCode::OK);

        let response =
            app.clone().oneshot(form_post("/logout", "", Some(&cookie))).await.expect("logout");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cleared = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("cleared cookie");
        assert!(cleared.contains("Max-Age=0"));

        let after = app.clone().oneshot(get("/", Some(&cookie))).await.expect("dashboard");
        assert_eq!(after.status(), StatusCode::SEE_OTHER);
    }
}
