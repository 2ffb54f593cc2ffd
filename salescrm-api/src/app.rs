/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use salescrm_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = salescrm_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health                      public
/// /v1/auth/{register,login,refresh}   public
/// /v1/...                      bearer token required
/// ```
///
/// Layers, outermost first: security headers, CORS, compression, tracing.
/// Authentication is a route layer on the protected routes, so unknown
/// paths fall through to a 404 instead of a 401.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{
        accounts, activity_logs, auth, calendar, contacts, dashboard, deals, email_templates, emails, health,
        import, leads, master_data, notifications, partners, products, quote_terms, quotes, roles, sales,
        tasks, users,
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    let protected = Router::new()
        // Users and roles
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", get(users::me))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/team", get(users::get_team))
        .route(
            "/roles/:role/permissions",
            get(roles::get_permissions).put(roles::update_permissions),
        )
        // Customers
        .route("/accounts", get(accounts::list_accounts).post(accounts::create_account))
        .route(
            "/accounts/:id",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route("/contacts", get(contacts::list_contacts).post(contacts::create_contact))
        .route(
            "/contacts/:id",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/partners", get(partners::list_partners).post(partners::create_partner))
        .route(
            "/partners/:id",
            get(partners::get_partner)
                .put(partners::update_partner)
                .delete(partners::delete_partner),
        )
        // Pipeline
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route(
            "/leads/:id",
            get(leads::get_lead).put(leads::update_lead).delete(leads::delete_lead),
        )
        .route("/leads/:id/convert", post(leads::convert_lead))
        .route("/deals", get(deals::list_deals).post(deals::create_deal))
        .route(
            "/deals/:id",
            get(deals::get_deal).put(deals::update_deal).delete(deals::delete_deal),
        )
        .route("/deals/:id/items", get(deals::list_items).post(deals::add_item))
        .route("/deals/:id/items/:item_id", axum::routing::delete(deals::remove_item))
        .route(
            "/deals/:id/activities",
            get(deals::list_activities).post(deals::add_activity),
        )
        // Catalogue and quoting
        .route("/products", get(products::list_products).post(products::create_product))
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/quotes", get(quotes::list_quotes).post(quotes::create_quote))
        .route(
            "/quotes/:id",
            get(quotes::get_quote).put(quotes::update_quote).delete(quotes::delete_quote),
        )
        .route("/quotes/:id/pdf", get(quotes::quote_pdf))
        .route("/quote-terms", get(quote_terms::list_terms).post(quote_terms::create_term))
        .route(
            "/quote-terms/:id",
            put(quote_terms::update_term).delete(quote_terms::delete_term),
        )
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route(
            "/sales/:id",
            get(sales::get_sale).put(sales::update_sale).delete(sales::delete_sale),
        )
        // Work management
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/calendar", get(calendar::list_events).post(calendar::create_event))
        .route(
            "/calendar/:id",
            get(calendar::get_event)
                .put(calendar::update_event)
                .delete(calendar::delete_event),
        )
        // Communication
        .route(
            "/email-templates",
            get(email_templates::list_templates).post(email_templates::create_template),
        )
        .route(
            "/email-templates/:id",
            get(email_templates::get_template)
                .put(email_templates::update_template)
                .delete(email_templates::delete_template),
        )
        .route("/emails", get(emails::list_emails).post(emails::compose_email))
        .route("/emails/:id", get(emails::get_email).delete(emails::delete_email))
        .route("/emails/:id/send", post(emails::send_email))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id", axum::routing::delete(notifications::delete_notification))
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Administration and reporting
        .route("/activity-logs", get(activity_logs::list_activity_logs))
        .route(
            "/master-data/:category",
            get(master_data::list_values).post(master_data::create_value),
        )
        .route(
            "/master-data/:category/:id",
            put(master_data::update_value).delete(master_data::delete_value),
        )
        .route("/dashboard/summary", get(dashboard::summary))
        .route("/dashboard/pipeline", get(dashboard::pipeline))
        .route("/dashboard/sales-trend", get(dashboard::sales_trend))
        .route("/dashboard/top-performers", get(dashboard::top_performers))
        .route("/import/:entity", post(import::import_entity))
        .route("/import/:entity/template", get(import::download_template))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::require_auth,
        ));

    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected);

    let cors = if state.config.api.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", v1_routes)
        .fallback(route_not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
