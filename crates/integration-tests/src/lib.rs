//! Full-stack test harness for Ubuntu Lend.
//!
//! Each [`TestContext`] migrates the database named by `TEST_DATABASE_URL`,
//! serves the real router on an ephemeral port and talks to it over HTTP
//! with a cookie-carrying client.
//!
//! # Running Tests
//!
//! ```bash
//! export TEST_DATABASE_URL=postgres://ubuntu_lend@localhost/ubuntu_lend_test
//! cargo test -p ubuntu-lend-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own users and loan types under unique names, so
//! the suite can share one database and run in parallel.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use ubuntu_lend_core::{AuthProvider, Email, LoanTypeId, PhoneNumber};
use ubuntu_lend_server::config::{OAuthConfig, RateLimitConfig, ServerConfig};
use ubuntu_lend_server::db::{LoanTypeRepository, OtpRepository, UserRepository};
use ubuntu_lend_server::middleware::create_session_layer;
use ubuntu_lend_server::models::loan_type::NewLoanType;
use ubuntu_lend_server::models::user::{NewUser, User};
use ubuntu_lend_server::services::auth::{hash_password, otp};
use ubuntu_lend_server::state::AppState;

/// Password given to every user created by [`TestContext::create_user`].
pub const PASSWORD: &str = "Correct-Horse-42-battery";

const SESSION_SECRET: &str = "t3st-Only!k9Qz7vLp2Xw4Rt8Yb1Nc6Md3Hf0J";

/// A running server plus direct database access.
pub struct TestContext {
    pub base_url: String,
    pub pool: PgPool,
    config: ServerConfig,
}

impl TestContext {
    /// Migrate the test database and start a server.
    ///
    /// Every client connects from 127.0.0.1, so the auth limiter is widened
    /// far enough that one test's sign-ins never starve another's.
    ///
    /// # Panics
    ///
    /// Panics if `TEST_DATABASE_URL` is unset or the server cannot start.
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            burst_size: 10_000,
            replenish_seconds: 1,
            trust_proxy_headers: false,
        })
        .await
    }

    /// Like [`TestContext::new`], with explicit auth rate limits.
    ///
    /// # Panics
    ///
    /// Panics if `TEST_DATABASE_URL` is unset or the server cannot start.
    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let database_url =
            std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::migrate!("../server/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let listener = tokio::net::TcpListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await
        .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let base_url = format!("http://{addr}");

        let config = ServerConfig {
            database_url: SecretString::from(database_url),
            host: addr.ip(),
            port: addr.port(),
            base_url: base_url.clone(),
            session_secret: SecretString::from(SESSION_SECRET),
            static_dir: None,
            otp_ttl: Duration::from_secs(300),
            json_logs: false,
            oauth: OAuthConfig::default(),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
            tls: None,
            rate_limit,
        };

        let session_layer = create_session_layer(&pool, &config);
        let state = AppState::new(config.clone(), pool.clone()).expect("Failed to build state");
        let app = ubuntu_lend_server::app(state, session_layer);

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        Self {
            base_url,
            pool,
            config,
        }
    }

    /// A fresh cookie jar that does not follow redirects.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Insert an active user with [`PASSWORD`].
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn create_user(&self, is_admin: bool) -> User {
        let tag = Uuid::new_v4().simple().to_string();
        let email = Email::parse(&format!("user-{tag}@example.com")).expect("valid email");
        let users = UserRepository::new(&self.pool);
        let user = users
            .create(&NewUser {
                first_name: "Amara".to_string(),
                last_name: "Okafor".to_string(),
                email: email.clone(),
                phone: Some(unique_phone()),
                password_hash: Some(hash_password(PASSWORD).expect("hash")),
                email_verified: true,
                phone_verified: true,
                auth_provider: AuthProvider::Credentials,
                avatar_url: None,
            })
            .await
            .expect("Failed to create user");
        if is_admin {
            users
                .set_admin_by_email(&email, true)
                .await
                .expect("Failed to promote user");
        }
        users
            .get_by_id(user.id)
            .await
            .expect("query")
            .expect("user exists")
    }

    /// Insert an active loan type: 1,000 to 50,000 over 3 to 24 months at 12%.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn create_loan_type(&self) -> LoanTypeId {
        let loan_type = LoanTypeRepository::new(&self.pool)
            .create(&NewLoanType {
                name: format!("Personal {}", Uuid::new_v4().simple()),
                description: "Unsecured personal loan".to_string(),
                min_amount: Decimal::from(1_000),
                max_amount: Decimal::from(50_000),
                min_term_months: 3,
                max_term_months: 24,
                base_interest_rate: Decimal::from(12),
                is_active: true,
            })
            .await
            .expect("Failed to create loan type");
        loan_type.id
    }

    /// Store `code` as the live one-time code for `phone`, valid for five
    /// minutes.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn issue_code(&self, phone: &PhoneNumber, code: &str) {
        self.issue_code_expiring(phone, code, Utc::now() + chrono::Duration::minutes(5))
            .await;
    }

    /// Store `code` for `phone` with an explicit expiry.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn issue_code_expiring(
        &self,
        phone: &PhoneNumber,
        code: &str,
        expires_at: DateTime<Utc>,
    ) {
        let digest = otp::digest(
            self.config.session_secret.expose_secret().as_bytes(),
            phone,
            code,
        );
        OtpRepository::new(&self.pool)
            .replace(phone, &digest, expires_at)
            .await
            .expect("Failed to store code");
    }

    /// Attempts recorded against the newest code for `phone`.
    ///
    /// # Panics
    ///
    /// Panics if no code was issued.
    pub async fn code_attempts(&self, phone: &PhoneNumber) -> i32 {
        sqlx::query_scalar(
            "SELECT attempts FROM otp_codes WHERE phone = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(phone.as_str())
        .fetch_one(&self.pool)
        .await
        .expect("code exists")
    }
}

/// A random Kenyan mobile number.
#[must_use]
pub fn unique_phone() -> PhoneNumber {
    let digits = Uuid::new_v4().as_u128() % 100_000_000;
    PhoneNumber::parse("254", &format!("7{digits:08}")).expect("valid phone")
}

/// Sign `client` in with email and password.
///
/// # Panics
///
/// Panics unless the login succeeds.
pub async fn login(ctx: &TestContext, client: &Client, user: &User) {
    let response = client
        .post(ctx.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": user.email, "password": PASSWORD }))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), reqwest::StatusCode::OK, "login failed");
}

/// Parse a response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn json(response: Response) -> Value {
    response.json().await.expect("JSON body")
}
