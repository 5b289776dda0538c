// src/api.rs
use crate::accounts;
use crate::auth::{clear_session_cookie, SessionKeys, SessionUser, SESSION_COOKIE};
use crate::broker;
use crate::db::Database;
use crate::error::{Apology, DatabaseError, Unauthenticated};
use crate::lookup::QuoteLookup;
use crate::models::TradeReceipt;
use crate::views;
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA, SET_COOKIE};
use warp::http::{StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const FLASH_COOKIE: &str = "flash";
const FORM_LIMIT: u64 = 16 * 1024;

/// Shared handles every handler needs.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub quotes: Arc<dyn QuoteLookup>,
    pub sessions: Arc<SessionKeys>,
    pub initial_cash: Decimal,
}

#[derive(Deserialize)]
struct TradeForm {
    symbol: Option<String>,
    shares: Option<String>,
}

#[derive(Deserialize)]
struct QuoteForm {
    symbol: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct RegisterForm {
    username: Option<String>,
    password: Option<String>,
    confirmation: Option<String>,
}

#[derive(Deserialize)]
struct PasswordForm {
    current_password: Option<String>,
    new_password: Option<String>,
    confirmation: Option<String>,
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(flash())
        .and(with_state(state.clone()))
        .and_then(index_handler);

    let buy_form = warp::path!("buy")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and_then(buy_form_handler);

    let buy = warp::path!("buy")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(form::<TradeForm>())
        .and(with_state(state.clone()))
        .and_then(buy_handler);

    let sell_form = warp::path!("sell")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(sell_form_handler);

    let sell = warp::path!("sell")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(form::<TradeForm>())
        .and(with_state(state.clone()))
        .and_then(sell_handler);

    let quote_form = warp::path!("quote")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and_then(quote_form_handler);

    let quote = warp::path!("quote")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(form::<QuoteForm>())
        .and(with_state(state.clone()))
        .and_then(quote_handler);

    let history = warp::path!("history")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(history_handler);

    let login_form = warp::path!("login")
        .and(warp::get())
        .and_then(login_form_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(form::<LoginForm>())
        .and(with_state(state.clone()))
        .and_then(login_handler);

    let logout = warp::path!("logout")
        .and(warp::get())
        .and_then(logout_handler);

    let register_form = warp::path!("register")
        .and(warp::get())
        .and_then(register_form_handler);

    let register = warp::path!("register")
        .and(warp::post())
        .and(form::<RegisterForm>())
        .and(with_state(state.clone()))
        .and_then(register_handler);

    let profile = warp::path!("profile")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(profile_handler);

    let profile_submit = warp::path!("profile")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .map(|_user: SessionUser| redirect(Uri::from_static("/password_change")));

    let password_form = warp::path!("password_change")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and_then(password_form_handler);

    let password_change = warp::path!("password_change")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(form::<PasswordForm>())
        .and(with_state(state))
        .and_then(password_change_handler);

    let trading = index
        .or(buy_form)
        .or(buy)
        .or(sell_form)
        .or(sell)
        .or(quote_form)
        .or(quote)
        .or(history);

    let account_routes = login_form
        .or(login)
        .or(logout)
        .or(register_form)
        .or(register)
        .or(profile)
        .or(profile_submit)
        .or(password_form)
        .or(password_change);

    trading
        .or(account_routes)
        .recover(handle_rejection)
        .with(warp::reply::with::headers(no_cache_headers()))
        .with(warp::log("finance::http"))
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn form<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

/// Session gate for protected routes.
fn authenticated(state: AppState) -> impl Filter<Extract = (SessionUser,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(with_state(state))
        .and_then(require_session)
}

async fn require_session(token: Option<String>, state: AppState) -> Result<SessionUser, Rejection> {
    let session = token
        .and_then(|t| state.sessions.verify(&t))
        .ok_or_else(|| warp::reject::custom(Unauthenticated))?;

    // Tokens outlive accounts when the database is replaced.
    match state.db.get_user(session.id).await {
        Ok(user) => Ok(SessionUser {
            id: user.id,
            username: user.username,
        }),
        Err(DatabaseError::UserNotFound(_)) => Err(warp::reject::custom(Unauthenticated)),
        Err(e) => Err(warp::reject::custom(Apology::from(e))),
    }
}

fn flash() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(FLASH_COOKIE).map(|raw: Option<String>| {
        raw.and_then(|encoded| hex::decode(encoded).ok())
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|message| !message.is_empty())
    })
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

fn html(body: String) -> Response {
    warp::reply::html(body).into_response()
}

fn redirect(location: Uri) -> Response {
    warp::redirect::see_other(location).into_response()
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Dropping invalid Set-Cookie header: {}", e),
    }
}

fn redirect_home_with_flash(message: &str) -> Response {
    let mut response = redirect(Uri::from_static("/"));
    append_cookie(
        &mut response,
        &format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/",
            FLASH_COOKIE,
            hex::encode(message)
        ),
    );
    response
}

fn apology_response(apology: &Apology) -> Response {
    warp::reply::with_status(
        warp::reply::html(views::apology_page(&apology.message, apology.status)),
        apology.status,
    )
    .into_response()
}

fn start_session(
    response: &mut Response,
    sessions: &SessionKeys,
    user_id: i64,
    username: &str,
) -> Result<(), Rejection> {
    let token = sessions
        .create_token(user_id, username)
        .ok_or_else(|| warp::reject::custom(Apology::internal()))?;
    append_cookie(response, &sessions.session_cookie(&token));
    Ok(())
}

fn trade_message(verb: &str, receipt: &TradeReceipt) -> String {
    format!(
        "{} {} shares of {} for {}.",
        verb,
        receipt.transaction.share_quantity.abs(),
        receipt.transaction.symbol,
        views::usd(receipt.transaction.total_paid)
    )
}

// ========== Trading handlers ==========

async fn index_handler(
    user: SessionUser,
    flash: Option<String>,
    state: AppState,
) -> Result<Response, Rejection> {
    let summary = broker::portfolio(&state.db, state.quotes.as_ref(), user.id)
        .await
        .map_err(warp::reject::custom)?;
    let mut response = html(views::index_page(&user.username, flash.as_deref(), &summary));
    if flash.is_some() {
        append_cookie(
            &mut response,
            &format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", FLASH_COOKIE),
        );
    }
    Ok(response)
}

async fn buy_form_handler(user: SessionUser) -> Result<Response, Rejection> {
    Ok(html(views::buy_page(&user.username)))
}

async fn buy_handler(
    user: SessionUser,
    form: TradeForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let receipt = broker::buy(
        &state.db,
        state.quotes.as_ref(),
        user.id,
        form.symbol.as_deref(),
        form.shares.as_deref(),
    )
    .await
    .map_err(warp::reject::custom)?;
    Ok(redirect_home_with_flash(&trade_message("Bought", &receipt)))
}

async fn sell_form_handler(user: SessionUser, state: AppState) -> Result<Response, Rejection> {
    let holdings = state
        .db
        .holdings(user.id)
        .await
        .map_err(|e| warp::reject::custom(Apology::from(e)))?;
    Ok(html(views::sell_page(&user.username, &holdings)))
}

async fn sell_handler(
    user: SessionUser,
    form: TradeForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let receipt = broker::sell(
        &state.db,
        state.quotes.as_ref(),
        user.id,
        form.symbol.as_deref(),
        form.shares.as_deref(),
    )
    .await
    .map_err(warp::reject::custom)?;
    Ok(redirect_home_with_flash(&trade_message("Sold", &receipt)))
}

async fn quote_form_handler(user: SessionUser) -> Result<Response, Rejection> {
    Ok(html(views::quote_page(&user.username)))
}

async fn quote_handler(
    user: SessionUser,
    form: QuoteForm,
    state: AppState,
) -> Result<Response, Rejection> {
    let quote = broker::quote(state.quotes.as_ref(), form.symbol.as_deref())
        .await
        .map_err(warp::reject::custom)?;
    Ok(html(views::quoted_page(&user.username, &quote)))
}

async fn history_handler(user: SessionUser, state: AppState) -> Result<Response, Rejection> {
    let transactions = state
        .db
        .transactions(user.id)
        .await
        .map_err(|e| warp::reject::custom(Apology::from(e)))?;
    Ok(html(views::history_page(&user.username, &transactions)))
}

// ========== Account handlers ==========

async fn login_form_handler() -> Result<Response, Rejection> {
    let mut response = html(views::login_page());
    append_cookie(&mut response, &clear_session_cookie());
    Ok(response)
}

async fn login_handler(form: LoginForm, state: AppState) -> Result<Response, Rejection> {
    match accounts::login(&state.db, form.username.as_deref(), form.password.as_deref()).await {
        Ok(user) => {
            let mut response = redirect(Uri::from_static("/"));
            start_session(&mut response, &state.sessions, user.id, &user.username)?;
            Ok(response)
        }
        Err(apology) => {
            let mut response = apology_response(&apology);
            append_cookie(&mut response, &clear_session_cookie());
            Ok(response)
        }
    }
}

async fn logout_handler() -> Result<Response, Rejection> {
    let mut response = redirect(Uri::from_static("/"));
    append_cookie(&mut response, &clear_session_cookie());
    Ok(response)
}

async fn register_form_handler() -> Result<Response, Rejection> {
    Ok(html(views::register_page()))
}

async fn register_handler(form: RegisterForm, state: AppState) -> Result<Response, Rejection> {
    let user = accounts::register(
        &state.db,
        state.initial_cash,
        form.username.as_deref(),
        form.password.as_deref(),
        form.confirmation.as_deref(),
    )
    .await
    .map_err(warp::reject::custom)?;

    let mut response = redirect_home_with_flash("Registered!");
    start_session(&mut response, &state.sessions, user.id, &user.username)?;
    Ok(response)
}

async fn profile_handler(user: SessionUser, state: AppState) -> Result<Response, Rejection> {
    let user = state
        .db
        .get_user(user.id)
        .await
        .map_err(|e| warp::reject::custom(Apology::from(e)))?;
    Ok(html(views::profile_page(&user)))
}

async fn password_form_handler(user: SessionUser) -> Result<Response, Rejection> {
    Ok(html(views::password_change_page(&user.username)))
}

async fn password_change_handler(
    user: SessionUser,
    form: PasswordForm,
    state: AppState,
) -> Result<Response, Rejection> {
    accounts::change_password(
        &state.db,
        user.id,
        form.current_password.as_deref(),
        form.new_password.as_deref(),
        form.confirmation.as_deref(),
    )
    .await
    .map_err(warp::reject::custom)?;
    info!("User {} changed their password", user.id);
    Ok(redirect_home_with_flash("Password changed with success!"))
}

// ========== Rejections ==========

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if err.find::<Unauthenticated>().is_some() {
        return Ok(redirect(Uri::from_static("/login")));
    }

    let apology = if let Some(apology) = err.find::<Apology>() {
        warn!("Apology: {}", apology);
        Apology::with_status(apology.message.clone(), apology.status)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        Apology::with_status("Form submission too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        Apology::with_status(
            "Unsupported form encoding",
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        )
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        Apology::new("Invalid form submission")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Apology::with_status("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else if err.is_not_found() {
        Apology::with_status("Page not found", StatusCode::NOT_FOUND)
    } else {
        error!("Unhandled rejection: {:?}", err);
        Apology::internal()
    };

    Ok(apology_response(&apology))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticQuotes;
    use chrono::Duration;
    use warp::http::header::{COOKIE, LOCATION};
    use warp::hyper::body::Bytes;
    use warp::test::RequestBuilder;

    type TestResponse = warp::http::Response<Bytes>;

    async fn test_state() -> AppState {
        AppState {
            db: Arc::new(Database::new_in_memory().await.unwrap()),
            quotes: Arc::new(StaticQuotes::new(&[("AAPL", "100"), ("MSFT", "250.50")])),
            sessions: Arc::new(SessionKeys::new(b"test-secret", Duration::hours(1))),
            initial_cash: Decimal::from(10000),
        }
    }

    fn post(path: &str, body: &str) -> RequestBuilder {
        warp::test::request()
            .method("POST")
            .path(path)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body.to_string())
    }

    fn cookie_value(response: &TestResponse, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&prefix))
            .map(|v| v[prefix.len()..].split(';').next().unwrap_or("").to_string())
    }

    fn location(response: &TestResponse) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    fn body(response: &TestResponse) -> String {
        String::from_utf8(response.body().to_vec()).unwrap()
    }

    async fn register(state: &AppState, username: &str) -> String {
        let api = routes(state.clone());
        let response = post(
            "/register",
            &format!("username={0}&password=pw&confirmation=pw", username),
        )
        .reply(&api)
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        cookie_value(&response, SESSION_COOKIE).unwrap()
    }

    fn session(token: &str) -> String {
        format!("{}={}", SESSION_COOKIE, token)
    }

    #[tokio::test]
    async fn test_protected_routes_redirect_to_login() {
        let api = routes(test_state().await);
        for path in ["/", "/buy", "/sell", "/quote", "/history", "/profile", "/password_change"] {
            let response = warp::test::request().path(path).reply(&api).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(location(&response), "/login", "{}", path);
        }

        let response = post("/buy", "symbol=AAPL&shares=1").reply(&api).await;
        assert_eq!(location(&response), "/login");

        let response = warp::test::request()
            .path("/")
            .header(COOKIE, session("forged.token.value"))
            .reply(&api)
            .await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_responses_are_not_cacheable() {
        let api = routes(test_state().await);
        for path in ["/login", "/", "/nowhere"] {
            let response = warp::test::request().path(path).reply(&api).await;
            let headers = response.headers();
            assert_eq!(headers[CACHE_CONTROL], "no-cache, no-store, must-revalidate");
            assert_eq!(headers[EXPIRES], "0");
            assert_eq!(headers[PRAGMA], "no-cache");
        }
    }

    #[tokio::test]
    async fn test_register_logs_in_and_flashes() {
        let state = test_state().await;
        let api = routes(state.clone());

        let response = post("/register", "username=alice&password=pw&confirmation=pw")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let token = cookie_value(&response, SESSION_COOKIE).unwrap();
        let flash = cookie_value(&response, FLASH_COOKIE).unwrap();

        let response = warp::test::request()
            .path("/")
            .header(COOKIE, format!("{}; {}={}", session(&token), FLASH_COOKIE, flash))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(&response);
        assert!(page.contains("Registered!"));
        assert!(page.contains("$10,000.00"));
        assert_eq!(cookie_value(&response, FLASH_COOKIE), Some(String::new()));
    }

    #[tokio::test]
    async fn test_garbled_flash_cookie_is_ignored() {
        let state = test_state().await;
        let token = register(&state, "alice").await;
        let api = routes(state);

        let response = warp::test::request()
            .path("/")
            .header(COOKIE, format!("{}; {}=not-hex", session(&token), FLASH_COOKIE))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(&response).contains("$10,000.00"));
        assert_eq!(cookie_value(&response, FLASH_COOKIE), None);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let state = test_state().await;
        register(&state, "alice").await;

        let api = routes(state);
        let response = post("/register", "username=alice&password=x&confirmation=x")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(&response).contains("Username already exists"));
    }

    #[tokio::test]
    async fn test_login_errors_are_identical() {
        let state = test_state().await;
        register(&state, "alice").await;
        let api = routes(state);

        let wrong_password = post("/login", "username=alice&password=nope").reply(&api).await;
        let unknown_user = post("/login", "username=mallory&password=nope").reply(&api).await;
        assert_eq!(wrong_password.status(), StatusCode::FORBIDDEN);
        assert_eq!(unknown_user.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(&wrong_password), body(&unknown_user));
        assert!(body(&wrong_password).contains("invalid username and/or password"));

        let response = post("/login", "username=alice&password=pw").reply(&api).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(cookie_value(&response, SESSION_COOKIE).is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_buy_sell_history_flow() {
        let state = test_state().await;
        let token = register(&state, "alice").await;
        let api = routes(state.clone());

        let response = post("/buy", "symbol=aapl&shares=10")
            .header(COOKIE, session(&token))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let flash = cookie_value(&response, FLASH_COOKIE).unwrap();
        assert_eq!(
            String::from_utf8(hex::decode(flash).unwrap()).unwrap(),
            "Bought 10 shares of AAPL for $1,000.00."
        );

        let page = body(
            &warp::test::request()
                .path("/")
                .header(COOKIE, session(&token))
                .reply(&api)
                .await,
        );
        assert!(page.contains("<td>AAPL</td><td>10</td>"));
        assert!(page.contains("$9,000.00"));

        let sell_page = body(
            &warp::test::request()
                .path("/sell")
                .header(COOKIE, session(&token))
                .reply(&api)
                .await,
        );
        assert!(sell_page.contains("<option value=\"AAPL\">AAPL (10)</option>"));

        let response = post("/sell", "symbol=AAPL&shares=10")
            .header(COOKIE, session(&token))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let user = state.db.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.cash, Decimal::from(10000));
        assert!(state.db.holdings(user.id).await.unwrap().is_empty());

        let history = body(
            &warp::test::request()
                .path("/history")
                .header(COOKIE, session(&token))
                .reply(&api)
                .await,
        );
        let buy_row = history.find("<td>buy</td>").unwrap();
        let sell_row = history.find("<td>sell</td>").unwrap();
        assert!(buy_row < sell_row);
        assert!(history.contains("<td>-10</td>"));
    }

    #[tokio::test]
    async fn test_trade_validation_renders_apology() {
        let state = test_state().await;
        let token = register(&state, "alice").await;
        let api = routes(state);

        let cases = [
            ("/buy", "symbol=AAPL&shares=abc", "Amount of shares must be a positive integer"),
            ("/buy", "symbol=NOPE&shares=1", "Symbol not found"),
            ("/buy", "symbol=AAPL&shares=101", "Not enough cash to buy the shares"),
            ("/sell", "symbol=AAPL&shares=1", "You don&#x27;t own any shares of AAPL"),
            ("/sell", "shares=1", "You must select a symbol"),
        ];
        for (path, form, message) in cases {
            let response = post(path, form)
                .header(COOKIE, session(&token))
                .reply(&api)
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", path, form);
            assert!(body(&response).contains(message), "{} {}", path, form);
        }
    }

    #[tokio::test]
    async fn test_quote_page() {
        let state = test_state().await;
        let token = register(&state, "alice").await;
        let api = routes(state);

        let response = post("/quote", "symbol=msft")
            .header(COOKIE, session(&token))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(&response).contains("A share of MSFT costs $250.50."));
    }

    #[tokio::test]
    async fn test_password_change_and_logout() {
        let state = test_state().await;
        let token = register(&state, "alice").await;
        let api = routes(state);

        let response = post("/profile", "")
            .header(COOKIE, session(&token))
            .reply(&api)
            .await;
        assert_eq!(location(&response), "/password_change");

        let response = post(
            "/password_change",
            "current_password=pw&new_password=new&confirmation=new",
        )
        .header(COOKIE, session(&token))
        .reply(&api)
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = post("/login", "username=alice&password=new").reply(&api).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = warp::test::request()
            .path("/logout")
            .header(COOKIE, session(&token))
            .reply(&api)
            .await;
        assert_eq!(location(&response), "/");
        assert_eq!(cookie_value(&response, SESSION_COOKIE), Some(String::new()));
    }

    #[tokio::test]
    async fn test_unknown_routes_and_methods() {
        let api = routes(test_state().await);

        let response = warp::test::request().path("/nowhere").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = warp::test::request()
            .method("DELETE")
            .path("/buy")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
