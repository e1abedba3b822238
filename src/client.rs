//! Session/account orchestrator.
//!
//! Owns the decision logic around every remote call: whether the stored
//! token and conversation context ride along with a request, how the
//! heterogeneous response shapes are interpreted, and which state records
//! get written back afterwards. Network access goes through [`Backend`],
//! state through [`StateStore`].

use chrono::Utc;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{ApiError, Result};
use crate::gateway::{Backend, CallOpts};
use crate::store::StateStore;
use crate::types::{
    AccountState, Answer, Capability, FeatureAccess, LoginRequest, RegisterRequest, SessionState,
    TierConfig, UsageInfo, UsageLimit, UsageStats, UserProfile, first_string,
};

const REGISTER_USER: &str = "RegisterUser";
const LOGIN_USER: &str = "LoginUser";
const VALIDATE_TOKEN: &str = "ValidateToken";
const GET_USER_PROFILE: &str = "GetUserProfile";
const GET_TIER_CONFIGURATION: &str = "GetTierConfiguration";
const CHECK_USAGE_LIMIT: &str = "CheckUsageLimit";
const GET_USAGE_STATISTICS: &str = "GetUsageStatistics";
const CHECK_FEATURE_ACCESS: &str = "CheckFeatureAccess";
/// Question-answering endpoint of the freemium deployment.
const ASK_QUESTION: &str = "ManaiAgentFreemiumHttpTrigger";
/// Question-answering endpoint of the original deployment; only used as a
/// reachability probe.
const LEGACY_TRIGGER: &str = "ManaiAgentHttpTrigger";

/// The client-side brain: one instance per invocation.
pub struct Manai<B> {
    backend: B,
    store: StateStore,
}

impl<B: Backend> Manai<B> {
    pub fn new(backend: B, store: StateStore) -> Self {
        Self { backend, store }
    }

    /// Stored account record, if any.
    pub fn account(&self) -> Option<AccountState> {
        self.store.load_account()
    }

    /// Whether the user counts as logged in.
    ///
    /// Token presence is necessary; beyond that the token-validation
    /// endpoint gets a say when the deployment has one. A `NotFound` from
    /// validation means the server generation predates it, so presence
    /// alone counts (a compatibility shim, not an authorization check).
    /// Transport failures do not revoke local credentials either: the
    /// client cannot tell "expired" from "unreachable" and must not
    /// destroy a possibly-valid token on a network blip.
    pub fn is_authenticated(&self) -> bool {
        let Some(account) = self.store.load_account() else {
            return false;
        };
        match self
            .backend
            .call(VALIDATE_TOKEN, Method::POST, None, CallOpts::authed(&account.token))
        {
            Ok(value) => value.get("valid").and_then(Value::as_bool).unwrap_or(true),
            Err(ApiError::NotFound(_)) => true,
            Err(ApiError::Unauthenticated) => false,
            Err(err) => {
                log::debug!("token validation unreachable ({err}); keeping local verdict");
                true
            }
        }
    }

    /// Create an account. Validation is the server's job; on success the
    /// returned token and profile become the stored account state.
    pub fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        language: &str,
    ) -> Result<AccountState> {
        let body = to_body(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            preferred_language: language.to_string(),
        });
        let value = self
            .backend
            .call(REGISTER_USER, Method::POST, Some(body), CallOpts::public())?;
        self.adopt_credentials(value)
    }

    /// Authenticate; same persistence contract as [`Manai::register`].
    pub fn login(&self, email: &str, password: &str) -> Result<AccountState> {
        let body = to_body(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let value = self
            .backend
            .call(LOGIN_USER, Method::POST, Some(body), CallOpts::public())?;
        self.adopt_credentials(value)
    }

    /// Drop both records: the conversation context is tied to the
    /// authenticated identity server-side, so it goes with the token.
    pub fn logout(&self) {
        self.store.clear_account();
        self.store.clear_session();
    }

    /// Ask the agent a question.
    ///
    /// With `use_session`, a stored context id is attached so the agent
    /// recalls prior turns, and any new context id in the answer replaces
    /// the stored record. Without it, the session record is not even read
    /// and nothing is written back. A failed turn never discards an
    /// otherwise-valid conversation.
    pub fn ask_question(&self, question: &str, language: &str, use_session: bool) -> Result<Answer> {
        let Some(account) = self.store.load_account() else {
            return Err(ApiError::Unauthenticated);
        };

        let mut payload = json!({ "Question": question, "Language": language });
        if use_session {
            if let Some(session) = self.store.load_session() {
                payload["ThreadId"] = json!(session.context_id);
            }
        }

        let value = self.backend.call(
            ASK_QUESTION,
            Method::POST,
            Some(payload),
            CallOpts::authed(&account.token),
        )?;
        reject_if_failed(&value)?;

        // `message` covers plain-text bodies wrapped by the gateway,
        // `response` the original deployment's answer field.
        let text = first_string(&value, &["answer", "Answer", "message", "response"])
            .ok_or_else(|| ApiError::MalformedResponse("no answer text in response".into()))?;

        let thread_id = first_string(&value, &["ThreadId", "threadId"]);
        if use_session {
            match &thread_id {
                Some(id) => self.store.save_session(&SessionState {
                    context_id: id.clone(),
                    auxiliary_id: first_string(&value, &["SessionId", "sessionId"]),
                    last_used_at: Utc::now(),
                }),
                None => log::info!("answer carried no context id; keeping previous session"),
            }
        }

        Ok(Answer {
            text,
            thread_id,
            usage: parse_usage(&value),
        })
    }

    /// Pre-flight quota check for the question path.
    pub fn check_usage_limits(&self, language: &str) -> Result<Capability<UsageLimit>> {
        self.optional_call(
            CHECK_USAGE_LIMIT,
            Method::POST,
            Some(json!({ "Language": language })),
        )
    }

    pub fn get_usage_stats(&self) -> Result<Capability<UsageStats>> {
        self.optional_call(GET_USAGE_STATISTICS, Method::POST, None)
    }

    pub fn check_feature_access(&self, feature_name: &str) -> Result<Capability<FeatureAccess>> {
        self.optional_call(
            CHECK_FEATURE_ACCESS,
            Method::POST,
            Some(json!({ "featureName": feature_name })),
        )
    }

    pub fn get_profile(&self) -> Result<Capability<UserProfile>> {
        let Some(account) = self.store.load_account() else {
            return Err(ApiError::Unauthenticated);
        };
        match self.backend.call(
            GET_USER_PROFILE,
            Method::GET,
            None,
            CallOpts::authed(&account.token),
        ) {
            Ok(value) => {
                reject_if_failed(&value)?;
                // Some generations nest the profile under `user`.
                let source = value.get("user").cloned().unwrap_or(value);
                Ok(Capability::Available(parse_payload(source)?))
            }
            Err(err) if err.is_unsupported() => Ok(Capability::Unsupported),
            Err(err) => Err(err),
        }
    }

    pub fn get_tier_config(&self) -> Result<Capability<TierConfig>> {
        self.optional_call(GET_TIER_CONFIGURATION, Method::GET, None)
    }

    /// Reachability probe against the legacy endpoint; it only speaks
    /// POST, so a 405 still proves the deployment is up.
    pub fn test_connection(&self) -> Result<()> {
        match self
            .backend
            .call(LEGACY_TRIGGER, Method::GET, None, CallOpts::public())
        {
            Ok(_) | Err(ApiError::UnexpectedStatus(405, _)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// One authenticated call with no state mutation; a 404 means the
    /// deployment predates the capability.
    fn optional_call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Capability<T>> {
        let Some(account) = self.store.load_account() else {
            return Err(ApiError::Unauthenticated);
        };
        match self
            .backend
            .call(endpoint, method, body, CallOpts::authed(&account.token))
        {
            Ok(value) => {
                reject_if_failed(&value)?;
                Ok(Capability::Available(parse_payload(value)?))
            }
            Err(err) if err.is_unsupported() => Ok(Capability::Unsupported),
            Err(err) => Err(err),
        }
    }

    /// Persist token + profile from a register/login response. A success
    /// body missing either is treated as "not authenticated" and nothing
    /// is written.
    fn adopt_credentials(&self, value: Value) -> Result<AccountState> {
        require_success(&value)?;
        let token = first_string(&value, &["token"])
            .ok_or_else(|| ApiError::MalformedResponse("no token in auth response".into()))?;
        let user: UserProfile = value
            .get("user")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| ApiError::MalformedResponse(err.to_string()))?
            .ok_or_else(|| ApiError::MalformedResponse("no user in auth response".into()))?;
        let account = AccountState { token, user };
        self.store.save_account(&account);
        Ok(account)
    }
}

fn to_body<T: serde::Serialize>(request: &T) -> Value {
    serde_json::to_value(request).expect("request payloads serialize")
}

fn parse_payload<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| ApiError::MalformedResponse(err.to_string()))
}

fn rejection(value: &Value) -> ApiError {
    let message = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("server reported failure");
    ApiError::Rejected(message.to_string())
}

/// Fail only when the body explicitly says `success: false`; older server
/// generations omit the field entirely.
fn reject_if_failed(value: &Value) -> Result<()> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(rejection(value));
    }
    Ok(())
}

/// Register/login must say `success: true` before credentials are adopted.
fn require_success(value: &Value) -> Result<()> {
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(())
    } else {
        Err(rejection(value))
    }
}

fn parse_usage(value: &Value) -> Option<UsageInfo> {
    let info = value.get("usageInfo")?;
    // `queriesUsedToday` may be the literal string "N/A" on some tiers.
    let used = info.get("queriesUsedToday")?.as_i64()?;
    Some(UsageInfo {
        queries_used_today: used,
        daily_limit: info.get("dailyLimit").and_then(Value::as_i64).unwrap_or(0),
    })
}
