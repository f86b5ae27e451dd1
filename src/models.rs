use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============ Identity Models ============

/// Lifecycle status of an account.
///
/// Created as `Pending`, moved to `Active` or `Rejected` by an administrator.
/// Values the provider sends that are not recognised land in `Unrecognized`
/// and are handled fail-closed by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    Pending,
    Active,
    Rejected,
    Unrecognized,
}

impl From<String> for AccountStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendente" => AccountStatus::Pending,
            "active" | "ativo" | "approved" | "aprovado" => AccountStatus::Active,
            "rejected" | "rejeitado" => AccountStatus::Rejected,
            other => {
                tracing::warn!("Unrecognized account status '{}'", other);
                AccountStatus::Unrecognized
            }
        }
    }
}

impl From<AccountStatus> for String {
    fn from(status: AccountStatus) -> Self {
        match status {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Rejected => "rejected",
            AccountStatus::Unrecognized => "unrecognized",
        }
        .to_string()
    }
}

/// Role assigned to an account. Unknown role strings degrade to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Analyst,
    User,
}

impl Role {
    /// Roles that grant unconditional access.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Manager)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" | "dono" => Role::Owner,
            "admin" | "administrador" => Role::Admin,
            "manager" | "gerente" => Role::Manager,
            "analyst" | "analista" => Role::Analyst,
            "user" | "usuario" | "usuário" => Role::User,
            other => {
                tracing::warn!("Unrecognized account role '{}', treating as user", other);
                Role::User
            }
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Analyst => "analyst",
            Role::User => "user",
        }
        .to_string()
    }
}

/// Account record as owned by the identity provider. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub status: AccountStatus,
    pub role: Role,
    /// Legacy admin marker, independent of `role`.
    #[serde(default, alias = "is_admin", rename = "isAdminFlag")]
    pub is_admin_flag: bool,
}

impl Account {
    /// Record inserted for a session that has no account yet.
    pub fn provisional(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: AccountStatus::Pending,
            role: Role::User,
            is_admin_flag: false,
        }
    }

    /// Either an elevated role or the legacy admin flag.
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated() || self.is_admin_flag
    }
}

/// Row shape of the provider's `profiles` table.
///
/// Columns are nullable upstream, so missing values fall back to the
/// fail-closed defaults (pending, user, not admin).
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub status: Option<String>,
    pub role: Option<String>,
    pub is_admin: Option<bool>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            status: row
                .status
                .map(AccountStatus::from)
                .unwrap_or(AccountStatus::Pending),
            role: row.role.map(Role::from).unwrap_or(Role::User),
            is_admin_flag: row.is_admin.unwrap_or(false),
        }
    }
}

/// Authenticated session resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    /// Account identifier the session belongs to.
    pub id: String,
    pub email: Option<String>,
}

// ============ Access Models ============

/// Per-route access requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequirement {
    #[serde(default)]
    pub requires_active_account: bool,
    #[serde(default)]
    pub admin_only: bool,
}

impl RouteRequirement {
    pub const SESSION_ONLY: RouteRequirement = RouteRequirement {
        requires_active_account: false,
        admin_only: false,
    };
    pub const ACTIVE_ACCOUNT: RouteRequirement = RouteRequirement {
        requires_active_account: true,
        admin_only: false,
    };
    pub const ADMIN_ONLY: RouteRequirement = RouteRequirement {
        requires_active_account: true,
        admin_only: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Login,
    PendingApproval,
    RejectedAccount,
}

/// Outcome of evaluating an account against a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Redirect(RedirectTarget),
}

impl AccessDecision {
    pub fn redirect(target: RedirectTarget) -> Self {
        AccessDecision::Redirect(target)
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Body of `POST /api/v1/access/evaluate`.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub account: Option<Account>,
    #[serde(default)]
    pub requirement: RouteRequirement,
}

// ============ Session Events ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
}

/// Push notification from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub account_id: String,
    pub kind: SessionEventKind,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

// ============ Financing Models ============

/// User-entered financing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingInputs {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub principal: BigDecimal,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub down_payment: BigDecimal,
    /// Raw JSON number; range-checked by the calculator so the error names the field.
    pub term_months: serde_json::Number,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub monthly_rate_percent: BigDecimal,
}

/// Body of `POST /api/v1/financing/options`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingOptionsRequest {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub principal: BigDecimal,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub down_payment: BigDecimal,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub monthly_rate_percent: BigDecimal,
    /// Term menu; the standard menu is used when absent.
    pub terms: Option<Vec<serde_json::Number>>,
}

/// Reads a money field from either a JSON string or a JSON number.
///
/// Numbers are taken from their shortest decimal text, so `1.005` stays
/// `1.005` instead of the nearest binary float.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = BigDecimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal number or a numeric string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<BigDecimal, E> {
            BigDecimal::from_str(value.trim())
                .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(value))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<BigDecimal, E> {
            if !value.is_finite() {
                return Err(E::invalid_value(Unexpected::Float(value), &self));
            }
            BigDecimal::from_str(&value.to_string())
                .map_err(|_| E::invalid_value(Unexpected::Float(value), &self))
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}

/// Financing figures at full precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancingResult {
    pub financed_amount: BigDecimal,
    pub installment_amount: BigDecimal,
    pub total_amount: BigDecimal,
}

/// Financing figures rounded for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingQuote {
    pub term_months: u32,
    pub financed_amount: BigDecimal,
    pub installment_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub interest_amount: BigDecimal,
}
