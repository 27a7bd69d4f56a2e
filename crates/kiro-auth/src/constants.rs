//! Kiro credential sources and upstream constants

/// Environment variable holding the credential JSON (or a path to it).
pub const AUTH_TOKEN_ENV: &str = "KIRO_AUTH_TOKEN";

/// Variables from the single-token era. Only warned about.
pub const DEPRECATED_TOKEN_ENVS: &[&str] = &[
    "REFRESH_TOKEN",
    "AWS_REFRESHTOKEN",
    "IDC_REFRESH_TOKEN",
    "BULK_REFRESH_TOKENS",
];

/// Secondary, additive credential source.
pub const DEFAULT_ACCOUNTS_CSV: &str = "accounts.csv";

pub const DEFAULT_REGION: &str = "us-east-1";

/// Used when the refresh response omits `expiresIn`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Usage breakdown resource type that carries request credits.
pub const CREDIT_RESOURCE_TYPE: &str = "CREDIT";

/// Free trial status that makes the trial allowance count.
pub const FREE_TRIAL_ACTIVE: &str = "ACTIVE";

/// User-Agent sent on refresh and usage requests.
pub const USER_AGENT: &str = "KiroIDE kiro-token-broker/0.1";

/// `x-amz-user-agent` value expected by the OIDC token endpoint.
pub const IDC_AMZ_USER_AGENT: &str = "aws-sdk-js/3.738.0 ua/2.1 os/other lang/js md/browser#unknown_unknown api/sso-oidc#3.738.0 m/E KiroIDE";

/// Example shown when no credential source is configured.
pub const AUTH_TOKEN_EXAMPLE: &str = r#"KIRO_AUTH_TOKEN='[{"auth":"Social","refreshToken":"your_token"}]'"#;
