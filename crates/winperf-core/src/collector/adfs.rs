//! Active Directory Federation Services counters (`AD FS` object).

use crate::pdh::ValueFormat;

use super::perf::{MetricDef, PerfCollector, PerfSpec};

pub const NAME: &str = "adfs";

/// The database query time counters accumulate in units of 10^-8 seconds.
const QUERY_TIME_TO_SECONDS: f64 = 1e-8;

crate::counter_record! {
    /// Raw values of the single-instance `AD FS` object.
    pub struct AdfsCounters {
        ad_login_connection_failures: f64 => "AD Login Connection Failures",
        certificate_authentications: f64 => "Certificate Authentications",
        device_authentications: f64 => "Device Authentications",
        extranet_account_lockouts: f64 => "Extranet Account Lockouts",
        federated_authentications: f64 => "Federated Authentications",
        passport_authentications: f64 => "Microsoft Passport Authentications",
        passive_requests: f64 => "Passive Requests",
        password_change_failed: f64 => "Password Change Failed Requests",
        password_change_succeeded: f64 => "Password Change Successful Requests",
        token_requests: f64 => "Token Requests",
        windows_integrated_authentications: f64 => "Windows Integrated Authentications",
        oauth_authz_requests: f64 => "OAuth AuthZ Requests",
        oauth_client_authentications: f64 => "OAuth Client Authentications",
        oauth_client_authentication_failures: f64 => "OAuth Client Authentications Failures",
        oauth_client_credential_request_failures: f64 => "OAuth Client Credentials Request Failures",
        oauth_client_credential_requests: f64 => "OAuth Client Credentials Requests",
        oauth_client_privkey_jwt_authentication_failures: f64 => "OAuth Client Private Key Jwt Authentication Failures",
        oauth_client_privkey_jwt_authentications: f64 => "OAuth Client Private Key Jwt Authentications",
        oauth_client_basic_authentication_failures: f64 => "OAuth Client Secret Basic Authentication Failures",
        oauth_client_basic_authentications: f64 => "OAuth Client Secret Basic Authentication Requests",
        oauth_client_secret_post_authentication_failures: f64 => "OAuth Client Secret Post Authentication Failures",
        oauth_client_secret_post_authentications: f64 => "OAuth Client Secret Post Authentications",
        oauth_client_windows_authentication_failures: f64 => "OAuth Client Windows Integrated Authentication Failures",
        oauth_client_windows_authentications: f64 => "OAuth Client Windows Integrated Authentications",
        oauth_logon_cert_request_failures: f64 => "OAuth Logon Certificate Request Failures",
        oauth_logon_cert_token_requests: f64 => "OAuth Logon Certificate Token Requests",
        oauth_password_grant_request_failures: f64 => "OAuth Password Grant Request Failures",
        oauth_password_grant_requests: f64 => "OAuth Password Grant Requests",
        oauth_token_requests: f64 => "OAuth Token Requests",
        samlp_token_requests: f64 => "SAML-P Token Requests",
        sso_authentication_failures: f64 => "SSO Authentication Failures",
        sso_authentications: f64 => "SSO Authentications",
        wsfed_token_requests: f64 => "WS-Fed Token Requests",
        wstrust_token_requests: f64 => "WS-Trust Token Requests",
        username_password_authentication_failures: f64 => "U/P Authentication Failures",
        username_password_authentications: f64 => "U/P Authentications",
        external_authentication_failures: f64 => "External Authentication Failures",
        external_authentications: f64 => "External Authentications",
        artifact_db_failures: f64 => "Artifact Database Connection Failures",
        avg_artifact_db_query_time: f64 => "Average Artifact Database Query Time",
        config_db_failures: f64 => "Configuration Database Connection Failures",
        avg_config_db_query_time: f64 => "Average Config Database Query Time",
        federation_metadata_requests: f64 => "Federation Metadata Requests",
    }
}

type R = AdfsCounters;

const METRICS: &[MetricDef<R>] = &[
    MetricDef::counter(
        "ad_login_connection_failures_total",
        "Total number of connection failures to an Active Directory domain controller",
        |r: &R| r.ad_login_connection_failures,
    ),
    MetricDef::counter(
        "certificate_authentications_total",
        "Total number of User Certificate authentications",
        |r: &R| r.certificate_authentications,
    ),
    MetricDef::counter(
        "device_authentications_total",
        "Total number of Device authentications",
        |r: &R| r.device_authentications,
    ),
    MetricDef::counter(
        "extranet_account_lockouts_total",
        "Total number of Extranet Account Lockouts",
        |r: &R| r.extranet_account_lockouts,
    ),
    MetricDef::counter(
        "federated_authentications_total",
        "Total number of authentications from a federated source",
        |r: &R| r.federated_authentications,
    ),
    MetricDef::counter(
        "passport_authentications_total",
        "Total number of Microsoft Passport SSO authentications",
        |r: &R| r.passport_authentications,
    ),
    MetricDef::counter(
        "passive_requests_total",
        "Total number of passive (browser-based) requests",
        |r: &R| r.passive_requests,
    ),
    MetricDef::counter(
        "password_change_failed_total",
        "Total number of failed password changes",
        |r: &R| r.password_change_failed,
    ),
    MetricDef::counter(
        "password_change_succeeded_total",
        "Total number of successful password changes",
        |r: &R| r.password_change_succeeded,
    ),
    MetricDef::counter(
        "token_requests_total",
        "Total number of token requests",
        |r: &R| r.token_requests,
    ),
    MetricDef::counter(
        "windows_integrated_authentications_total",
        "Total number of Windows integrated authentications (Kerberos/NTLM)",
        |r: &R| r.windows_integrated_authentications,
    ),
    MetricDef::counter(
        "oauth_authorization_requests_total",
        "Total number of incoming requests to the OAuth Authorization endpoint",
        |r: &R| r.oauth_authz_requests,
    ),
    MetricDef::counter(
        "oauth_client_authentication_success_total",
        "Total number of successful OAuth client Authentications",
        |r: &R| r.oauth_client_authentications,
    ),
    MetricDef::counter(
        "oauth_client_authentication_failure_total",
        "Total number of failed OAuth client Authentications",
        |r: &R| r.oauth_client_authentication_failures,
    ),
    MetricDef::counter(
        "oauth_client_credentials_failure_total",
        "Total number of failed OAuth Client Credentials Requests",
        |r: &R| r.oauth_client_credential_request_failures,
    ),
    MetricDef::counter(
        "oauth_client_credentials_success_total",
        "Total number of successful RP tokens issued for OAuth Client Credentials Requests",
        |r: &R| r.oauth_client_credential_requests,
    ),
    MetricDef::counter(
        "oauth_client_privkey_jwt_authentication_failure_total",
        "Total number of failed OAuth Client Private Key Jwt Authentications",
        |r: &R| r.oauth_client_privkey_jwt_authentication_failures,
    ),
    MetricDef::counter(
        "oauth_client_privkey_jwt_authentications_success_total",
        "Total number of successful OAuth Client Private Key Jwt Authentications",
        |r: &R| r.oauth_client_privkey_jwt_authentications,
    ),
    MetricDef::counter(
        "oauth_client_secret_basic_authentications_failure_total",
        "Total number of failed OAuth Client Secret Basic Authentications",
        |r: &R| r.oauth_client_basic_authentication_failures,
    ),
    MetricDef::counter(
        "oauth_client_secret_basic_authentications_success_total",
        "Total number of successful OAuth Client Secret Basic Authentications",
        |r: &R| r.oauth_client_basic_authentications,
    ),
    MetricDef::counter(
        "oauth_client_secret_post_authentications_failure_total",
        "Total number of failed OAuth Client Secret Post Authentications",
        |r: &R| r.oauth_client_secret_post_authentication_failures,
    ),
    MetricDef::counter(
        "oauth_client_secret_post_authentications_success_total",
        "Total number of successful OAuth Client Secret Post Authentications",
        |r: &R| r.oauth_client_secret_post_authentications,
    ),
    MetricDef::counter(
        "oauth_client_windows_authentications_failure_total",
        "Total number of failed OAuth Client Windows Integrated Authentications",
        |r: &R| r.oauth_client_windows_authentication_failures,
    ),
    MetricDef::counter(
        "oauth_client_windows_authentications_success_total",
        "Total number of successful OAuth Client Windows Integrated Authentications",
        |r: &R| r.oauth_client_windows_authentications,
    ),
    MetricDef::counter(
        "oauth_logon_certificate_requests_failure_total",
        "Total number of failed OAuth Logon Certificate Requests",
        |r: &R| r.oauth_logon_cert_request_failures,
    ),
    MetricDef::counter(
        "oauth_logon_certificate_token_requests_success_total",
        "Total number of successful RP tokens issued for OAuth Logon Certificate Requests",
        |r: &R| r.oauth_logon_cert_token_requests,
    ),
    MetricDef::counter(
        "oauth_password_grant_requests_failure_total",
        "Total number of failed OAuth Password Grant Requests",
        |r: &R| r.oauth_password_grant_request_failures,
    ),
    MetricDef::counter(
        "oauth_password_grant_requests_success_total",
        "Total number of successful OAuth Password Grant Requests",
        |r: &R| r.oauth_password_grant_requests,
    ),
    MetricDef::counter(
        "oauth_token_requests_success_total",
        "Total number of successful RP tokens issued over OAuth protocol",
        |r: &R| r.oauth_token_requests,
    ),
    MetricDef::counter(
        "samlp_token_requests_success_total",
        "Total number of successful RP tokens issued over SAML-P protocol",
        |r: &R| r.samlp_token_requests,
    ),
    MetricDef::counter(
        "sso_authentications_failure_total",
        "Total number of failed SSO authentications",
        |r: &R| r.sso_authentication_failures,
    ),
    MetricDef::counter(
        "sso_authentications_success_total",
        "Total number of successful SSO authentications",
        |r: &R| r.sso_authentications,
    ),
    MetricDef::counter(
        "wsfed_token_requests_success_total",
        "Total number of successful RP tokens issued over WS-Fed protocol",
        |r: &R| r.wsfed_token_requests,
    ),
    MetricDef::counter(
        "wstrust_token_requests_success_total",
        "Total number of successful RP tokens issued over WS-Trust protocol",
        |r: &R| r.wstrust_token_requests,
    ),
    MetricDef::counter(
        "userpassword_authentications_failure_total",
        "Total number of failed AD U/P authentications",
        |r: &R| r.username_password_authentication_failures,
    ),
    MetricDef::counter(
        "userpassword_authentications_success_total",
        "Total number of successful AD U/P authentications",
        |r: &R| r.username_password_authentications,
    ),
    MetricDef::counter(
        "external_authentications_failure_total",
        "Total number of failed authentications from external MFA providers",
        |r: &R| r.external_authentication_failures,
    ),
    MetricDef::counter(
        "external_authentications_success_total",
        "Total number of successful authentications from external MFA providers",
        |r: &R| r.external_authentications,
    ),
    MetricDef::counter(
        "db_artifact_failure_total",
        "Total number of failures connecting to the artifact database",
        |r: &R| r.artifact_db_failures,
    ),
    MetricDef::counter(
        "db_artifact_query_time_seconds_total",
        "Accumulator of time taken for an artifact database query",
        |r: &R| r.avg_artifact_db_query_time,
    )
    .scaled(QUERY_TIME_TO_SECONDS),
    MetricDef::counter(
        "db_config_failure_total",
        "Total number of failures connecting to the configuration database",
        |r: &R| r.config_db_failures,
    ),
    MetricDef::counter(
        "db_config_query_time_seconds_total",
        "Accumulator of time taken for a configuration database query",
        |r: &R| r.avg_config_db_query_time,
    )
    .scaled(QUERY_TIME_TO_SECONDS),
    MetricDef::counter(
        "federation_metadata_requests_total",
        "Total number of Federation Metadata requests",
        |r: &R| r.federation_metadata_requests,
    ),
];

pub static SPEC: PerfSpec<AdfsCounters> = PerfSpec {
    name: NAME,
    object: "AD FS",
    format: ValueFormat::Raw,
    instance_label: None,
    exclude_instances: &[],
    metrics: METRICS,
};

pub fn new() -> PerfCollector<AdfsCounters> {
    PerfCollector::new(&SPEC)
}
