//! Signed blob URLs
//!
//! Builds service shared access signatures for blob storage. The builder is
//! pure: given the same request, key and clock it always returns the same
//! URL. Nothing here talks to the storage service.

use crate::clock::Clock;
use crate::error::ConfigurationError;
use crate::output::Output;
use crate::secret::Revealed;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Service version the string-to-sign layout follows
pub const SAS_VERSION: &str = "2018-11-09";

pub const BLOB_ENDPOINT: &str = "blob.core.windows.net";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    HttpsOnly,
    HttpsAndHttp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::HttpsOnly => "https",
            Protocol::HttpsAndHttp => "https,http",
        }
    }
}

/// What the signature grants access to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignedResource {
    Container,
    #[default]
    Blob,
}

impl SignedResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignedResource::Container => "c",
            SignedResource::Blob => "b",
        }
    }
}

/// Declared in canonical token order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Add,
    Create,
    Write,
    Delete,
    List,
}

impl Permission {
    pub fn as_char(&self) -> char {
        match self {
            Permission::Read => 'r',
            Permission::Add => 'a',
            Permission::Create => 'c',
            Permission::Write => 'w',
            Permission::Delete => 'd',
            Permission::List => 'l',
        }
    }

    /// Permissions that modify data
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Permission::Add | Permission::Create | Permission::Write | Permission::Delete
        )
    }
}

/// Permissions granted by a signature.
///
/// A set created with [`PermissionSet::read_only`] stays read-only: adding a
/// write permission to it is reported when the URL is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
    read_only: bool,
}

impl PermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            read_only: false,
        }
    }

    pub fn read_only() -> Self {
        Self {
            permissions: BTreeSet::from([Permission::Read]),
            read_only: true,
        }
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Permissions as the `sp` token, e.g. `rl`
    pub fn token(&self) -> String {
        self.permissions.iter().map(Permission::as_char).collect()
    }

    /// Check the set against the scope it is going to be signed for
    pub fn validate(&self, resource: SignedResource) -> Result<(), ConfigurationError> {
        if self.permissions.is_empty() {
            return Err(ConfigurationError::PermissionScopeMismatch(
                "no permissions requested".to_string(),
            ));
        }
        if self.read_only {
            let write: String = self
                .permissions
                .iter()
                .filter(|p| p.is_write())
                .map(Permission::as_char)
                .collect();
            if !write.is_empty() {
                return Err(ConfigurationError::PermissionScopeMismatch(format!(
                    "read-only permission set requests write permissions '{}'",
                    write
                )));
            }
        }
        if resource == SignedResource::Blob && self.contains(Permission::List) {
            return Err(ConfigurationError::PermissionScopeMismatch(
                "list is only valid for container scope".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for PermissionSet {
    type Err = ConfigurationError;

    /// Parse a token such as `rwl`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let permissions = s
            .chars()
            .map(|c| match c {
                'r' => Ok(Permission::Read),
                'a' => Ok(Permission::Add),
                'c' => Ok(Permission::Create),
                'w' => Ok(Permission::Write),
                'd' => Ok(Permission::Delete),
                'l' => Ok(Permission::List),
                other => Err(ConfigurationError::PermissionScopeMismatch(format!(
                    "unknown permission '{}'",
                    other
                ))),
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            permissions,
            read_only: false,
        })
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Response headers the service returns when the URL is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOverrides {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    pub account_name: String,
    pub container_name: String,
    pub blob_name: String,
    pub protocol: Protocol,
    /// Defaults to the clock's current time
    pub start: Option<DateTime<Utc>>,
    /// Defaults to one hour after start
    pub end: Option<DateTime<Utc>>,
    pub resource: SignedResource,
    pub permissions: PermissionSet,
    pub overrides: ContentOverrides,
    pub endpoint: String,
}

impl SignedUrlRequest {
    /// Read access to one blob over https
    pub fn new(
        account_name: impl Into<String>,
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            container_name: container_name.into(),
            blob_name: blob_name.into(),
            protocol: Protocol::HttpsOnly,
            start: None,
            end: None,
            resource: SignedResource::Blob,
            permissions: PermissionSet::read_only(),
            overrides: ContentOverrides::default(),
            endpoint: BLOB_ENDPOINT.to_string(),
        }
    }

    /// Container-scoped read of a deployment package, served as inline JSON
    pub fn blob_read(
        account_name: impl Into<String>,
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        Self::new(account_name, container_name, blob_name)
            .with_resource(SignedResource::Container)
            .with_overrides(ContentOverrides {
                cache_control: Some("max-age=5".to_string()),
                content_disposition: Some("inline".to_string()),
                content_encoding: Some("deflate".to_string()),
                content_language: None,
                content_type: Some("application/json".to_string()),
            })
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn starting(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn expiring(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_resource(mut self, resource: SignedResource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_overrides(mut self, overrides: ContentOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn canonicalized_resource(&self) -> String {
        match self.resource {
            SignedResource::Container => {
                format!("/blob/{}/{}", self.account_name, self.container_name)
            }
            SignedResource::Blob => format!(
                "/blob/{}/{}/{}",
                self.account_name, self.container_name, self.blob_name
            ),
        }
    }
}

/// Looks up the key used to sign for an account
pub trait CredentialsResolver: Send + Sync {
    fn signing_key(&self, account_name: &str) -> Result<Revealed<String>, ConfigurationError>;
}

/// A single base64 account key
#[derive(Debug, Clone)]
pub struct AccountKey(Revealed<String>);

impl AccountKey {
    pub fn new(key: impl Into<String>, secret: bool) -> Self {
        Self(Revealed::new(key.into(), secret))
    }

    pub fn secret(key: impl Into<String>) -> Self {
        Self::new(key, true)
    }
}

impl CredentialsResolver for AccountKey {
    fn signing_key(&self, _account_name: &str) -> Result<Revealed<String>, ConfigurationError> {
        Ok(self.0.clone())
    }
}

/// Build `https://{account}.{endpoint}/{container}/{blob}?{token}`.
///
/// The URL is secret whenever the signing key is.
pub fn build_signed_url(
    request: &SignedUrlRequest,
    credentials: &dyn CredentialsResolver,
    clock: &dyn Clock,
) -> Result<Revealed<String>, ConfigurationError> {
    request.permissions.validate(request.resource)?;

    let start = request.start.unwrap_or_else(|| clock.now()).trunc_subsecs(0);
    let end = request
        .end
        .map(|end| end.trunc_subsecs(0))
        .unwrap_or(start + Duration::hours(1));
    if start >= end {
        return Err(ConfigurationError::InvalidWindow { start, end });
    }

    let key = credentials.signing_key(&request.account_name)?;
    let decoded = STANDARD
        .decode(key.expose_ref().trim())
        .map_err(|e| ConfigurationError::InvalidSigningKey(e.to_string()))?;
    if decoded.is_empty() {
        return Err(ConfigurationError::InvalidSigningKey(
            "key is empty".to_string(),
        ));
    }

    let start = start.format(TIME_FORMAT).to_string();
    let end = end.format(TIME_FORMAT).to_string();
    let permissions = request.permissions.token();
    let overrides = &request.overrides;
    let field = |value: &Option<String>| value.clone().unwrap_or_default();

    let string_to_sign = [
        permissions.clone(),
        start.clone(),
        end.clone(),
        request.canonicalized_resource(),
        String::new(), // signed identifier
        String::new(), // signed ip
        request.protocol.as_str().to_string(),
        SAS_VERSION.to_string(),
        request.resource.as_str().to_string(),
        String::new(), // snapshot time
        field(&overrides.cache_control),
        field(&overrides.content_disposition),
        field(&overrides.content_encoding),
        field(&overrides.content_language),
        field(&overrides.content_type),
    ]
    .join("\n");

    let mut mac = HmacSha256::new_from_slice(&decoded)
        .map_err(|e| ConfigurationError::InvalidSigningKey(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let mut query = vec![
        ("sv", SAS_VERSION.to_string()),
        ("st", start),
        ("se", end),
        ("sr", request.resource.as_str().to_string()),
        ("sp", permissions),
        ("spr", request.protocol.as_str().to_string()),
    ];
    let optional = [
        ("rscc", &overrides.cache_control),
        ("rscd", &overrides.content_disposition),
        ("rsce", &overrides.content_encoding),
        ("rscl", &overrides.content_language),
        ("rsct", &overrides.content_type),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            query.push((name, value.clone()));
        }
    }
    query.push(("sig", signature));

    let token = query
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    let url = format!(
        "https://{}.{}/{}/{}?{}",
        request.account_name,
        request.endpoint,
        urlencoding::encode(&request.container_name),
        encode_path(&request.blob_name),
        token
    );
    Ok(Revealed::new(url, key.is_secret()))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Deferred form of [`build_signed_url`].
///
/// Names and key are taken from outputs; the remaining fields come from
/// `template`. Build failures reject the returned output.
pub fn signed_url_output(
    template: SignedUrlRequest,
    account_name: &Output<String>,
    container_name: &Output<String>,
    blob_name: &Output<String>,
    key: &Output<String>,
    clock: Arc<dyn Clock>,
) -> Output<String> {
    let names = Output::all([
        account_name.clone(),
        container_name.clone(),
        blob_name.clone(),
    ]);
    names
        .combine(key, |names, key| (names.clone(), key.clone()))
        .try_map(move |(names, key)| {
            let mut request = template.clone();
            if let [account, container, blob] = names.as_slice() {
                request.account_name = account.clone();
                request.container_name = container.clone();
                request.blob_name = blob.clone();
            }
            let credentials = AccountKey::new(key.clone(), false);
            build_signed_url(&request, &credentials, clock.as_ref()).map(Revealed::expose)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    const KEY: &str = "c3RhY2tmbG93LXRlc3Qta2V5";

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(at(2024, 5, 1))
    }

    #[test]
    fn test_blob_read_url() {
        let request = SignedUrlRequest::blob_read("acct1", "zips", "app.zip")
            .with_window(at(2021, 1, 1), at(2030, 1, 1));
        let url = build_signed_url(&request, &AccountKey::secret(KEY), &clock()).unwrap();

        assert!(url.is_secret());
        let url = url.expose();
        assert!(url.starts_with("https://acct1.blob.core.windows.net/zips/app.zip?"));
        assert!(url.contains("sv=2018-11-09"));
        assert!(url.contains("st=2021-01-01T00%3A00%3A00Z"));
        assert!(url.contains("se=2030-01-01T00%3A00%3A00Z"));
        assert!(url.contains("&sr=c&sp=r&spr=https&"));
        assert!(url.contains("rscc=max-age%3D5"));
        assert!(url.contains("rsct=application%2Fjson"));
        assert!(url.contains(&format!(
            "&sig={}",
            urlencoding::encode("6wO2dXtVbgz9AbXSrOTNWWU9pUcXEFgpoChvpDtElfg=")
        )));
    }

    #[test]
    fn test_same_input_same_url() {
        let request = SignedUrlRequest::new("acct1", "zips", "app.zip");
        let first = build_signed_url(&request, &AccountKey::secret(KEY), &clock()).unwrap();
        let second = build_signed_url(&request, &AccountKey::secret(KEY), &clock()).unwrap();
        assert_eq!(first.expose(), second.expose());
    }

    #[test]
    fn test_default_window_is_one_hour_from_now() {
        let request = SignedUrlRequest::new("acct1", "zips", "app.zip");
        let url = build_signed_url(&request, &AccountKey::new(KEY, false), &clock())
            .unwrap()
            .expose();
        assert!(url.contains("st=2024-05-01T00%3A00%3A00Z"));
        assert!(url.contains("se=2024-05-01T01%3A00%3A00Z"));
    }

    #[test]
    fn test_plain_key_gives_plain_url() {
        let request = SignedUrlRequest::new("acct1", "zips", "app.zip");
        let url = build_signed_url(&request, &AccountKey::new(KEY, false), &clock()).unwrap();
        assert!(!url.is_secret());
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        for (start, end) in [(at(2030, 1, 1), at(2021, 1, 1)), (at(2030, 1, 1), at(2030, 1, 1))] {
            let request = SignedUrlRequest::new("acct1", "zips", "app.zip").with_window(start, end);
            assert_eq!(
                build_signed_url(&request, &AccountKey::secret(KEY), &clock()).unwrap_err(),
                ConfigurationError::InvalidWindow { start, end }
            );
        }
    }

    #[test]
    fn test_read_only_set_refuses_write() {
        let request = SignedUrlRequest::new("acct1", "zips", "app.zip")
            .with_permissions(PermissionSet::read_only().with(Permission::Write));
        assert!(matches!(
            build_signed_url(&request, &AccountKey::secret(KEY), &clock()),
            Err(ConfigurationError::PermissionScopeMismatch(_))
        ));
    }

    #[test]
    fn test_list_needs_container_scope() {
        let permissions = PermissionSet::new([Permission::Read, Permission::List]);
        let blob = SignedUrlRequest::new("acct1", "zips", "app.zip")
            .with_permissions(permissions.clone());
        assert!(build_signed_url(&blob, &AccountKey::secret(KEY), &clock()).is_err());

        let container = blob.with_resource(SignedResource::Container);
        let url = build_signed_url(&container, &AccountKey::secret(KEY), &clock()).unwrap();
        assert!(url.expose().contains("sp=rl"));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let request = SignedUrlRequest::new("acct1", "zips", "app.zip");
        assert!(matches!(
            build_signed_url(&request, &AccountKey::secret("not base64!"), &clock()),
            Err(ConfigurationError::InvalidSigningKey(_))
        ));
    }

    #[test]
    fn test_permission_token_parsing() {
        let set: PermissionSet = "lwr".parse().unwrap();
        assert_eq!(set.token(), "rwl");
        assert!("rx".parse::<PermissionSet>().is_err());
    }

    #[test]
    fn test_deferred_url_waits_for_key() {
        let key = Output::<String>::pending().into_secret();
        let url = signed_url_output(
            SignedUrlRequest::new("", "", ""),
            &Output::resolved("acct1".to_string()),
            &Output::resolved("zips".to_string()),
            &Output::resolved("app.zip".to_string()),
            &key,
            Arc::new(clock()),
        );
        assert!(url.is_secret());
        assert!(url.peek().is_none());

        key.resolve(KEY.to_string()).unwrap();
        let url = url.peek().unwrap().unwrap();
        assert!(url.is_secret());
        assert!(url.expose().starts_with("https://acct1.blob.core.windows.net/zips/app.zip?"));
    }
}
