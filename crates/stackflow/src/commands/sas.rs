use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use stackflow_core::sas::{Protocol, SignedResource};
use stackflow_core::{AccountKey, PermissionSet, SignedUrlRequest, SystemClock, build_signed_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    Blob,
    Container,
}

impl From<Scope> for SignedResource {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Blob => SignedResource::Blob,
            Scope::Container => SignedResource::Container,
        }
    }
}

#[derive(Debug, Args)]
pub struct SasArgs {
    /// Storage account name
    #[arg(long)]
    pub account: String,

    /// Container name
    #[arg(long)]
    pub container: String,

    /// Blob path inside the container
    #[arg(long)]
    pub blob: String,

    /// Permission token such as `r` or `rl`; read-only when omitted
    #[arg(short, long)]
    pub permissions: Option<String>,

    /// Scope the signature covers
    #[arg(long, value_enum, default_value = "blob")]
    pub scope: Scope,

    /// Start of validity, RFC 3339 or YYYY-MM-DD; defaults to now
    #[arg(long, value_parser = parse_time)]
    pub start: Option<DateTime<Utc>>,

    /// End of validity, RFC 3339 or YYYY-MM-DD
    #[arg(long, value_parser = parse_time, conflicts_with = "expiry_hours")]
    pub end: Option<DateTime<Utc>>,

    /// Validity in hours from the start
    #[arg(long)]
    pub expiry_hours: Option<i64>,

    /// Container-scoped read served as inline JSON (deployment package)
    #[arg(long)]
    pub package: bool,

    /// Allow plain http as well as https
    #[arg(long)]
    pub allow_http: bool,

    /// Environment variable holding the base64 account key
    #[arg(long, default_value = "STACKFLOW_STORAGE_KEY")]
    pub key_env: String,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
        .ok_or_else(|| format!("'{}' is neither RFC 3339 nor YYYY-MM-DD", value))
}

/// Turn command line arguments into a signing request
pub fn request(args: &SasArgs) -> anyhow::Result<SignedUrlRequest> {
    let mut request = if args.package {
        SignedUrlRequest::blob_read(&args.account, &args.container, &args.blob)
    } else {
        SignedUrlRequest::new(&args.account, &args.container, &args.blob)
            .with_resource(args.scope.into())
    };

    if let Some(token) = &args.permissions {
        request = request.with_permissions(token.parse::<PermissionSet>()?);
    }
    if args.allow_http {
        request = request.with_protocol(Protocol::HttpsAndHttp);
    }
    if let Some(start) = args.start {
        request = request.starting(start);
    }
    if let Some(end) = args.end {
        request = request.expiring(end);
    }
    if let Some(hours) = args.expiry_hours {
        let start = args.start.unwrap_or_else(Utc::now);
        request = request
            .starting(start)
            .expiring(start + Duration::hours(hours));
    }
    Ok(request)
}

pub fn handle(args: SasArgs) -> anyhow::Result<()> {
    let key = std::env::var(&args.key_env)
        .map_err(|_| anyhow::anyhow!("Account key not found in ${}", args.key_env))?;

    let request = request(&args)?;
    tracing::debug!(
        account = %request.account_name,
        container = %request.container_name,
        permissions = %request.permissions,
        "Signing blob URL"
    );

    let url = build_signed_url(&request, &AccountKey::secret(key), &SystemClock)?;
    println!("{}", url.expose());
    Ok(())
}
